//! Client-side domain of the upload console.
//!
//! [`gateway`] talks to the backend; the component modules ([`integration_card`],
//! [`integrations_page`], [`upload_zone`], [`uploads_table`], [`upload_page`])
//! hold per-view state and publish `events::DomainEvent`s after every
//! mutation; [`query`] keeps the lists they render fresh.

pub use events::Id;

pub mod error;
pub mod integration;
pub mod integration_card;
pub mod integrations_page;
pub mod oauth_config;
pub mod query;
pub mod upload_page;
pub mod upload_zone;
pub mod uploads_table;

pub mod gateway;
