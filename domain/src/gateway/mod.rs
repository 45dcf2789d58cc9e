//! Typed client for the video processing backend.
//!
//! One method per endpoint, split by resource: [`integrations`] and [`uploads`].
//! Every method issues exactly one request; retries and timeouts are owned by
//! the calling component.

pub mod backend;
pub mod integrations;
pub mod uploads;

pub use backend::BackendClient;
