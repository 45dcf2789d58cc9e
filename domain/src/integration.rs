//! Integration kinds, derived connection status and account display rules.

use crate::gateway::integrations::Integration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Third-party services the console can connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationKind {
    Youtube,
    Gdrive,
    Gads,
    Telegram,
}

/// Static presentation metadata for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// Connected through an OAuth consent screen rather than a pasted token.
    pub oauth: bool,
}

impl IntegrationKind {
    /// Every kind, in the order the integrations page renders them.
    pub const ALL: [IntegrationKind; 4] = [
        IntegrationKind::Youtube,
        IntegrationKind::Gdrive,
        IntegrationKind::Gads,
        IntegrationKind::Telegram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationKind::Youtube => "youtube",
            IntegrationKind::Gdrive => "gdrive",
            IntegrationKind::Gads => "gads",
            IntegrationKind::Telegram => "telegram",
        }
    }

    pub fn info(&self) -> ServiceInfo {
        match self {
            IntegrationKind::Youtube => ServiceInfo {
                name: "YouTube",
                description: "Publish processed videos to YouTube",
                oauth: true,
            },
            IntegrationKind::Gdrive => ServiceInfo {
                name: "Google Drive",
                description: "Import source videos from Google Drive",
                oauth: true,
            },
            IntegrationKind::Gads => ServiceInfo {
                name: "Google Ads",
                description: "Monitor ad disapprovals in Google Ads",
                oauth: true,
            },
            IntegrationKind::Telegram => ServiceInfo {
                name: "Telegram",
                description: "Notifications about bans and upload statuses",
                oauth: false,
            },
        }
    }

    pub fn is_oauth(&self) -> bool {
        self.info().oauth
    }

    /// Google Ads needs a developer token alongside the OAuth client.
    pub fn requires_developer_token(&self) -> bool {
        matches!(self, IntegrationKind::Gads)
    }
}

impl fmt::Display for IntegrationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct IntegrationKindParseError(pub String);

impl fmt::Display for IntegrationKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "unknown integration kind '{}' (expected youtube, gdrive, gads or telegram)",
            self.0
        )
    }
}

impl std::error::Error for IntegrationKindParseError {}

impl FromStr for IntegrationKind {
    type Err = IntegrationKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "youtube" => Ok(IntegrationKind::Youtube),
            "gdrive" => Ok(IntegrationKind::Gdrive),
            "gads" => Ok(IntegrationKind::Gads),
            "telegram" => Ok(IntegrationKind::Telegram),
            _ => Err(IntegrationKindParseError(s.to_string())),
        }
    }
}

/// Connection status as shown on a card. Always derived from the backend
/// record, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationStatus {
    Disconnected,
    Active,
    Error,
}

impl IntegrationStatus {
    pub fn of(integration: Option<&Integration>) -> Self {
        match integration {
            None => IntegrationStatus::Disconnected,
            Some(record) if record.is_valid => IntegrationStatus::Active,
            Some(_) => IntegrationStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationStatus::Disconnected => "disconnected",
            IntegrationStatus::Active => "active",
            IntegrationStatus::Error => "error",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IntegrationStatus::Disconnected => "Not connected",
            IntegrationStatus::Active => "Active",
            IntegrationStatus::Error => "Error",
        }
    }
}

/// Fields of `account_details` that can name an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    DisplayName,
    Email,
    Username,
    CustomerId,
    LoginCustomerId,
    ChannelId,
}

/// Preference order for the account label after `account_name`.
const LABEL_CANDIDATES: [AccountField; 5] = [
    AccountField::DisplayName,
    AccountField::Email,
    AccountField::Username,
    AccountField::CustomerId,
    AccountField::LoginCustomerId,
];

impl AccountField {
    pub fn key(&self) -> &'static str {
        match self {
            AccountField::DisplayName => "display_name",
            AccountField::Email => "email",
            AccountField::Username => "username",
            AccountField::CustomerId => "customer_id",
            AccountField::LoginCustomerId => "login_customer_id",
            AccountField::ChannelId => "id",
        }
    }

    /// Looks the field up, ignoring non-string and blank values.
    pub fn lookup<'a>(&self, details: &'a Map<String, Value>) -> Option<&'a str> {
        details
            .get(self.key())
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Renders a looked-up value the way `kind` displays it.
    pub fn format(&self, kind: IntegrationKind, value: &str) -> String {
        match (kind, self) {
            (IntegrationKind::Gads, AccountField::CustomerId | AccountField::LoginCustomerId) => {
                format_customer_id(value)
            }
            _ => value.to_string(),
        }
    }
}

/// Formats a Google Ads customer id as `NNN-NNN-NNNN`.
///
/// Non-digits are stripped first, so `123-456-7890` and `1234567890` both
/// format the same. Anything that is not exactly ten digits is returned as is.
pub fn format_customer_id(value: &str) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 {
        format!("{}-{}-{}", &digits[0..3], &digits[3..6], &digits[6..])
    } else {
        value.to_string()
    }
}

/// Primary account label: `account_name`, else the first usable candidate field.
pub fn account_label(kind: IntegrationKind, integration: &Integration) -> Option<String> {
    if let Some(name) = integration
        .account_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
    {
        return Some(name.to_string());
    }

    let details = integration.account_details.as_ref()?;
    LABEL_CANDIDATES.iter().find_map(|field| {
        field
            .lookup(details)
            .map(|value| field.format(kind, value))
    })
}

/// Secondary descriptor shown under the label, specific to each kind.
pub fn account_secondary(kind: IntegrationKind, integration: &Integration) -> Option<String> {
    let details = integration.account_details.as_ref()?;
    let label = account_label(kind, integration);

    match kind {
        IntegrationKind::Gads => gads_secondary(details),
        IntegrationKind::Youtube => AccountField::ChannelId
            .lookup(details)
            .map(|id| format!("ID: {id}")),
        IntegrationKind::Gdrive => AccountField::Email
            .lookup(details)
            .filter(|email| label.as_deref() != Some(*email))
            .map(str::to_string),
        IntegrationKind::Telegram => AccountField::Username
            .lookup(details)
            .filter(|username| label.as_deref() != Some(*username))
            .map(|username| format!("@{}", username.trim_start_matches('@'))),
    }
}

fn gads_secondary(details: &Map<String, Value>) -> Option<String> {
    if let Some(login_id) = AccountField::LoginCustomerId.lookup(details) {
        return Some(format!("Login customer ID: {}", format_customer_id(login_id)));
    }
    AccountField::CustomerId
        .lookup(details)
        .map(|customer_id| format!("Customer ID: {}", format_customer_id(customer_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn record(
        kind: IntegrationKind,
        is_valid: bool,
        account_name: Option<&str>,
        details: Value,
    ) -> Integration {
        Integration {
            id: Uuid::new_v4(),
            kind,
            is_valid,
            created_at: Utc::now(),
            account_name: account_name.map(str::to_string),
            account_details: details.as_object().cloned(),
        }
    }

    #[test]
    fn status_is_derived_from_record_for_every_kind() {
        for kind in IntegrationKind::ALL {
            assert_eq!(IntegrationStatus::of(None), IntegrationStatus::Disconnected);

            let valid = record(kind, true, None, Value::Null);
            assert_eq!(IntegrationStatus::of(Some(&valid)), IntegrationStatus::Active);

            let broken = record(kind, false, None, Value::Null);
            assert_eq!(IntegrationStatus::of(Some(&broken)), IntegrationStatus::Error);
        }
        assert_eq!(IntegrationStatus::Disconnected.as_str(), "disconnected");
        assert_eq!(IntegrationStatus::Active.as_str(), "active");
        assert_eq!(IntegrationStatus::Error.as_str(), "error");
    }

    #[test]
    fn ten_digit_customer_ids_are_grouped() {
        assert_eq!(format_customer_id("1234567890"), "123-456-7890");
        assert_eq!(format_customer_id("123-456-7890"), "123-456-7890");
    }

    #[test]
    fn other_customer_ids_pass_through() {
        assert_eq!(format_customer_id("123456789"), "123456789");
        assert_eq!(format_customer_id("12345678901"), "12345678901");
        assert_eq!(format_customer_id("acme"), "acme");
        assert_eq!(format_customer_id(""), "");
    }

    #[test]
    fn account_name_takes_precedence() {
        let integration = record(
            IntegrationKind::Youtube,
            true,
            Some("My Channel"),
            json!({"display_name": "Other", "id": "UC123"}),
        );
        assert_eq!(
            account_label(IntegrationKind::Youtube, &integration).as_deref(),
            Some("My Channel")
        );
        assert_eq!(
            account_secondary(IntegrationKind::Youtube, &integration).as_deref(),
            Some("ID: UC123")
        );
    }

    #[test]
    fn label_falls_back_through_candidates_skipping_blanks() {
        let integration = record(
            IntegrationKind::Gdrive,
            true,
            Some("   "),
            json!({"display_name": " ", "email": 42, "username": "drive-bot"}),
        );
        assert_eq!(
            account_label(IntegrationKind::Gdrive, &integration).as_deref(),
            Some("drive-bot")
        );
    }

    #[test]
    fn gads_label_and_secondary_format_customer_ids() {
        let integration = record(
            IntegrationKind::Gads,
            true,
            None,
            json!({"customer_id": "9876543210", "login_customer_id": "1234567890"}),
        );
        assert_eq!(
            account_label(IntegrationKind::Gads, &integration).as_deref(),
            Some("987-654-3210")
        );
        assert_eq!(
            account_secondary(IntegrationKind::Gads, &integration).as_deref(),
            Some("Login customer ID: 123-456-7890")
        );
    }

    #[test]
    fn gads_secondary_uses_customer_id_without_login_id() {
        let integration = record(
            IntegrationKind::Gads,
            true,
            Some("Agency"),
            json!({"customer_id": "9876543210"}),
        );
        assert_eq!(
            account_secondary(IntegrationKind::Gads, &integration).as_deref(),
            Some("Customer ID: 987-654-3210")
        );
    }

    #[test]
    fn customer_ids_are_not_formatted_for_other_kinds() {
        let integration = record(
            IntegrationKind::Youtube,
            true,
            None,
            json!({"customer_id": "1234567890"}),
        );
        assert_eq!(
            account_label(IntegrationKind::Youtube, &integration).as_deref(),
            Some("1234567890")
        );
    }

    #[test]
    fn gdrive_secondary_hides_email_equal_to_label() {
        let same = record(
            IntegrationKind::Gdrive,
            true,
            None,
            json!({"email": "ops@example.com"}),
        );
        assert_eq!(account_secondary(IntegrationKind::Gdrive, &same), None);

        let different = record(
            IntegrationKind::Gdrive,
            true,
            Some("Ops Drive"),
            json!({"email": "ops@example.com"}),
        );
        assert_eq!(
            account_secondary(IntegrationKind::Gdrive, &different).as_deref(),
            Some("ops@example.com")
        );
    }

    #[test]
    fn telegram_secondary_normalizes_at_sign() {
        let integration = record(
            IntegrationKind::Telegram,
            true,
            None,
            json!({"display_name": "Alerts Bot", "username": "@alerts_bot"}),
        );
        assert_eq!(
            account_secondary(IntegrationKind::Telegram, &integration).as_deref(),
            Some("@alerts_bot")
        );
    }

    #[test]
    fn no_details_means_no_secondary() {
        let integration = record(IntegrationKind::Gads, false, Some("Agency"), Value::Null);
        assert_eq!(account_secondary(IntegrationKind::Gads, &integration), None);
    }

    #[test]
    fn kinds_round_trip_through_their_wire_names() {
        for kind in IntegrationKind::ALL {
            assert_eq!(kind.as_str().parse::<IntegrationKind>(), Ok(kind));
        }
        assert!("tiktok".parse::<IntegrationKind>().is_err());
        assert!(!IntegrationKind::Telegram.is_oauth());
        assert!(IntegrationKind::Gads.requires_developer_token());
    }
}
