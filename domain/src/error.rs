//! Error types for the `domain` layer.
use reqwest::StatusCode;
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums. The `source` field holds the original error (transport, JSON decoding)
/// when there is one. Components never surface the tree itself: they show
/// [`Error::message`], the single best human-readable text for the failure.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Errors raised on the client before (or instead of) talking to the backend.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Validation(ValidationErrorKind),
    /// Another action is already in flight for the same card or row.
    Busy,
    Config,
    Other(String),
}

/// Client-side validation failures. None of these issue a network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    MissingClientCredentials,
    MissingDeveloperToken,
    MissingBotToken,
    NoFilesStaged,
    NoOrientationsSelected,
    UnsupportedOperation,
}

/// Message for transport failures raised outside an endpoint call.
pub const NETWORK_FALLBACK: &str = "Could not reach the backend";
/// Message for undecodable bodies raised outside an endpoint call.
pub const INVALID_RESPONSE_FALLBACK: &str = "The backend sent an unexpected response";

/// Errors that originate from the backend or the network between us.
///
/// Every variant carries the endpoint-specific `fallback` shown when the
/// backend gave no `detail`.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// Transport failure: connection refused, TLS, reset, ...
    Network { fallback: &'static str },
    /// Non-2xx response. `detail` is the backend's `{detail}` string when the
    /// body carried one; `fallback` is the endpoint-specific message.
    Backend {
        status: StatusCode,
        detail: Option<String>,
        fallback: &'static str,
    },
    /// 2xx response whose body did not match the expected shape.
    InvalidResponse { fallback: &'static str },
}

impl ValidationErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            ValidationErrorKind::MissingClientCredentials => "Enter a Client ID and Client Secret",
            ValidationErrorKind::MissingDeveloperToken => {
                "Enter a developer token for Google Ads"
            }
            ValidationErrorKind::MissingBotToken => "Enter a bot token",
            ValidationErrorKind::NoFilesStaged => "Add at least one video file",
            ValidationErrorKind::NoOrientationsSelected => {
                "Select at least one orientation to generate"
            }
            ValidationErrorKind::UnsupportedOperation => {
                "This action is not available for this integration"
            }
        }
    }
}

impl Error {
    pub fn validation(kind: ValidationErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Validation(kind)),
        }
    }

    pub fn busy() -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Busy),
        }
    }

    pub fn backend(status: StatusCode, detail: Option<String>, fallback: &'static str) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::External(ExternalErrorKind::Backend {
                status,
                detail,
                fallback,
            }),
        }
    }

    /// Replaces the generic text of a transport or decoding failure with the
    /// endpoint's own message. Other kinds are returned unchanged.
    pub fn with_fallback(mut self, endpoint_fallback: &'static str) -> Self {
        match &mut self.error_kind {
            DomainErrorKind::External(ExternalErrorKind::Network { fallback })
            | DomainErrorKind::External(ExternalErrorKind::InvalidResponse { fallback }) => {
                *fallback = endpoint_fallback;
            }
            _ => {}
        }
        self
    }

    /// Returns the validation kind when this is a client-side validation failure.
    pub fn validation_kind(&self) -> Option<ValidationErrorKind> {
        match self.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Validation(kind)) => Some(kind),
            _ => None,
        }
    }

    /// Returns the HTTP status of a backend rejection.
    pub fn status(&self) -> Option<StatusCode> {
        match &self.error_kind {
            DomainErrorKind::External(ExternalErrorKind::Backend { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// The best available human-readable message for this error.
    ///
    /// Backend rejections prefer the `detail` the backend sent, then the
    /// endpoint fallback. Transport and decoding failures carry no detail and
    /// use the fallback alone.
    pub fn message(&self) -> String {
        match &self.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Validation(kind)) => {
                kind.message().to_string()
            }
            DomainErrorKind::Internal(InternalErrorKind::Busy) => {
                "Another action is still in progress".to_string()
            }
            DomainErrorKind::Internal(InternalErrorKind::Config) => {
                "Console configuration is invalid".to_string()
            }
            DomainErrorKind::Internal(InternalErrorKind::Other(message)) => message.clone(),
            DomainErrorKind::External(ExternalErrorKind::Backend {
                detail, fallback, ..
            }) => detail
                .clone()
                .filter(|detail| !detail.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string()),
            DomainErrorKind::External(ExternalErrorKind::Network { fallback })
            | DomainErrorKind::External(ExternalErrorKind::InvalidResponse { fallback }) => {
                fallback.to_string()
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        if err.is_builder() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build backend request".to_string(),
                )),
            }
        } else if err.is_decode() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::InvalidResponse {
                    fallback: INVALID_RESPONSE_FALLBACK,
                }),
            }
        // Errors that result from issues with the network call itself.
        } else {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network {
                    fallback: NETWORK_FALLBACK,
                }),
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::External(ExternalErrorKind::InvalidResponse {
                fallback: INVALID_RESPONSE_FALLBACK,
            }),
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "Invalid URL".to_string(),
            )),
        }
    }
}
