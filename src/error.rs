//! Error types for the Cloud Databases client

use std::fmt;

use thiserror::Error;

/// Main error type for the Cloud Databases client
#[derive(Error, Debug)]
pub enum CloudDbError {
    /// Credential rejection or malformed auth response; fatal to session
    /// establishment and never retried
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Transport exhaustion or disallowed re-authentication after token expiry
    #[error("Connection error: {0}")]
    Connection(String),

    /// A required argument was not supplied, or was empty
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// Caller supplied invalid request parameters; raised before any HTTP call
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// A fault reported by the remote API
    #[error(transparent)]
    Api(#[from] ApiFault),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decode error when parsing a response payload
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for Cloud Databases operations
pub type Result<T> = std::result::Result<T, CloudDbError>;

impl CloudDbError {
    /// Create an authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a missing argument error
    pub fn missing_argument(msg: impl Into<String>) -> Self {
        Self::MissingArgument(msg.into())
    }

    /// Create a syntax error
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }
}

/// Named category of a remote fault, derived from the sole key of the
/// JSON error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FaultKind {
    /// Internal service fault
    ServiceFault,
    /// Fault scoped to a database instance
    InstanceFault,
    /// The service is temporarily unavailable
    ServiceUnavailable,
    /// The request was not authorized
    Unauthorized,
    /// The request was malformed or invalid
    BadRequest,
    /// The requested resource does not exist
    ItemNotFound,
    /// An account limit was exceeded
    OverLimit,
    /// The entity cannot be modified in its current state
    ImmutableEntity,
    /// The request was well-formed but semantically invalid
    UnprocessableEntity,
    /// Any fault the client does not recognize
    Other,
}

impl FaultKind {
    /// Map a capitalized fault name from an error body to a kind.
    fn from_name(name: &str) -> Self {
        match name {
            "ServiceFault" => Self::ServiceFault,
            "InstanceFault" => Self::InstanceFault,
            "ServiceUnavailable" => Self::ServiceUnavailable,
            "Unauthorized" => Self::Unauthorized,
            "BadRequest" => Self::BadRequest,
            "ItemNotFound" => Self::ItemNotFound,
            "OverLimit" => Self::OverLimit,
            "ImmutableEntity" => Self::ImmutableEntity,
            "UnprocessableEntity" => Self::UnprocessableEntity,
            _ => Self::Other,
        }
    }

    /// Canonical name of the fault kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceFault => "ServiceFault",
            Self::InstanceFault => "InstanceFault",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::Unauthorized => "Unauthorized",
            Self::BadRequest => "BadRequest",
            Self::ItemNotFound => "ItemNotFound",
            Self::OverLimit => "OverLimit",
            Self::ImmutableEntity => "ImmutableEntity",
            Self::UnprocessableEntity => "UnprocessableEntity",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified fault reported by the remote API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message} (status {status})")]
pub struct ApiFault {
    /// Category of the fault
    pub kind: FaultKind,
    /// Human-readable message from the error body
    pub message: String,
    /// HTTP status code of the response
    pub status: u16,
    /// Raw response body
    pub body: String,
}

/// Classify a response by status code and body.
///
/// Returns `Ok(())` for any status in the 200-299 range. Anything else is
/// mapped to an [`ApiFault`]: the error body is expected to be a JSON object
/// whose single top-level key names the fault and whose value carries a
/// `message` field. Unparseable bodies and unrecognized fault names fall back
/// to [`FaultKind::Other`] with a synthesized message.
pub(crate) fn classify(status: u16, body: &str) -> Result<()> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(CloudDbError::Api(fault_from_response(status, body)))
}

fn fault_from_response(status: u16, body: &str) -> ApiFault {
    if let Some((kind, message)) = parse_fault_body(body) {
        if kind != FaultKind::Other {
            return ApiFault {
                kind,
                message,
                status,
                body: body.to_string(),
            };
        }
    }
    ApiFault {
        kind: FaultKind::Other,
        message: format!("The server returned status {status} with body {body}"),
        status,
        body: body.to_string(),
    }
}

fn parse_fault_body(body: &str) -> Option<(FaultKind, String)> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let (name, detail) = value.as_object()?.iter().next()?;
    let kind = FaultKind::from_name(&capitalize(name));
    let message = detail
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some((kind, message))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
