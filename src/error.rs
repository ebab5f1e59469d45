//! Error types for tap-dynamics
//!
//! Errors fall into two classes. Fatal ones (bad configuration, failed
//! authentication, unwritable state or output) stop the run. Everything else
//! is scoped to one entity or view and is logged and skipped by the caller;
//! see [`Error::is_fatal`].

use thiserror::Error;

/// The main error type for tap-dynamics
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Token refresh failed: {message}")]
    TokenRefresh { message: String },

    // ============================================================================
    // Transport
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // OData
    // ============================================================================
    #[error("Failed to parse service metadata: {message}")]
    Metadata { message: String },

    #[error("Entity set '{name}' not found in service metadata")]
    EntityNotFound { name: String },

    #[error("Unexpected OData response: {message}")]
    Decode { message: String },

    // ============================================================================
    // Catalog, state and output
    // ============================================================================
    #[error("Catalog error: {message}")]
    Catalog { message: String },

    #[error("State error: {message}")]
    State { message: String },

    #[error("Invalid transition for stream '{stream}': {from} -> {to}")]
    InvalidTransition {
        stream: String,
        from: String,
        to: String,
    },

    #[error("Output error: {message}")]
    Output { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
        }
    }

    pub fn entity_not_found(name: impl Into<String>) -> Self {
        Self::EntityNotFound { name: name.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Transient failure worth another attempt: throttling, timeouts,
    /// refused connections and gateway-class statuses
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            Error::HttpStatus { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Check if this error makes every remaining stream impossible to sync
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
                | Error::FileNotFound { .. }
                | Error::Auth { .. }
                | Error::TokenRefresh { .. }
                | Error::Catalog { .. }
                | Error::State { .. }
                | Error::InvalidTransition { .. }
                | Error::Output { .. }
                | Error::Io(_)
        )
    }

    /// Check if the remote side reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::EntityNotFound { .. } => true,
            Error::HttpStatus { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// The service rejected the bearer credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::HttpStatus { status: 401, .. })
    }
}

/// Result type alias for tap-dynamics
pub type Result<T> = std::result::Result<T, Error>;
