// Error handling module
// Defines the typed error surfaces of the request pipeline

use thiserror::Error;

/// Errors produced while building, sending or decoding a request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// Base URL and path do not form a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request body or header could not be encoded
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// A response arrived that could not be read as HTTP
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A 2xx body did not match the expected shape
    #[error("Decoding failed: {0}")]
    Decoding(String),

    /// HTTP 401
    #[error("Authorization failed: {body}")]
    Authorization { body: String },

    /// HTTP 4xx other than 401
    #[error("Bad request: {status} - {body}")]
    BadRequest { status: u16, body: String },

    /// HTTP 5xx
    #[error("Server error: {status} - {body}")]
    Server { status: u16, body: String },

    /// No response was received (timeout, connection failure, ...)
    #[error("Transport error ({kind}): {message}")]
    Transport { kind: &'static str, message: String },

    /// Anything the classification above does not cover
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl NetworkError {
    /// Classify a non-2xx status code into the taxonomy
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => NetworkError::Authorization { body },
            400..=499 => NetworkError::BadRequest { status, body },
            500..=599 => NetworkError::Server { status, body },
            _ => NetworkError::Unknown(format!("unexpected status {}: {}", status, body)),
        }
    }

    /// Map a reqwest failure where no response was received
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connection_failed"
        } else if err.is_request() {
            "request_error"
        } else if err.is_body() {
            "body_error"
        } else if err.is_decode() {
            "decode_error"
        } else {
            "unknown"
        };

        NetworkError::Transport {
            kind,
            message: err.to_string(),
        }
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, NetworkError::Authorization { .. })
    }

    /// HTTP status carried by the error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Authorization { .. } => Some(401),
            NetworkError::BadRequest { status, .. } | NetworkError::Server { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Message suitable for showing to the user of a feature
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::InvalidUrl(_) => "The request address is invalid.",
            NetworkError::Encoding(_) => "The request could not be prepared.",
            NetworkError::InvalidResponse(_) => "The server sent an unreadable response.",
            NetworkError::Decoding(_) => "The server response could not be understood.",
            NetworkError::Authorization { .. } => "Your session has expired. Please sign in again.",
            NetworkError::BadRequest { .. } => "The request was rejected.",
            NetworkError::Server { .. } => "The server is having trouble. Please try again later.",
            NetworkError::Transport { .. } => "Could not reach the server. Check your connection.",
            NetworkError::Unknown(_) => "Something went wrong.",
        }
    }
}

/// Credential store failures; `status` is the underlying storage result code
/// (SQLite extended code) or -1 when the failure did not come from storage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Failed to save credentials (status {status}): {message}")]
    SaveFailed { status: i32, message: String },

    #[error("Failed to load credentials (status {status}): {message}")]
    LoadFailed { status: i32, message: String },

    #[error("Failed to delete credentials (status {status}): {message}")]
    DeleteFailed { status: i32, message: String },

    #[error("Stored credentials are invalid (status {status}): {message}")]
    InvalidData { status: i32, message: String },
}

impl StoreError {
    pub fn status(&self) -> i32 {
        match self {
            StoreError::SaveFailed { status, .. }
            | StoreError::LoadFailed { status, .. }
            | StoreError::DeleteFailed { status, .. }
            | StoreError::InvalidData { status, .. } => *status,
        }
    }
}

/// Failures of the token refresh operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefreshError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Refresh request failed: {0}")]
    Network(#[from] NetworkError),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, NetworkError>;
