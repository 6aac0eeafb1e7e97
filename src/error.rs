use thiserror::Error;

/// Type alias for Result with GmailError
pub type Result<T> = std::result::Result<T, GmailError>;

/// Process exit code for a successful run
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code for invalid user input (e.g. an empty query)
pub const EXIT_INPUT_ERROR: i32 = 1;
/// Process exit code for authentication failures
pub const EXIT_AUTH_ERROR: i32 = 2;
/// Process exit code for failed Gmail API calls
pub const EXIT_API_ERROR: i32 = 3;
/// Process exit code for anything else
pub const EXIT_UNKNOWN_ERROR: i32 = 4;

/// Error types for the trash mover
#[derive(Error, Debug)]
pub enum GmailError {
    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid message format or parsing error
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic catch-all error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl GmailError {
    /// Check if the error is transient and the call may be retried.
    ///
    /// Only rate limiting (429) and temporary server unavailability (500, 503)
    /// qualify. Every other failure, network errors included, is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            GmailError::RateLimitExceeded { .. } => true,
            GmailError::ServerError { status, .. } => matches!(status, 500 | 503),
            _ => false,
        }
    }

    /// Check if the error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Check if the error was produced by a remote call
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            GmailError::ApiError(_)
                | GmailError::RateLimitExceeded { .. }
                | GmailError::ServerError { .. }
                | GmailError::MessageNotFound(_)
                | GmailError::BadRequest(_)
                | GmailError::Forbidden(_)
                | GmailError::NetworkError(_)
                | GmailError::InvalidMessageFormat(_)
        )
    }

    /// Map the error onto the process exit code reported by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            GmailError::InvalidInput(_) => EXIT_INPUT_ERROR,
            GmailError::AuthError(_) => EXIT_AUTH_ERROR,
            e if e.is_remote() => EXIT_API_ERROR,
            _ => EXIT_UNKNOWN_ERROR,
        }
    }
}

/// Retry-After assumed when Gmail does not send one
const DEFAULT_RETRY_AFTER: u64 = 5;

/// Parse the Retry-After header (delay-seconds form) from an HTTP response.
///
/// Returns 5 seconds when the header is missing or not an integer.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Map an HTTP status onto the matching error variant
fn from_status(status_code: u16, message: String, retry_after: u64) -> GmailError {
    match status_code {
        429 => GmailError::RateLimitExceeded { retry_after },
        404 => GmailError::MessageNotFound(message),
        400 => GmailError::BadRequest(message),
        403 => GmailError::Forbidden(message),
        500..=599 => GmailError::ServerError {
            status: status_code,
            message,
        },
        _ => GmailError::ApiError(message),
    }
}

/// Error for a non-success response whose body was not JSON
fn from_response<B>(response: &hyper::Response<B>) -> GmailError {
    let status = response.status();
    let message = format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );
    from_status(status.as_u16(), message, parse_retry_after_header(response))
}

/// Error for a JSON error body (`{"error": {"code": 503, "message": ...}}`).
///
/// Gmail reports rate limits and backend failures this way, so the embedded
/// code decides the variant. Bodies without a code stay `BadRequest`.
fn from_error_body(body: &serde_json::Value) -> GmailError {
    let error = &body["error"];
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    match error["code"].as_u64().and_then(|c| u16::try_from(c).ok()) {
        Some(code) => from_status(code, format!("HTTP {}: {}", code, message), DEFAULT_RETRY_AFTER),
        None => GmailError::BadRequest(message),
    }
}

impl From<google_gmail1::Error> for GmailError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => from_response(response),
            google_gmail1::Error::BadRequest(ref body) => from_error_body(body),
            google_gmail1::Error::HttpError(ref err) => {
                GmailError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => GmailError::NetworkError(err.to_string()),
            google_gmail1::Error::MissingToken(ref err) => {
                GmailError::AuthError(format!("Missing access token: {}", err))
            }
            _ => GmailError::ApiError(error.to_string()),
        }
    }
}
