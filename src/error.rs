use std::fmt;

#[derive(Debug)]
pub enum ViewerError {
    NotFound { query: String, status: Option<u16> },
    NetworkError(String),
    DecodeError(image::ImageError),
    MalformedData(String),
    Precondition(String),
    ConfigurationError(String),
    RemoteApiError { status: u16, body: String },
    IoError(std::io::Error),
    ActionFailed(String),
}

impl fmt::Display for ViewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerError::NotFound { query, status: Some(status) } => {
                write!(f, "Not found: '{}' (HTTP {})", query, status)
            }
            ViewerError::NotFound { query, status: None } => {
                write!(f, "Not found: no match for '{}'", query)
            }
            ViewerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ViewerError::DecodeError(e) => write!(f, "Image decode error: {}", e),
            ViewerError::MalformedData(msg) => write!(f, "Malformed data: {}", msg),
            ViewerError::Precondition(msg) => write!(f, "Precondition failed: {}", msg),
            ViewerError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            ViewerError::RemoteApiError { status, body } => {
                write!(f, "Remote API error ({}): {}", status, body)
            }
            ViewerError::IoError(e) => write!(f, "IO error: {}", e),
            ViewerError::ActionFailed(msg) => write!(f, "Action failed: {}", msg),
        }
    }
}

impl std::error::Error for ViewerError {}

impl From<reqwest::Error> for ViewerError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ViewerError::NetworkError(format!("request timed out: {}", error))
        } else {
            ViewerError::NetworkError(error.to_string())
        }
    }
}

impl From<image::ImageError> for ViewerError {
    fn from(error: image::ImageError) -> Self {
        ViewerError::DecodeError(error)
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(error: serde_json::Error) -> Self {
        ViewerError::MalformedData(error.to_string())
    }
}

impl From<base64::DecodeError> for ViewerError {
    fn from(error: base64::DecodeError) -> Self {
        ViewerError::MalformedData(format!("invalid base64 image data: {}", error))
    }
}

impl From<std::io::Error> for ViewerError {
    fn from(error: std::io::Error) -> Self {
        ViewerError::IoError(error)
    }
}

pub type ViewerResult<T> = std::result::Result<T, ViewerError>;
