//! Retrieval errors.

use thiserror::Error;

/// Why fetching or decoding one tile failed.
///
/// A retrieval error downgrades its tile to failed and is logged; it never
/// propagates out of a coverage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetrievalError {
    /// The transport could not complete the request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP status {code}")]
    Status { code: u16 },

    /// The body's declared content type is not one we decode.
    #[error("Unsupported content type '{content_type}'")]
    UnsupportedContent { content_type: String },

    /// The service answered with an exception report.
    #[error("Service exception: {message}")]
    ServiceException { message: String },

    /// The body could not be decoded as its declared type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The request was cancelled before it completed.
    #[error("Retrieval cancelled")]
    Cancelled,
}

impl From<std::io::Error> for RetrievalError {
    fn from(e: std::io::Error) -> Self {
        RetrievalError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for RetrievalError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RetrievalError::Status {
                code: status.as_u16(),
            },
            None => RetrievalError::Transport(e.to_string()),
        }
    }
}

impl From<image::ImageError> for RetrievalError {
    fn from(e: image::ImageError) -> Self {
        RetrievalError::Decode(e.to_string())
    }
}

impl From<tiff::TiffError> for RetrievalError {
    fn from(e: tiff::TiffError) -> Self {
        RetrievalError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            RetrievalError::Status { code: 404 }.to_string(),
            "HTTP status 404"
        );
        assert_eq!(
            RetrievalError::UnsupportedContent {
                content_type: "text/html".into()
            }
            .to_string(),
            "Unsupported content type 'text/html'"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(RetrievalError::from(io), RetrievalError::Io(msg) if msg.contains("missing")));
    }
}
