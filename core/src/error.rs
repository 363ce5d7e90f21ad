//! Error types for the wirehttp client.
//!
//! # Design
//! A single flat enum covers every failure the core can report. Each variant
//! maps to one stage of the request lifecycle: URI parsing, configuration,
//! attachment loading, transport and response parsing. There is no retry or
//! recovery anywhere in the core; errors propagate straight to the caller.
//!
//! A corrupt cookie jar is deliberately absent here: it is repaired in place
//! by `CookieJar::open` rather than reported.

use std::io;
use std::path::PathBuf;

/// Result type alias using the crate's `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by request construction, sending and response parsing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The URI has no scheme, an unsupported scheme, or no host.
    #[error("invalid uri `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// The method is outside GET, HEAD, POST, PUT, DELETE, TRACE, CONNECT.
    #[error("{0} is not a supported method type")]
    UnsupportedMethod(String),

    /// A parameter value is neither a scalar nor an attachment.
    #[error("invalid request parameter: {0}")]
    InvalidParameter(String),

    /// The attachment path does not exist or cannot be read.
    #[error("file {path:?} is not readable or does not exist")]
    FileUnreadable { path: PathBuf },

    /// No stream could be established to the remote host.
    #[error("error {code}: {message}")]
    ConnectionFailed { code: i32, message: String },

    /// The cookie jar file cannot be opened for reading and writing.
    #[error("cannot read or write cookie file {path:?}: {source}")]
    CookieFileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The response status line carries no numeric status code.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Reading from or writing to an established stream failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn invalid_uri<S: ToString>(uri: &str, reason: S) -> Self {
        Self::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_parameter<S: ToString>(key: S) -> Self {
        Self::InvalidParameter(key.to_string())
    }

    /// Build a `ConnectionFailed` from the OS error behind an `io::Error`.
    pub fn connection_failed(err: &io::Error) -> Self {
        Self::ConnectionFailed {
            code: err.raw_os_error().unwrap_or(0),
            message: err.to_string(),
        }
    }
}
