//! Errors that can end a single classification workflow. None of them are
//! fatal to the process: each maps to a user-visible message and leaves the
//! session ready for another attempt.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No file, an empty file, a file that is too large, or an extension
    /// outside of png/jpg/jpeg
    #[error("upload error: {0}")]
    Upload(String),

    /// The bytes are not a valid image of the declared format
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The model service could not be reached
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The model service answered with a non-success status. `body` is kept
    /// for debug logging only and is never shown to users.
    #[error("model service returned {status}")]
    Service { status: u16, body: String },

    /// The model reply was not the JSON object we asked for
    #[error("{0}")]
    ResponseParse(String),

    /// Missing or invalid process configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A classification is already running for this session
    #[error("a classification is already in progress: retry again later")]
    Busy,

    /// Classification was triggered before an image was uploaded
    #[error("upload an image before starting classification")]
    NoImage,

    /// The task running a classification panicked or was cancelled
    #[error("classification task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("no session with id {0}")]
    SessionNotFound(uuid::Uuid),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ResponseParse(err.to_string())
    }
}

impl Error {
    /// Whether this error came out of the remote call or its reply, as
    /// opposed to the caller's input
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Service { .. } | Error::ResponseParse(_)
        )
    }
}
