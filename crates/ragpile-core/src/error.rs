//! Error taxonomy for ragpile-core.
//!
//! Every fallible operation in the crate returns [`Result`]. Failures are
//! surfaced to the caller as-is; nothing here retries.

use reqwest::StatusCode;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Non-success HTTP status. Displays as the status text only.
    #[error("{status_text}")]
    Response {
        status: StatusCode,
        status_text: String,
    },

    /// A stream chunk carried no JSON object, or the object failed to parse.
    #[error("Malformed stream chunk: {0}")]
    MalformedChunk(String),

    /// The HTTP transport failed (connect, body read, response decode).
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API root or an endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// The other side of a one-shot auth channel went away before posting.
    #[error("Channel closed before a message arrived")]
    ChannelClosed,
}

impl Error {
    /// Build a [`Error::Response`] from a status code, using its canonical reason as text.
    pub fn from_status(status: StatusCode) -> Self {
        Error::Response {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }

    /// HTTP status for response failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Response { status, .. } => Some(*status),
            Error::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Stable coarse-grained code for machine-readable output.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Response { status, .. } if *status == StatusCode::UNAUTHORIZED => "unauthorized",
            Error::Response { status, .. } if *status == StatusCode::NOT_FOUND => "not_found",
            Error::Response { .. } => "response_error",
            Error::MalformedChunk(_) => "malformed_chunk",
            Error::Transport(_) => "transport_error",
            Error::Url(_) | Error::Config(_) | Error::ConfigParse(_) => "invalid_config",
            Error::Io(_) => "io_error",
            Error::ChannelClosed => "channel_closed",
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Io(e) => e.kind(),
            Error::Response { status, .. } if *status == StatusCode::NOT_FOUND => {
                io::ErrorKind::NotFound
            }
            Error::Response { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN =>
            {
                io::ErrorKind::PermissionDenied
            }
            Error::MalformedChunk(_) => io::ErrorKind::InvalidData,
            Error::Url(_) | Error::Config(_) | Error::ConfigParse(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
