//! Domain errors and their HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quick_xml::DeError;
use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

const UPSTREAM_BODY: &str = "Failed to fetch data from external API";
const STATIC_SOURCE_BODY: &str = "Failed to load stop directory";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The upstream feed answered with a status other than 200.
    #[error("upstream feed returned status {0}")]
    Upstream(StatusCode),

    /// The upstream feed could not be reached (connect error, timeout, bad body).
    #[error("upstream feed unreachable: {0}")]
    Unreachable(String),

    /// A single feed line could not be turned into a vehicle record.
    #[error("invalid feed record on line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },

    /// A stop row lacks one of the required fields.
    #[error("stop {} is missing field `{field}`", .id.as_deref().unwrap_or("?"))]
    IncompleteRecord { id: Option<String>, field: &'static str },

    /// The stop directory file is missing or unparsable.
    #[error("static source: {0}")]
    StaticSource(String),
}

impl Error {
    /// The HTTP status this error is surfaced with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Upstream(status) => *status,
            Self::Unreachable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Unreachable(err.to_string())
    }
}

impl From<DeError> for Error {
    fn from(err: DeError) -> Self {
        Self::StaticSource(format!("failed to deserialize stop directory: {err}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::StaticSource(err.to_string())
    }
}

/// Plain-text error response returned by the HTTP handlers.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: &'static str,
}

impl HttpError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        let body = match err {
            Error::Upstream(_) | Error::Unreachable(_) => UPSTREAM_BODY,
            _ => STATIC_SOURCE_BODY,
        };
        tracing::error!(error = %err, "request failed");
        Self { status: err.status(), body }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}
