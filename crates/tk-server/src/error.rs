use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tk_codec::CodecError;
use tk_keep::KeepError;
use tk_store::StoreError;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Keep(#[from] KeepError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CodecError> for ServerError {
    fn from(e: CodecError) -> Self {
        Self::Keep(KeepError::MalformedInput(e))
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        Self::Keep(KeepError::Store(e))
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Keep(KeepError::NotFound(_))
            | Self::Keep(KeepError::Store(StoreError::NotFound(_))) => StatusCode::NOT_FOUND,
            Self::Keep(
                KeepError::InvalidReference(_)
                | KeepError::UnsupportedRecipe(_)
                | KeepError::MalformedInput(_),
            ) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{self}\n"),
        )
            .into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
