use thiserror::Error;

/// Failures decoding a tiddler from one of its wire forms.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("text form is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed field line: {0:?}")]
    MalformedField(String),

    #[error("header is not terminated by a blank line")]
    MissingBody,

    #[error("invalid revision timestamp {value:?}: {reason}")]
    InvalidRevision { value: String, reason: String },

    #[error("invalid node reference: {0:?}")]
    InvalidNodeRef(String),

    #[error("invalid base64 body: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub type CodecResult<T> = Result<T, CodecError>;
