use thiserror::Error;
use tk_codec::CodecError;
use tk_store::StoreError;

/// Failures of tiddler store operations.
#[derive(Debug, Error)]
pub enum KeepError {
    /// The ref names no title, or neither a bag nor a recipe.
    #[error("invalid tiddler reference: {0}")]
    InvalidReference(String),

    #[error("unsupported recipe: {0:?}")]
    UnsupportedRecipe(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed input: {0}")]
    MalformedInput(#[from] CodecError),

    /// The bootstrap document could not be assembled.
    #[error("index assembly failed: {0}")]
    Assembly(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeepError {
    /// The caller asked for something invalid or absent, as opposed to the
    /// store failing.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidReference(_)
                | Self::UnsupportedRecipe(_)
                | Self::NotFound(_)
                | Self::MalformedInput(_)
        )
    }
}

pub type KeepResult<T> = Result<T, KeepError>;
