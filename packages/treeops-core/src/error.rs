use thiserror::Error;

use crate::ops::Path;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("path not found: {0:?}")]
    PathNotFound(Path),
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}
