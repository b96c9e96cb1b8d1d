use thiserror::Error;

use cove_backend::BackendError;
use cove_types::rows::RowError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Row(#[from] RowError),

    /// Rejected before any network call.
    #[error("{0}")]
    Validation(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),
}

pub type Result<T> = std::result::Result<T, ClientError>;
