use thiserror::Error;

/// Errors surfaced by the store, the resolvers and the loaders
#[derive(Debug, Error)]
pub enum PricebookError {
    /// Caller input failed a precondition
    #[error("{0}")]
    Validation(String),

    /// No matching record, or the matched record has no usable rate
    #[error("{0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("{0}")]
    Infrastructure(String),
}

impl PricebookError {
    /// Store or transport failure, as opposed to a problem with the request
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            PricebookError::Storage(_)
                | PricebookError::Pool(_)
                | PricebookError::Infrastructure(_)
        )
    }
}

pub type PricebookResult<T> = Result<T, PricebookError>;
