use thiserror::Error;

use leadops_core::pipeline::StoreError;

pub mod feedback;
pub mod identity;
pub mod lead_history;
pub mod memory;

pub use feedback::SqlFeedbackStore;
pub use identity::SqlIdentityResolver;
pub use lead_history::{NewDisposition, SqlLeadHistoryStore};
pub use memory::InMemoryLeadStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(sqlx::Error::PoolTimedOut) => StoreError::Timeout,
            RepositoryError::Database(error) => StoreError::Unavailable(error.to_string()),
            RepositoryError::Decode(detail) => StoreError::Decode(detail),
        }
    }
}

fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}
