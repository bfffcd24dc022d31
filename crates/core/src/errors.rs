use thiserror::Error;

use crate::pipeline::store::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} `{key}` was already processed")]
    Conflict { entity: &'static str, key: String },
    #[error("storage unavailable during {operation}: {detail}")]
    StorageUnavailable { operation: &'static str, detail: String },
    #[error("storage timed out during {operation}")]
    StorageTimeout { operation: &'static str },
    #[error("malformed `{field}` value `{value}`")]
    MalformedPayload { field: &'static str, value: String },
}

impl PipelineError {
    pub fn from_store(operation: &'static str, error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity, key } => Self::NotFound { entity, key },
            StoreError::Conflict { entity, key } => Self::Conflict { entity, key },
            error @ StoreError::CustomerMismatch { .. } => Self::Validation(error.to_string()),
            StoreError::Timeout => Self::StorageTimeout { operation },
            StoreError::Unavailable(detail) | StoreError::Decode(detail) => {
                Self::StorageUnavailable { operation, detail }
            }
        }
    }

    /// Failures worth another attempt when the operation is a read.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. } | Self::StorageTimeout { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text that is safe to hand back to a caller. Validation, lookup and
    /// conflict details are actionable; storage details never leave the
    /// process.
    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. } => message.clone(),
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly.".to_string()
            }
            Self::Internal { .. } => "An unexpected internal error occurred.".to_string(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl PipelineError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<PipelineError> for InterfaceError {
    fn from(value: PipelineError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            PipelineError::Validation(message) => Self::BadRequest { message, correlation_id },
            error @ PipelineError::NotFound { .. } => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            error @ PipelineError::Conflict { .. } => {
                Self::Conflict { message: error.to_string(), correlation_id }
            }
            error @ (PipelineError::StorageUnavailable { .. }
            | PipelineError::StorageTimeout { .. }) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            error @ PipelineError::MalformedPayload { .. } => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
        }
    }
}
