use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReuneError {
    #[error("not initialized: run 'reune init'")]
    NotInitialized,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: u64 },

    /// A query matched nothing worth reporting.
    #[error("{0}")]
    NoData(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ReuneError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReuneError>;
