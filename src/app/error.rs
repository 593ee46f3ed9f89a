use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Failures surfaced by the core services.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{reason}")]
    Forbidden { reason: String },

    #[error("perpetuate exceeds your max ({max_allowed})")]
    MaxExceeded { max_allowed: f64 },

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return Self::NotFound("record not found".into());
        }
        if let Some(db_err) = err.as_database_error() {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    return Self::Conflict(format!("duplicate value violates {}", constraint));
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    return Self::NotFound(format!("referenced record not found ({})", constraint));
                }
                Some(CHECK_VIOLATION) => {
                    return Self::InvalidInput(format!("value rejected by {}", constraint));
                }
                _ => {}
            }
        }
        Self::Internal(err.into())
    }
}
