use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Application already processed")]
    AlreadyProcessed,

    /// The application is approved but the user's entitlement was not written.
    /// Safe to retry through the repair operation.
    #[error("Entitlement write failed: {0}")]
    EntitlementWriteFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Store-level failures that are safe to retry because every write is conditional.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::EntitlementWriteFailed(_) | AppError::Internal(_)
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidCredentials,
    Forbidden,
    InvalidInput,
    NotFound,
    AlreadyProcessed,
    EntitlementWriteFailed,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyProcessed => "ALREADY_PROCESSED",
            ErrorCode::EntitlementWriteFailed => "ENTITLEMENT_WRITE_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
