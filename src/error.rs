use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Not eligible: {0}")]
    NotEligible(String),
    #[error("Feedback has already been submitted for this session")]
    AlreadySubmitted,
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Server error: {0}")]
    Server(#[from] sqlx::Error),
}

pub type PortalResult<T> = Result<T, PortalError>;
