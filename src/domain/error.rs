use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TodoError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("no {0} ids left to assign")]
    IdsExhausted(&'static str),
}

impl TodoError {
    pub fn validation(message: impl Into<String>) -> Self { Self::Validation(message.into()) }

    pub fn is_validation(&self) -> bool { matches!(self, Self::Validation(_)) }
}

pub type TodoResult<T> = Result<T, TodoError>;
