//! Error taxonomy shared by every layer of the pipeline

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DaltekError {
    /// Malformed JSON or otherwise unparseable payload
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Structurally incomplete query or mapper configuration
    #[error("Invalid specification: {0}")]
    InvalidSpec(String),

    /// Semantic mismatch: unknown column, incompatible operator, bad shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Failure while transforming or adapting data
    #[error("Execution error: {0}")]
    Execution(String),

    /// Saved query or widget id absent
    #[error("Not found: {0}")]
    NotFound(String),
}

impl DaltekError {
    pub fn kind(&self) -> &'static str {
        match self {
            DaltekError::InvalidInput(_) => "InvalidInput",
            DaltekError::InvalidSpec(_) => "InvalidSpec",
            DaltekError::Validation(_) => "ValidationError",
            DaltekError::Execution(_) => "ExecutionError",
            DaltekError::NotFound(_) => "NotFoundError",
        }
    }
}

impl From<serde_json::Error> for DaltekError {
    fn from(err: serde_json::Error) -> Self {
        DaltekError::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DaltekError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(DaltekError::InvalidSpec("x".into()).kind(), "InvalidSpec");
        assert_eq!(DaltekError::NotFound("q1".into()).kind(), "NotFoundError");
    }

    #[test]
    fn test_json_error_is_invalid_input() {
        let err: DaltekError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "InvalidInput");
    }
}
