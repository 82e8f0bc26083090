use thiserror::Error;

/// Structural errors raised while building or querying the line graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HumdrumError {
    #[error("Token index {index} out of range on line {line} ({count} tokens)")]
    TokenIndexOutOfRange {
        line: usize,
        index: usize,
        count: usize,
    },

    #[error("Line {line}: expected {expected} spines but found {found}")]
    SpineCountMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: data before the first exclusive interpretation")]
    SpineNotStarted { line: usize },

    #[error("Line {line}: {message}")]
    Manipulator { line: usize, message: String },
}

/// Failure reported by token duration analysis. The first failing token on a
/// line is the one reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Line {line}, field {field}: {message}")]
pub struct AnalysisError {
    pub line: usize,
    pub field: usize,
    pub message: String,
}

impl AnalysisError {
    pub fn new(line: usize, field: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            field,
            message: message.into(),
        }
    }
}
