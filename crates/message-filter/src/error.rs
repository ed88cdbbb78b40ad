use thiserror::Error;

/// Filter failures. Both variants carry the user's script for diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Message filter compilation failed: {reason}. Filter: {script}")]
    Compile { script: String, reason: String },

    #[error("Message filter evaluation failed: {reason}. Filter: {script}")]
    Eval { script: String, reason: String },
}

pub type Result<T> = std::result::Result<T, FilterError>;
