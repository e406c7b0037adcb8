use crate::formula::{CompileError, VmError};

/// Crate-level error type. Formula problems keep their structured form so
/// callers can still render a caret diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("evaluation failed: {0}")]
    Vm(#[from] VmError),
    #[error("render worker is not running")]
    WorkerClosed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("{message}")]
    Validation { message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
