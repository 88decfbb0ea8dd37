use std::io;

/// Failures of the limb circumference estimator.
///
/// The display strings are the error ids reported to callers and must stay
/// stable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ArcLengthError {
    #[error("Size of xyz Verts is not 3*Nverts")]
    BufferSize,
    #[error("Arc length size is less than 3")]
    MissingPart,
    #[error("arcL[1] is <= 0 or > 100 cm")]
    ThighOutOfRange,
    #[error("Exception error in ArcLength: {0}")]
    Numeric(String),
}

impl ArcLengthError {
    /// Lengths reported alongside any failure.
    pub const SENTINEL: [f32; 3] = [-100.0; 3];
}

/// All error types for the inversion engine.
#[derive(thiserror::Error, Debug)]
pub enum InversionError {
    #[error("Model load error: {0}")]
    ModelLoad(String),
    #[error("Input error: {0}")]
    Input(String),
    #[error("Regression error: {0}")]
    Regression(String),
    #[error("Failed in Laplace: {0}")]
    Laplace(String),
    #[error(transparent)]
    ArcLength(#[from] ArcLengthError),
    #[error("Output error: {0}")]
    Output(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl InversionError {
    /// Error string reported by the raw-buffer inversion path.
    ///
    /// A failed regression reports an empty string; every other failure
    /// reports its message.
    pub fn error_string(&self) -> String {
        match self {
            InversionError::Regression(_) => String::new(),
            other => other.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, InversionError>;
