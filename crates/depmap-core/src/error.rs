//! Error taxonomy for analysis runs.
//!
//! Per-file failures (unreadable or unparsable sources) are not errors at
//! this level: they are recorded on the file's `FileAnalysis` and the run
//! continues. The variants here are the failures that surface to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The project root does not exist, is unreadable, or contains no
    /// candidate files.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The cache index or an entry could not be used. Callers normally treat
    /// this as a miss and fall back to full analysis; it surfaces only when
    /// the cache directory itself is unusable.
    #[error("cache error: {0}")]
    Cache(String),

    /// The memory ceiling cannot be honoured even at the minimum batch size.
    #[error("resource limit exceeded: {0}")]
    Resource(String),

    /// The run was cancelled; partial state has been discarded.
    #[error("analysis cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A bug: an internal invariant did not hold. Never swallowed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AnalyzeError {
    fn from(err: anyhow::Error) -> Self {
        AnalyzeError::Internal(err.to_string())
    }
}

pub type AnalyzeResult<T> = Result<T, AnalyzeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AnalyzeError::InvalidInput("no such directory".into());
        assert_eq!(err.to_string(), "invalid input: no such directory");
        assert_eq!(AnalyzeError::Cancelled.to_string(), "analysis cancelled");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AnalyzeError = io.into();
        assert!(matches!(err, AnalyzeError::Io(_)));
    }

    #[test]
    fn test_anyhow_becomes_internal() {
        let err: AnalyzeError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, AnalyzeError::Internal(_)));
    }
}
