//! Error types for revision store operations

use std::path::PathBuf;
use thiserror::Error;

/// Error type for revision store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path does not hold a repository
    #[error("not an ostree repository: {0}")]
    NotARepository(PathBuf),

    /// The ostree tool exited with a failure status
    #[error("command '{command}' failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The ostree tool could not be spawned
    #[error("failed to run ostree: {0}")]
    Spawn(#[source] std::io::Error),

    /// Output from the ostree tool could not be understood
    #[error("unexpected output: {0}")]
    Parse(String),

    /// A revision could not be resolved
    #[error("cannot resolve revision '{0}'")]
    UnknownRevision(String),

    /// I/O error on the local filesystem
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for revision store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotARepository(PathBuf::from("/tmp/nope"));
        assert_eq!(err.to_string(), "not an ostree repository: /tmp/nope");

        let err = StoreError::CommandFailed {
            command: "ostree rev-parse foo".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "error: Refspec 'foo' not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "command 'ostree rev-parse foo' failed (exit status: 1): error: Refspec 'foo' not found"
        );

        let err = StoreError::UnknownRevision("main".to_string());
        assert_eq!(err.to_string(), "cannot resolve revision 'main'");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StoreError = io_err.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
