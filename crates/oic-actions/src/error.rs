//! Error types for manifest loading and action execution
//!
//! Loading failures are [`ManifestError`]s. Each action reports
//! [`ActionError`]s from its validate/run/cleanup phases, and the pipeline
//! wraps the first fatal one in a [`BuildError`] naming the action.

use std::path::PathBuf;
use thiserror::Error;

/// Error raised by a single action
#[derive(Debug, Error)]
pub enum ActionError {
    /// A mandatory property was left empty
    #[error("property \"{property}\" is mandatory for the \"{action}\" action")]
    MissingProperty { property: String, action: String },

    /// A property holds a value the action cannot use
    #[error("invalid property: {0}")]
    InvalidProperty(String),

    /// A resolved path escapes the workspace
    #[error("property \"{property}\" must contain a path relative to the workspace, got {}", .path.display())]
    OutsideWorkspace { property: String, path: PathBuf },

    /// Action execution failed
    #[error("action execution failed: {0}")]
    ExecutionFailed(String),

    /// External command exited with a failure status
    #[error("command '{command}' failed: {status}")]
    CommandFailed { command: String, status: String },

    /// Network failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Server answered with a non-success status
    #[error("failed to download \"{url}\": {status}")]
    HttpStatus { url: String, status: String },

    /// Download destination exists and is a directory
    #[error("destination path \"{}\" is a directory", .0.display())]
    DestinationIsDirectory(PathBuf),

    /// Tree copy met something that is not a file, directory or symlink
    #[error("cannot copy {}: unsupported file type", .0.display())]
    UnsupportedFileType(PathBuf),

    /// Archive could not be extracted
    #[error("archive error: {0}")]
    Archive(String),

    /// Template could not be parsed or rendered
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Revision store failure
    #[error("repository error: {0}")]
    Store(#[from] oic_ostree::StoreError),

    /// I/O error during action execution
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ActionError {
    pub fn missing(property: impl Into<String>, action: impl Into<String>) -> Self {
        ActionError::MissingProperty {
            property: property.into(),
            action: action.into(),
        }
    }
}

/// Result type for action operations
pub type Result<T> = std::result::Result<T, ActionError>;

/// Error raised while loading a manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template expansion failed
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// The expanded text is not a valid manifest document
    #[error("failed to decode manifest: {0}")]
    Decode(#[from] serde_yaml::Error),

    /// An action entry has no kind tag
    #[error("action #{index}: action name not specified")]
    MissingKind { index: usize },

    /// An action entry names a kind that does not exist
    #[error("action #{index}: unknown action \"{kind}\"")]
    UnknownKind { index: usize, kind: String },

    /// An action entry is not shaped like its kind expects
    #[error("action #{index} (\"{kind}\"): {message}")]
    InvalidAction {
        index: usize,
        kind: String,
        message: String,
    },

    /// The manifest declares no actions
    #[error("no actions declared")]
    NoActions,
}

/// Error ending a build
#[derive(Debug, Error)]
pub enum BuildError {
    /// An action rejected its configuration
    #[error("validation of \"{action}\" failed: {source}")]
    Validation {
        action: String,
        #[source]
        source: ActionError,
    },

    /// An action failed while running
    #[error("action \"{action}\" failed: {source}")]
    Run {
        action: String,
        #[source]
        source: ActionError,
    },

    /// The build was interrupted between actions
    #[error("build cancelled")]
    Cancelled,
}

impl BuildError {
    /// Description of the action responsible, if any
    pub fn action(&self) -> Option<&str> {
        match self {
            BuildError::Validation { action, .. } | BuildError::Run { action, .. } => Some(action),
            BuildError::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ActionError::missing("from", "copy");
        assert_eq!(
            err.to_string(),
            "property \"from\" is mandatory for the \"copy\" action"
        );

        let err = ActionError::DestinationIsDirectory(PathBuf::from("/ws/downloads/x"));
        assert_eq!(
            err.to_string(),
            "destination path \"/ws/downloads/x\" is a directory"
        );

        let err = ManifestError::UnknownKind {
            index: 2,
            kind: "frobnicate".to_string(),
        };
        assert_eq!(err.to_string(), "action #2: unknown action \"frobnicate\"");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let action_err: ActionError = io_err.into();
        assert!(matches!(action_err, ActionError::Io(_)));
    }

    #[test]
    fn test_build_error_names_action() {
        let err = BuildError::Run {
            action: "Make ISO".to_string(),
            source: ActionError::CommandFailed {
                command: "genisoimage".to_string(),
                status: "exit status: 2".to_string(),
            },
        };
        assert_eq!(err.action(), Some("Make ISO"));
        assert_eq!(
            err.to_string(),
            "action \"Make ISO\" failed: command 'genisoimage' failed: exit status: 2"
        );
        assert_eq!(BuildError::Cancelled.action(), None);
    }
}
