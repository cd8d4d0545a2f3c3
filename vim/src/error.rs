//! Error types for inventory and device operations.

use crate::task::TaskState;
use core::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classification of failure types for reporting and exit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Bad input - fix the identifier or setting and run again.
    Configuration,
    /// Authentication/authorization failure.
    Authentication,
    /// Network-related failure.
    Network,
    /// The named object does not exist.
    NotFound,
    /// The remote platform rejected or failed the operation.
    Remote,
    /// Operation may succeed if run again.
    Transient,
    /// Unknown failure type.
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Configuration => write!(f, "Configuration"),
            FailureType::Authentication => write!(f, "Authentication"),
            FailureType::Network => write!(f, "Network"),
            FailureType::NotFound => write!(f, "NotFound"),
            FailureType::Remote => write!(f, "Remote"),
            FailureType::Transient => write!(f, "Transient"),
            FailureType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Inventory, device and task errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid datastore path {0:?}: expected \"[datastore] relative/path\"")]
    InvalidDatastorePath(String),

    #[error("invalid inventory path {0:?}: expected \"/<datacenter>/...\"")]
    InvalidInventoryPath(String),

    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("authentication failed for {url}: {message}")]
    Authentication { url: String, message: String },

    #[error("failed to list children of {path}: {message}")]
    ListFailed { path: String, message: String },

    #[error("VM not found: {0}")]
    VmNotFound(String),

    #[error("no disk controller found on VM {0}")]
    ControllerNotFound(String),

    #[error("task {task} for '{operation}' failed in state {state}: {message}")]
    TaskFailed {
        operation: &'static str,
        task: String,
        state: TaskState,
        message: String,
    },

    #[error("task {task} for '{operation}' timed out after {timeout:?} in state {last_state}")]
    TaskTimeout {
        operation: &'static str,
        task: String,
        timeout: Duration,
        last_state: TaskState,
    },

    #[error("disk {disk} not present on VM {vm} after attach completed")]
    AttachNotConfirmed { vm: String, disk: String },

    #[error("govc {command} failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("unexpected govc output for {command}: {source}")]
    Json {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the failure type classification for this error.
    pub fn failure_type(&self) -> FailureType {
        match self {
            Error::InvalidDatastorePath(_) => FailureType::Configuration,
            Error::InvalidInventoryPath(_) => FailureType::Configuration,
            Error::Connection { .. } => FailureType::Network,
            Error::Authentication { .. } => FailureType::Authentication,
            Error::ListFailed { .. } => FailureType::Remote,
            Error::VmNotFound(_) => FailureType::NotFound,
            Error::ControllerNotFound(_) => FailureType::NotFound,
            Error::TaskFailed { .. } => FailureType::Remote,
            Error::TaskTimeout { .. } => FailureType::Transient,
            Error::AttachNotConfirmed { .. } => FailureType::Remote,
            Error::CommandFailed { .. } => FailureType::Unknown,
            Error::Json { .. } => FailureType::Unknown,
            Error::Io(_) => FailureType::Transient,
        }
    }

    /// Check if this error came from bad input rather than the platform.
    pub fn is_configuration(&self) -> bool {
        self.failure_type() == FailureType::Configuration
    }

    /// Create a task failed error.
    pub fn task_failed(
        operation: &'static str,
        task: impl Into<String>,
        state: TaskState,
        message: impl Into<String>,
    ) -> Self {
        Error::TaskFailed {
            operation,
            task: task.into(),
            state,
            message: message.into(),
        }
    }

    /// Create a task timeout error.
    pub fn task_timeout(
        operation: &'static str,
        task: impl Into<String>,
        timeout: Duration,
        last_state: TaskState,
    ) -> Self {
        Error::TaskTimeout {
            operation,
            task: task.into(),
            timeout,
            last_state,
        }
    }

    /// Create a command failed error.
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// Result type for inventory and device operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_type_classification() {
        assert_eq!(
            Error::InvalidDatastorePath("x".into()).failure_type(),
            FailureType::Configuration
        );
        assert_eq!(
            Error::VmNotFound("/dc1/vm/web01".into()).failure_type(),
            FailureType::NotFound
        );
        assert_eq!(
            Error::task_timeout("detach", "task-1", Duration::from_secs(1), TaskState::Running)
                .failure_type(),
            FailureType::Transient
        );
        assert!(Error::InvalidInventoryPath("vm".into()).is_configuration());
        assert!(!Error::ControllerNotFound("web01".into()).is_configuration());
    }

    #[test]
    fn test_error_display() {
        let err = Error::task_failed("detach", "task-7", TaskState::Error, "device busy");
        assert_eq!(
            err.to_string(),
            "task task-7 for 'detach' failed in state Error: device busy"
        );

        let err = Error::ControllerNotFound("/dc1/vm/web01".into());
        assert_eq!(err.to_string(), "no disk controller found on VM /dc1/vm/web01");
    }
}
