//! Error types for schema convergence and task scheduling.

use std::path::PathBuf;

/// Errors that can occur while converging a schema or running tasks.
#[derive(Debug, thiserror::Error)]
pub enum ConvergeError {
    /// Invalid setup: empty configuration, bad rename target, missing
    /// foreign table or column, malformed task definition.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The task dependency graph contains a cycle.
    #[error("Circular dependency for \"{task}\" detected. Task stack: {}", .stack.join(", "))]
    CircularDependency {
        /// The task that was requested again while still being resolved.
        task: String,
        /// Task names on the resolution stack when the cycle was found.
        stack: Vec<String>,
    },

    /// Database error raised by the driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure while executing a statement or introspecting the schema.
    #[error("Execution error: {0}")]
    Execution(String),

    /// A task's `apply()` failed.
    #[error("Task \"{task}\" failed: {source}")]
    Task {
        /// Name of the failing task.
        task: String,
        /// Underlying error.
        #[source]
        source: Box<ConvergeError>,
    },

    /// IO error (reading task files, writing generated stubs).
    #[error("IO error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConvergeError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Wraps an IO error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for convergence operations.
pub type Result<T> = std::result::Result<T, ConvergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message_lists_stack() {
        let err = ConvergeError::CircularDependency {
            task: "a".to_string(),
            stack: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency for \"a\" detected. Task stack: a, b"
        );
    }

    #[test]
    fn test_task_error_keeps_source() {
        let err = ConvergeError::Task {
            task: "create".to_string(),
            source: Box::new(ConvergeError::config("Table \"parent\" is missing")),
        };
        assert!(err.to_string().contains("create"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
