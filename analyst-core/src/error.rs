//! Errors surfaced by tracker operations

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while reading or writing tracker data
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Missing required field: {field}")]
    Validation { field: &'static str },

    #[error("Failed to {operation}")]
    RemoteWrite {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to {operation}")]
    RemoteRead {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Analyst not found: {0}")]
    NotFound(Uuid),

    #[error("Analyst {id} still has {interactions} interaction(s) and {reports} report mention(s)")]
    HasChildren {
        id: Uuid,
        interactions: usize,
        reports: usize,
    },
}

impl TrackerError {
    pub(crate) fn write(operation: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| TrackerError::RemoteWrite { operation, source }
    }

    pub(crate) fn read(operation: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| TrackerError::RemoteRead { operation, source }
    }
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

/// Returns a validation error when a required text field is blank
pub(crate) fn require(field: &'static str, value: &str) -> TrackerResult<()> {
    if value.trim().is_empty() {
        Err(TrackerError::Validation { field })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_blank() {
        assert!(require("name", "Jane").is_ok());
        let err = require("name", "   ").unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: name");
        assert!(matches!(err, TrackerError::Validation { field: "name" }));
    }

    #[test]
    fn test_remote_write_keeps_source() {
        let err = TrackerError::write("insert interaction")(anyhow::anyhow!("disk full"));
        assert_eq!(err.to_string(), "Failed to insert interaction");
        assert!(matches!(err, TrackerError::RemoteWrite { .. }));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk full"));
    }
}
