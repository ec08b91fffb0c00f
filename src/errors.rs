use std::io;

use thiserror::Error;

use crate::types::SourceId;

/// Error type for fetch, normalization, configuration, and export failures.
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// The upstream could not be reached, rejected the request, or returned
    /// nothing usable.
    #[error("data source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable {
        /// Source that failed.
        source_id: SourceId,
        /// Human-readable cause, including attempt counts for HTTP failures.
        reason: String,
    },
    /// A payload could not be normalized at all.
    #[error("data source '{source_id}' produced a malformed record: {details}")]
    MalformedRecord {
        /// Source whose payload was rejected.
        source_id: SourceId,
        /// What was wrong with it.
        details: String,
    },
    /// A required credential or setting is absent.
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),
    /// A setting or argument is present but invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Filesystem failure during export.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ExplorerError {
    /// Returns `true` for failures the dashboard recovers from with an empty state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExplorerError::SourceUnavailable { .. } | ExplorerError::MalformedRecord { .. }
        )
    }
}

impl Clone for ExplorerError {
    /// `io::Error` is not `Clone`; the copy keeps its kind and message.
    fn clone(&self) -> Self {
        match self {
            ExplorerError::SourceUnavailable { source_id, reason } => {
                ExplorerError::SourceUnavailable {
                    source_id: source_id.clone(),
                    reason: reason.clone(),
                }
            }
            ExplorerError::MalformedRecord { source_id, details } => {
                ExplorerError::MalformedRecord {
                    source_id: source_id.clone(),
                    details: details.clone(),
                }
            }
            ExplorerError::MissingConfiguration(what) => {
                ExplorerError::MissingConfiguration(what.clone())
            }
            ExplorerError::Configuration(what) => ExplorerError::Configuration(what.clone()),
            ExplorerError::Io(err) => {
                ExplorerError::Io(io::Error::new(err.kind(), err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_keep_variant_and_message() {
        let err = ExplorerError::Io(io::Error::new(io::ErrorKind::NotFound, "missing.csv"));
        let copy = err.clone();
        assert!(matches!(
            &copy,
            ExplorerError::Io(inner) if inner.kind() == io::ErrorKind::NotFound
        ));
        assert_eq!(copy.to_string(), err.to_string());

        let unavailable = ExplorerError::SourceUnavailable {
            source_id: "news".into(),
            reason: "HTTP 503".into(),
        };
        assert!(unavailable.clone().is_recoverable());
        assert_eq!(unavailable.clone().to_string(), unavailable.to_string());
    }
}
