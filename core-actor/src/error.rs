use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Failure raised by an actor hook.
#[derive(Error, Debug)]
pub enum ActorError {
    /// A hook returned an error.
    ///
    /// `fatal` marks programming errors (pool corruption and the like) that
    /// the application should not try to continue past.
    #[error("{source}")]
    Failed {
        source: Box<dyn StdError + Send + Sync>,
        fatal: bool,
    },

    #[error("Actor panicked: {0}")]
    Panicked(String),

    #[error("Failed to spawn actor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl ActorError {
    /// Recoverable hook failure.
    pub fn failed(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        ActorError::Failed {
            source: source.into(),
            fatal: false,
        }
    }

    /// Failure that indicates corrupted state.
    pub fn fatal(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        ActorError::Failed {
            source: source.into(),
            fatal: true,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ActorError::Failed { fatal: true, .. })
    }
}

/// Failure of a blocking request/response round-trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RendezvousError {
    /// Every reply target was dropped before enough replies arrived.
    #[error("Rendezvous disconnected after {received} of {expected} replies")]
    Disconnected { received: usize, expected: usize },

    #[error("Rendezvous timed out after {timeout:?} with {received} of {expected} replies")]
    Timeout {
        received: usize,
        expected: usize,
        timeout: Duration,
    },
}

impl RendezvousError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RendezvousError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(!ActorError::failed("decode failed").is_fatal());
        assert!(ActorError::fatal("double recycle").is_fatal());
        assert!(!ActorError::Panicked("boom".to_string()).is_fatal());
    }

    #[test]
    fn test_failed_displays_source() {
        let err = ActorError::failed("seek failed");
        assert_eq!(err.to_string(), "seek failed");
    }

    #[test]
    fn test_rendezvous_error_display() {
        let err = RendezvousError::Disconnected {
            received: 1,
            expected: 3,
        };
        assert_eq!(err.to_string(), "Rendezvous disconnected after 1 of 3 replies");
        assert!(!err.is_timeout());
    }
}
