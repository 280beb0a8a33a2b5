//! Error types for the socketcmd library.

use std::process::ExitStatus;

use thiserror::Error;

/// Errors produced by the socketcmd library.
#[derive(Debug, Error)]
pub enum SockError {
    /// The request did not start with a well-formed `lines:timeout` header.
    #[error("missing or invalid socketcmd header")]
    MissingHeader,

    /// The client's parse function rejected the command before dialing.
    #[error("the provided command is not allowed")]
    CommandForbidden,

    /// Failed to spawn the wrapped child process.
    #[error("failed to spawn wrapped command: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// The child was spawned without a piped stdin or stdout.
    #[error("wrapped command is missing a {0} pipe")]
    MissingPipe(&'static str),

    /// The wrapped child exited with a non-zero status.
    #[error("wrapped command exited with {0}")]
    ChildFailed(ExitStatus),

    /// Socket or pipe I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SockError::MissingHeader.to_string(),
            "missing or invalid socketcmd header"
        );
        assert_eq!(
            SockError::CommandForbidden.to_string(),
            "the provided command is not allowed"
        );

        let err = SockError::MissingPipe("stdout");
        assert!(err.to_string().contains("stdout"));
    }
}
