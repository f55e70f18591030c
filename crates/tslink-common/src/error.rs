use thiserror::Error;

/// Link error types covering configuration, driver I/O, and codec misuse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Digital-I/O driver call failed.
    #[error("digital I/O error: {0}")]
    Dio(String),

    /// Driver was asked to use a channel handle it never opened.
    #[error("unknown channel handle {0}")]
    UnknownChannel(u32),

    /// Read-back buffer length does not match the configured transfer.
    #[error("read-back length mismatch: expected {expected} samples, got {actual}")]
    ReadbackLength {
        /// Expected sample count (`code digits * repeat + 1`).
        expected: usize,
        /// Actual sample count supplied.
        actual: usize,
    },

    /// Failed to spawn a worker thread.
    #[error("thread spawn failed: {0}")]
    ThreadSpawn(String),
}

/// Convenience type alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
