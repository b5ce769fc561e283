//! Common error types for mixcut

use crate::cue::ValidationError;
use crate::models::JobStatus;
use thiserror::Error;

/// Common result type for mixcut operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the mixcut stages
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// CUE sheet violates a track list invariant.
    ///
    /// Rendered verbatim (no prefix) because the message lands in the job's
    /// error field as the user-facing diagnostic.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Cutter produced a different number of segments than validated tracks
    #[error("Track count mismatch: have {tracks} tracks but {outputs} output files")]
    Reconciliation { tracks: usize, outputs: usize },

    /// External executable failed to start or exited unsuccessfully
    #[error("{program} failed: {detail}")]
    Subprocess { program: String, detail: String },

    /// Output bundle could not be written
    #[error("Archive error: {0}")]
    Archive(String),

    /// Job status change not allowed by the state machine
    #[error("Job cannot move from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// Coarse classification used by the stages to decide between absorbing a
/// failure into `FAILED` and leaving a queue message for redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Track list invariant violation; retrying cannot help.
    Validation,
    /// Output count does not match the validated track count.
    Reconciliation,
    /// Infrastructure hiccup that may succeed on a later attempt.
    Transient,
    /// Anything else that will fail the same way again.
    Permanent,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Reconciliation { .. } => ErrorKind::Reconciliation,
            Error::Database(err) if is_transient_db_error(err) => ErrorKind::Transient,
            Error::Io(err) if is_transient_io_error(err) => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }

    /// True if a retry of the same operation may succeed
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// True for SQLite "database is locked" / busy failures
    pub fn is_lock_error(&self) -> bool {
        match self {
            Error::Database(err) => {
                let msg = err.to_string();
                msg.contains("database is locked") || msg.contains("database table is locked")
            }
            _ => false,
        }
    }
}

fn is_transient_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Io(io) => is_transient_io_error(io),
        sqlx::Error::Database(db) => {
            let msg = db.message();
            msg.contains("database is locked") || msg.contains("busy")
        }
        _ => false,
    }
}

fn is_transient_io_error(err: &std::io::Error) -> bool {
    use std::io::ErrorKind as Io;
    matches!(
        err.kind(),
        Io::TimedOut
            | Io::Interrupted
            | Io::WouldBlock
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::ConnectionRefused
            | Io::BrokenPipe
            | Io::UnexpectedEof
    )
}
