//! # Mixcut Common Library
//!
//! Shared code for the mixcut pipeline stages including:
//! - Job and track models plus the job state machine
//! - CUE sheet parsing and validation
//! - Database initialization and record queries
//! - Worker queue message type
//! - Configuration loading
//! - Error types

pub mod config;
pub mod cue;
pub mod db;
pub mod error;
pub mod message;
pub mod models;
pub mod time;

pub use error::{Error, ErrorKind, Result};
pub use message::WorkerMessage;
pub use models::{Job, JobStatus, NewTrack, ObjectLocation, Track};
