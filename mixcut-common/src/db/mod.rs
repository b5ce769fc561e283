//! Database initialization and record queries

pub mod init;
pub mod jobs;
pub mod tracks;

pub use init::*;
pub use jobs::JobUpdate;
