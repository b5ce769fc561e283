//! External tools and local file handling used by the stages

pub mod bundle;
pub mod cutter;
pub mod tagger;
pub mod tool;
pub mod workspace;

pub use bundle::{build_bundle, BUNDLE_FILE_NAME};
pub use cutter::{AudioCutter, M4aCutter};
pub use tagger::{AtomicParsleyTagger, MetadataTagger, Tag};
pub use tool::ToolError;
pub use workspace::JobWorkspace;
