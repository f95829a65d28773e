//! Core data model definitions shared across Reelsync crates.
#![allow(missing_docs)]

pub mod ids;
pub mod progress;
pub mod stream;

pub use ids::{ItemID, LibraryID};
pub use progress::{ProgressUpdate, ResumeInfo, WatchProgress};
pub use stream::{RawStream, Resolution, SourceDescriptor, StreamKind};
