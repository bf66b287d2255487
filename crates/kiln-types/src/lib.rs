//! Kiln Types - Pure type definitions for the workspace sync protocol
//!
//! This crate contains only serde data types with no async runtime
//! dependencies: the persisted domain records (workspaces, file entries)
//! and the JSON wire contract of both sync phases and the manifest.

pub mod file;
pub mod sync;
pub mod workspace;

pub use file::*;
pub use sync::*;
pub use workspace::*;
