//! Kiln Core Library
//!
//! Domain core for the Kiln workspace sync protocol: error taxonomy, version
//! arithmetic, deterministic key encodings, and the port traits behind which
//! the external collaborators (blob store, membership) live.

// Re-export pure types from kiln-types
pub use kiln_types::*;

pub mod error;
pub mod path;
pub mod ports;
pub mod version;

pub use error::{KilnError, Result};
