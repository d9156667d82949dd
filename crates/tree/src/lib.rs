//! # Curate Tree
//!
//! Export-backed collaborators for the curation engine: a project
//! hierarchy that produces contexts and tracks changes, and an update log
//! that records metadata pushes.
//!
//! ```text
//! export.json ──> Export ──> ProjectTree (ContextSource)
//!                               │  walk / context / commit / is_dirty
//!                               ▼
//!                         curation engine ──> UpdateLog (MetadataSink)
//! ```

mod error;
mod export;
mod extension;
mod tree;
mod updates;

pub use error::{Result, TreeError};
pub use export::Export;
pub use extension::get_extension;
pub use tree::ProjectTree;
pub use updates::{Update, UpdateLog};
