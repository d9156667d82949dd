//! # Curate Engine
//!
//! Drives BIDS curation over a container tree in three passes:
//!
//! 1. **match + compute**: project blocks are matched and rendered, session
//!    blocks are guaranteed to exist, file blocks are matched, rendered and
//!    validated
//! 2. **path resolution**: reserved
//! 3. **write-back**: only containers the tree reports as changed are pushed
//!
//! The catalog is an explicit value: an override file, the project's own
//! `project-template.json`, or the bundled BIDS catalog.

mod catalog;
mod curate;
mod meta;
mod update;

pub use catalog::{resolve_catalog, PROJECT_TEMPLATE_FILE_NAME};
pub use curate::{curate_tree, CurateOptions, CurationReport, Curator};
pub use meta::{
    clear_meta_info, ensure_info_exists, process_matching_templates, validate_meta_info,
};
pub use update::update_meta_info;
