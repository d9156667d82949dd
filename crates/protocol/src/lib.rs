//! # Curate Protocol
//!
//! Value types shared between the BIDS curation engine and the collaborators
//! that feed it containers and receive its metadata.
//!
//! ## Architecture
//!
//! ```text
//! ContextSource (tree collaborator)
//!     │
//!     ├──> Context  (one per container: project → subject → session → acquisition → file)
//!     │      └─ Container slots, each a shallow snapshot with an `info` map
//!     │
//!     ├──> engine writes MetadataBlock into context[container_type].info[namespace]
//!     │
//!     └──> MetadataSink (update collaborator) receives dirty nodes only
//! ```

mod collaborator;
mod container;
mod context;

pub use collaborator::{ContextSource, MetadataSink};
pub use container::{Container, ContainerType, MetadataBlock, NOT_APPLICABLE};
pub use context::{value_as_text, Context, ContextLookup, NodeId};
