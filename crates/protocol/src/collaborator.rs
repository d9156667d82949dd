use anyhow::Result;
use serde_json::{Map, Value};

use crate::container::ContainerType;
use crate::context::{Context, NodeId};

/// Tree collaborator: produces contexts and tracks which nodes changed.
pub trait ContextSource {
    /// Visit order of every node; calling it again restarts the walk.
    fn walk(&self) -> Vec<NodeId>;

    /// Fresh context for `node`, built from the current state of the tree.
    fn context(&self, node: NodeId) -> Option<Context>;

    /// Stores the context's own container back into the tree.
    fn commit(&mut self, context: &Context);

    /// Whether `node` differs from the state it was loaded with.
    fn is_dirty(&self, node: NodeId) -> bool;

    /// Contents of a file attached to the project, `None` when absent.
    fn download_project_file(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// Update collaborator: one push per container kind.
pub trait MetadataSink {
    fn replace_project_info(&mut self, project_id: &str, info: &Map<String, Value>) -> Result<()>;

    fn replace_session_info(&mut self, session_id: &str, info: &Map<String, Value>) -> Result<()>;

    fn set_file_info(
        &mut self,
        parent_type: ContainerType,
        parent_id: &str,
        file_name: &str,
        info: &Map<String, Value>,
    ) -> Result<()>;
}
