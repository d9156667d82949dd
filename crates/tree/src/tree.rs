use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context as _;
use curate_protocol::{Container, ContainerType, Context, ContextSource, NodeId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde_json::{Map, Value};

use crate::error::{Result, TreeError};
use crate::extension::get_extension;

#[derive(Debug, Clone)]
struct TreeNode {
    kind: ContainerType,
    container: Container,
    /// State at load time, for dirty tracking.
    loaded: Container,
}

impl TreeNode {
    fn new(kind: ContainerType, fields: Map<String, Value>) -> Self {
        let container = Container::from(fields);
        Self {
            kind,
            loaded: container.clone(),
            container,
        }
    }
}

/// A project hierarchy loaded from an export document.
///
/// Edges run parent → child. Subjects are ancestors only: they appear in
/// session contexts but are never visited themselves.
#[derive(Debug, Clone)]
pub struct ProjectTree {
    graph: DiGraph<TreeNode, ()>,
    root: NodeIndex,
    order: Vec<NodeIndex>,
    attachments: Option<PathBuf>,
}

impl ProjectTree {
    /// Builds the tree from a project object carrying `files` and `sessions`.
    pub fn from_value(project: Value) -> Result<Self> {
        let Value::Object(mut project) = project else {
            return Err(TreeError::InvalidExport(
                "project must be a JSON object".to_string(),
            ));
        };

        let files = take_list(&mut project, "files", "project")?;
        let sessions = take_list(&mut project, "sessions", "project")?;

        let mut graph = DiGraph::new();
        let root = graph.add_node(TreeNode::new(ContainerType::Project, project));
        let mut tree = Self {
            graph,
            root,
            order: vec![root],
            attachments: None,
        };

        for file in files {
            tree.add_visited(root, ContainerType::File, file, "project file")?;
        }

        let mut subjects: HashMap<String, NodeIndex> = HashMap::new();
        for session in sessions {
            let mut session = into_object(session, "session")?;
            let subject = session.remove("subject");
            let files = take_list(&mut session, "files", "session")?;
            let acquisitions = take_list(&mut session, "acquisitions", "session")?;

            let parent = match subject {
                None | Some(Value::Null) => root,
                Some(Value::Object(subject)) => match subject_key(&subject) {
                    Some(key) => match subjects.get(&key) {
                        Some(&existing) => existing,
                        None => {
                            let idx = tree.add_child(root, ContainerType::Subject, subject);
                            subjects.insert(key, idx);
                            idx
                        }
                    },
                    None => tree.add_child(root, ContainerType::Subject, subject),
                },
                Some(_) => {
                    return Err(TreeError::InvalidExport(
                        "session subject must be an object".to_string(),
                    ))
                }
            };

            let session_idx = tree.add_child(parent, ContainerType::Session, session);
            tree.order.push(session_idx);

            for file in files {
                tree.add_visited(session_idx, ContainerType::File, file, "session file")?;
            }
            for acquisition in acquisitions {
                let mut acquisition = into_object(acquisition, "acquisition")?;
                let files = take_list(&mut acquisition, "files", "acquisition")?;
                let acq_idx = tree.add_child(session_idx, ContainerType::Acquisition, acquisition);
                tree.order.push(acq_idx);
                for file in files {
                    tree.add_visited(acq_idx, ContainerType::File, file, "acquisition file")?;
                }
            }
        }

        log::debug!(
            "loaded project tree with {} containers ({} visited)",
            tree.graph.node_count(),
            tree.order.len()
        );
        Ok(tree)
    }

    /// Directory holding the contents of files attached to the project.
    #[must_use]
    pub fn with_attachments(mut self, dir: impl Into<PathBuf>) -> Self {
        self.attachments = Some(dir.into());
        self
    }

    #[must_use]
    pub fn project(&self) -> &Container {
        &self.graph[self.root].container
    }

    #[must_use]
    pub fn kind(&self, node: NodeId) -> Option<ContainerType> {
        self.graph.node_weight(NodeIndex::new(node.0)).map(|n| n.kind)
    }

    /// Visited nodes whose container changed since load.
    #[must_use]
    pub fn dirty_nodes(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .map(|idx| NodeId(idx.index()))
            .filter(|&node| self.is_dirty(node))
            .collect()
    }

    /// Reassembles the export document from the current containers.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut project = self.project().fields().clone();

        let files = self.child_values(self.root, ContainerType::File);
        let sessions: Vec<Value> = self
            .order
            .iter()
            .filter(|&&idx| self.graph[idx].kind == ContainerType::Session)
            .map(|&idx| self.session_value(idx))
            .collect();

        project.insert("files".to_string(), Value::Array(files));
        project.insert("sessions".to_string(), Value::Array(sessions));
        Value::Object(project)
    }

    fn session_value(&self, idx: NodeIndex) -> Value {
        let mut session = self.graph[idx].container.fields().clone();

        if let Some(subject) = self
            .parent(idx)
            .filter(|&p| self.graph[p].kind == ContainerType::Subject)
        {
            session.insert(
                "subject".to_string(),
                Value::Object(self.graph[subject].container.fields().clone()),
            );
        }

        let acquisitions: Vec<Value> = self
            .children(idx)
            .into_iter()
            .filter(|&child| self.graph[child].kind == ContainerType::Acquisition)
            .map(|acq| {
                let mut acquisition = self.graph[acq].container.fields().clone();
                acquisition.insert(
                    "files".to_string(),
                    Value::Array(self.child_values(acq, ContainerType::File)),
                );
                Value::Object(acquisition)
            })
            .collect();

        session.insert(
            "files".to_string(),
            Value::Array(self.child_values(idx, ContainerType::File)),
        );
        session.insert("acquisitions".to_string(), Value::Array(acquisitions));
        Value::Object(session)
    }

    fn child_values(&self, idx: NodeIndex, kind: ContainerType) -> Vec<Value> {
        self.children(idx)
            .into_iter()
            .filter(|&child| self.graph[child].kind == kind)
            .map(|child| Value::Object(self.graph[child].container.fields().clone()))
            .collect()
    }

    fn add_child(
        &mut self,
        parent: NodeIndex,
        kind: ContainerType,
        fields: Map<String, Value>,
    ) -> NodeIndex {
        let idx = self.graph.add_node(TreeNode::new(kind, fields));
        self.graph.add_edge(parent, idx, ());
        idx
    }

    fn add_visited(
        &mut self,
        parent: NodeIndex,
        kind: ContainerType,
        value: Value,
        what: &str,
    ) -> Result<NodeIndex> {
        let fields = into_object(value, what)?;
        let idx = self.add_child(parent, kind, fields);
        self.order.push(idx);
        Ok(idx)
    }

    fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    /// Children in insertion order.
    fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut children: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        children.sort();
        children
    }
}

impl ContextSource for ProjectTree {
    fn walk(&self) -> Vec<NodeId> {
        self.order.iter().map(|idx| NodeId(idx.index())).collect()
    }

    fn context(&self, node: NodeId) -> Option<Context> {
        let idx = NodeIndex::new(node.0);
        let target = self.graph.node_weight(idx)?;

        let mut context = Context::new(target.kind);
        context.node = node;
        context.parent_container_type = self.parent(idx).map(|p| self.graph[p].kind);

        let mut cursor = Some(idx);
        while let Some(current) = cursor {
            let ancestor = &self.graph[current];
            context.set_slot(ancestor.kind, Some(ancestor.container.clone()));
            cursor = self.parent(current);
        }

        if target.kind == ContainerType::File {
            context.ext = target.container.name().and_then(get_extension);
        }
        Some(context)
    }

    fn commit(&mut self, context: &Context) {
        let idx = NodeIndex::new(context.node.0);
        let Some(node) = self.graph.node_weight_mut(idx) else {
            log::warn!("commit for unknown node {}", context.node.0);
            return;
        };
        if node.kind != context.container_type {
            log::warn!(
                "commit for node {} expected {}, got {}",
                context.node.0,
                node.kind,
                context.container_type
            );
            return;
        }
        if let Some(container) = context.current() {
            node.container = container.clone();
        }
    }

    fn is_dirty(&self, node: NodeId) -> bool {
        self.graph
            .node_weight(NodeIndex::new(node.0))
            .is_some_and(|n| n.container != n.loaded)
    }

    fn download_project_file(&self, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let attached = self
            .children(self.root)
            .into_iter()
            .map(|idx| &self.graph[idx])
            .any(|n| n.kind == ContainerType::File && n.container.name() == Some(name));
        if !attached {
            return Ok(None);
        }

        let Some(dir) = self.attachments.as_ref() else {
            log::warn!("project file {name} is attached but no attachments directory was given");
            return Ok(None);
        };

        let path = dir.join(name);
        if !path.exists() {
            log::warn!("attachment {} not found", path.display());
            return Ok(None);
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read attachment {}", path.display()))?;
        Ok(Some(bytes))
    }
}

fn take_list(object: &mut Map<String, Value>, key: &str, owner: &str) -> Result<Vec<Value>> {
    match object.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(TreeError::InvalidExport(format!(
            "{owner} '{key}' must be an array"
        ))),
    }
}

fn into_object(value: Value, what: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(TreeError::InvalidExport(format!("{what} must be a JSON object"))),
    }
}

fn subject_key(subject: &Map<String, Value>) -> Option<String> {
    subject
        .get("_id")
        .or_else(|| subject.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curate_protocol::MetadataBlock;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn export() -> Value {
        json!({
            "_id": "p1",
            "label": "testproject",
            "files": [{"name": "README.txt"}, {"name": "project-template.json"}],
            "sessions": [
                {
                    "_id": "s1",
                    "label": "sesTEST",
                    "subject": {"_id": "sub1", "code": "001"},
                    "files": [{"name": "notes.txt"}],
                    "acquisitions": [{
                        "_id": "a1",
                        "label": "acqTEST",
                        "files": [{"name": "T1w.nii.gz", "type": "nifti"}]
                    }]
                },
                {
                    "_id": "s2",
                    "label": "ses2",
                    "subject": {"_id": "sub1", "code": "001"},
                    "acquisitions": []
                }
            ]
        })
    }

    fn kinds(tree: &ProjectTree) -> Vec<ContainerType> {
        tree.walk().into_iter().filter_map(|n| tree.kind(n)).collect()
    }

    #[test]
    fn walk_visits_in_hierarchy_order() {
        use ContainerType::*;
        let tree = ProjectTree::from_value(export()).unwrap();
        assert_eq!(
            kinds(&tree),
            vec![Project, File, File, Session, File, Acquisition, File, Session]
        );
    }

    #[test]
    fn file_context_carries_ancestors_and_extension() {
        let tree = ProjectTree::from_value(export()).unwrap();
        let node = tree.walk()[6];
        let ctx = tree.context(node).unwrap();
        assert_eq!(ctx.container_type, ContainerType::File);
        assert_eq!(ctx.parent_container_type, Some(ContainerType::Acquisition));
        assert_eq!(ctx.project.as_ref().and_then(Container::label), Some("testproject"));
        assert_eq!(
            ctx.subject.as_ref().and_then(|s| s.get("code")),
            Some(&json!("001"))
        );
        assert_eq!(ctx.session.as_ref().and_then(Container::label), Some("sesTEST"));
        assert_eq!(ctx.acquisition.as_ref().and_then(Container::label), Some("acqTEST"));
        assert_eq!(ctx.ext.as_deref(), Some(".nii.gz"));
        assert!(ctx.file.as_ref().unwrap().get("files").is_none());
    }

    #[test]
    fn containers_are_shallow() {
        let tree = ProjectTree::from_value(export()).unwrap();
        assert!(tree.project().get("sessions").is_none());
        assert!(tree.project().get("files").is_none());
        let session = tree.context(tree.walk()[3]).unwrap();
        let session = session.session.unwrap();
        assert!(session.get("acquisitions").is_none());
        assert!(session.get("subject").is_none());
    }

    #[test]
    fn sessions_share_a_subject() {
        let tree = ProjectTree::from_value(export()).unwrap();
        let subjects = tree
            .graph
            .raw_nodes()
            .iter()
            .filter(|n| n.weight.kind == ContainerType::Subject)
            .count();
        assert_eq!(subjects, 1);
    }

    #[test]
    fn commit_marks_node_dirty_and_children_see_it() {
        let mut tree = ProjectTree::from_value(export()).unwrap();
        assert!(tree.dirty_nodes().is_empty());

        let session_node = tree.walk()[3];
        let mut ctx = tree.context(session_node).unwrap();
        ctx.current_mut()
            .unwrap()
            .set_block("BIDS", MetadataBlock::Fields(Map::new()));
        tree.commit(&ctx);

        assert!(tree.is_dirty(session_node));
        assert_eq!(tree.dirty_nodes(), vec![session_node]);

        let child = tree.context(tree.walk()[4]).unwrap();
        assert!(child.session.unwrap().has_block("BIDS"));
    }

    #[test]
    fn unchanged_commit_stays_clean() {
        let mut tree = ProjectTree::from_value(export()).unwrap();
        let node = tree.walk()[1];
        let ctx = tree.context(node).unwrap();
        tree.commit(&ctx);
        assert!(!tree.is_dirty(node));
    }

    #[test]
    fn to_value_reassembles_export() {
        let tree = ProjectTree::from_value(export()).unwrap();
        let value = tree.to_value();
        assert_eq!(value["files"].as_array().unwrap().len(), 2);
        assert_eq!(value["sessions"][0]["subject"]["code"], json!("001"));
        assert_eq!(
            value["sessions"][0]["acquisitions"][0]["files"][0]["name"],
            json!("T1w.nii.gz")
        );
        assert_eq!(value["sessions"][1]["label"], json!("ses2"));

        let reloaded = ProjectTree::from_value(value).unwrap();
        assert_eq!(kinds(&reloaded), kinds(&tree));
    }

    #[test]
    fn downloads_attached_project_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("project-template.json"), b"{}").unwrap();

        let tree = ProjectTree::from_value(export())
            .unwrap()
            .with_attachments(dir.path());
        assert_eq!(
            tree.download_project_file("project-template.json").unwrap(),
            Some(b"{}".to_vec())
        );
        assert_eq!(tree.download_project_file("missing.json").unwrap(), None);

        let bare = ProjectTree::from_value(export()).unwrap();
        assert_eq!(bare.download_project_file("project-template.json").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_exports() {
        assert!(ProjectTree::from_value(json!([])).is_err());
        assert!(ProjectTree::from_value(json!({"sessions": {}})).is_err());
        assert!(ProjectTree::from_value(json!({"files": ["x"]})).is_err());
    }
}
