use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::container::{Container, ContainerType};

/// Opaque handle the tree collaborator uses to identify a visited node.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub usize);

/// Per-container view: the container itself plus snapshots of its ancestors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(skip)]
    pub node: NodeId,
    pub container_type: ContainerType,
    #[serde(default)]
    pub parent_container_type: Option<ContainerType>,
    #[serde(default)]
    pub project: Option<Container>,
    #[serde(default)]
    pub subject: Option<Container>,
    #[serde(default)]
    pub session: Option<Container>,
    #[serde(default)]
    pub acquisition: Option<Container>,
    #[serde(default)]
    pub file: Option<Container>,
    /// Extension of the file name (`.nii.gz`), `None` for non-file containers.
    #[serde(default)]
    pub ext: Option<String>,
}

impl Context {
    #[must_use]
    pub const fn new(container_type: ContainerType) -> Self {
        Self {
            node: NodeId(0),
            container_type,
            parent_container_type: None,
            project: None,
            subject: None,
            session: None,
            acquisition: None,
            file: None,
            ext: None,
        }
    }

    #[must_use]
    pub const fn slot(&self, kind: ContainerType) -> Option<&Container> {
        match kind {
            ContainerType::Project => self.project.as_ref(),
            ContainerType::Subject => self.subject.as_ref(),
            ContainerType::Session => self.session.as_ref(),
            ContainerType::Acquisition => self.acquisition.as_ref(),
            ContainerType::File => self.file.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, kind: ContainerType) -> Option<&mut Container> {
        match kind {
            ContainerType::Project => self.project.as_mut(),
            ContainerType::Subject => self.subject.as_mut(),
            ContainerType::Session => self.session.as_mut(),
            ContainerType::Acquisition => self.acquisition.as_mut(),
            ContainerType::File => self.file.as_mut(),
        }
    }

    pub fn set_slot(&mut self, kind: ContainerType, container: Option<Container>) {
        let slot = match kind {
            ContainerType::Project => &mut self.project,
            ContainerType::Subject => &mut self.subject,
            ContainerType::Session => &mut self.session,
            ContainerType::Acquisition => &mut self.acquisition,
            ContainerType::File => &mut self.file,
        };
        *slot = container;
    }

    /// The container this context is about.
    #[must_use]
    pub const fn current(&self) -> Option<&Container> {
        self.slot(self.container_type)
    }

    pub fn current_mut(&mut self) -> Option<&mut Container> {
        self.slot_mut(self.container_type)
    }
}

/// Dotted-path read access used by templates, initializers and matchers.
pub trait ContextLookup {
    /// Resolves `a.b.c`; numeric segments index arrays.
    fn lookup(&self, path: &str) -> Option<Value>;
}

impl ContextLookup for Value {
    fn lookup(&self, path: &str) -> Option<Value> {
        path.split('.')
            .try_fold(self, |value, segment| descend(value, segment))
            .cloned()
    }
}

impl ContextLookup for Context {
    fn lookup(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;
        let rest: Vec<&str> = segments.collect();
        let leaf = |value: Value| rest.is_empty().then_some(value);

        match head {
            "ext" => self.ext.clone().map(Value::String).and_then(leaf),
            "container_type" => leaf(Value::String(self.container_type.as_str().to_string())),
            "parent_container_type" => self
                .parent_container_type
                .map(|kind| Value::String(kind.as_str().to_string()))
                .and_then(leaf),
            slot => {
                let kind = slot.parse::<ContainerType>().ok()?;
                let container = self.slot(kind)?;
                let (first, tail) = rest.split_first()?;
                let start = container.get(first)?;
                tail.iter()
                    .try_fold(start, |value, segment| descend(value, segment))
                    .cloned()
            }
        }
    }
}

fn descend<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}

/// Text form of a scalar; null, arrays and objects have none.
#[must_use]
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
