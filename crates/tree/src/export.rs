use std::path::Path;

use serde_json::Value;

use crate::error::{Result, TreeError};
use crate::tree::ProjectTree;

/// Projects available in an export document.
///
/// Accepts `{"projects": [...]}` or a single project object.
#[derive(Debug, Clone, Default)]
pub struct Export {
    projects: Vec<Value>,
}

impl Export {
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut root) = value else {
            return Err(TreeError::InvalidExport(
                "export must be a JSON object".to_string(),
            ));
        };
        match root.remove("projects") {
            Some(Value::Array(projects)) => Ok(Self { projects }),
            Some(_) => Err(TreeError::InvalidExport(
                "'projects' must be an array".to_string(),
            )),
            None => Ok(Self {
                projects: vec![Value::Object(root)],
            }),
        }
    }

    #[must_use]
    pub fn projects(&self) -> &[Value] {
        &self.projects
    }

    /// The only project labelled `label`.
    pub fn project_by_label(&self, label: &str) -> Result<ProjectTree> {
        let matches: Vec<&Value> = self
            .projects
            .iter()
            .filter(|p| p.get("label").and_then(Value::as_str) == Some(label))
            .collect();
        match matches.as_slice() {
            [] => Err(TreeError::ProjectNotFound(label.to_string())),
            [project] => ProjectTree::from_value((*project).clone()),
            many => Err(TreeError::AmbiguousProject {
                label: label.to_string(),
                count: many.len(),
            }),
        }
    }

    /// The project holding the session with id `session_id`.
    pub fn project_by_session(&self, session_id: &str) -> Result<ProjectTree> {
        let project = self
            .projects
            .iter()
            .find(|p| {
                p.get("sessions")
                    .and_then(Value::as_array)
                    .is_some_and(|sessions| {
                        sessions
                            .iter()
                            .any(|s| s.get("_id").and_then(Value::as_str) == Some(session_id))
                    })
            })
            .ok_or_else(|| TreeError::SessionNotFound(session_id.to_string()))?;
        ProjectTree::from_value(project.clone())
    }
}
