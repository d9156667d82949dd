use anyhow::Result;
use curate_protocol::{ContainerType, MetadataSink};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One metadata push, as the update collaborator received it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Update {
    ProjectInfo {
        project_id: String,
        info: Map<String, Value>,
    },
    SessionInfo {
        session_id: String,
        info: Map<String, Value>,
    },
    FileInfo {
        parent_type: ContainerType,
        parent_id: String,
        file_name: String,
        info: Map<String, Value>,
    },
}

/// Sink that records every push in order.
#[derive(Debug, Clone, Default)]
pub struct UpdateLog {
    updates: Vec<Update>,
}

impl UpdateLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn updates(&self) -> &[Update] {
        &self.updates
    }

    #[must_use]
    pub fn into_updates(self) -> Vec<Update> {
        self.updates
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

impl MetadataSink for UpdateLog {
    fn replace_project_info(&mut self, project_id: &str, info: &Map<String, Value>) -> Result<()> {
        log::debug!("project {project_id}: replace info");
        self.updates.push(Update::ProjectInfo {
            project_id: project_id.to_string(),
            info: info.clone(),
        });
        Ok(())
    }

    fn replace_session_info(&mut self, session_id: &str, info: &Map<String, Value>) -> Result<()> {
        log::debug!("session {session_id}: replace info");
        self.updates.push(Update::SessionInfo {
            session_id: session_id.to_string(),
            info: info.clone(),
        });
        Ok(())
    }

    fn set_file_info(
        &mut self,
        parent_type: ContainerType,
        parent_id: &str,
        file_name: &str,
        info: &Map<String, Value>,
    ) -> Result<()> {
        log::debug!("{parent_type} {parent_id}: set info for file {file_name}");
        self.updates.push(Update::FileInfo {
            parent_type,
            parent_id: parent_id.to_string(),
            file_name: file_name.to_string(),
            info: info.clone(),
        });
        Ok(())
    }
}
