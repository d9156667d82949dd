use thiserror::Error;

pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Invalid export: {0}")]
    InvalidExport(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Project label '{label}' matches {count} projects")]
    AmbiguousProject { label: String, count: usize },

    #[error("No project contains session {0}")]
    SessionNotFound(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
