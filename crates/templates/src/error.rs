use thiserror::Error;

/// Result type for catalog and template operations
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Errors raised while loading catalogs or compiling templates
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The catalog document failed structural validation
    #[error("Invalid template catalog: {}", .violations.join("; "))]
    Schema { violations: Vec<String> },

    /// A string template could not be parsed
    #[error("Invalid template '{template}': {message}")]
    Syntax { template: String, message: String },

    /// The catalog document is neither JSON nor TOML
    #[error("Catalog parse error: {0}")]
    Parse(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TemplateError {
    /// Create a schema error for a single violation
    pub fn schema(path: &str, message: impl Into<String>) -> Self {
        Self::Schema {
            violations: vec![violation(path, &message.into())],
        }
    }

    /// Create a syntax error
    pub fn syntax(template: &str, message: impl Into<String>) -> Self {
        Self::Syntax {
            template: template.to_string(),
            message: message.into(),
        }
    }

    /// Structural violations, when the error came from schema validation
    #[must_use]
    pub fn violations(&self) -> Option<&[String]> {
        match self {
            Self::Schema { violations } => Some(violations),
            _ => None,
        }
    }
}

pub(crate) fn violation(path: &str, message: &str) -> String {
    if path.is_empty() {
        message.to_string()
    } else {
        format!("{path}: {message}")
    }
}
