use std::path::Path;

use anyhow::{Context as _, Result};
use curate_protocol::ContextSource;
use curate_templates::{load_catalog, Namespace};

/// Project attachment that overrides the bundled catalog.
pub const PROJECT_TEMPLATE_FILE_NAME: &str = "project-template.json";

/// Picks the catalog for a run: explicit file, then the project's own
/// template attachment, then the bundled default.
pub fn resolve_catalog<S: ContextSource + ?Sized>(
    source: &S,
    template_file: Option<&Path>,
) -> Result<Namespace> {
    if let Some(path) = template_file {
        log::info!("Using template file: {}", path.display());
        return load_catalog(path)
            .with_context(|| format!("failed to load template file {}", path.display()));
    }

    let attached = source
        .download_project_file(PROJECT_TEMPLATE_FILE_NAME)
        .with_context(|| format!("failed to download {PROJECT_TEMPLATE_FILE_NAME}"))?;
    if let Some(bytes) = attached {
        log::info!("Using project template: {PROJECT_TEMPLATE_FILE_NAME}");
        return Namespace::from_bytes(&bytes)
            .with_context(|| format!("invalid project template {PROJECT_TEMPLATE_FILE_NAME}"));
    }

    let catalog = Namespace::bids();
    log::info!("Using default template: {}", catalog.name());
    Ok(catalog)
}
