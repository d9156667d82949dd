use anyhow::{Context as _, Result};
use curate_protocol::{Container, ContainerType, Context, MetadataSink};
use serde_json::Map;

/// Pushes the context's own `info` through the sink.
///
/// Files route by parent type, projects and sessions by their id. Returns
/// `false` when the target cannot be classified or lacks an id.
pub fn update_meta_info<S: MetadataSink + ?Sized>(sink: &mut S, context: &Context) -> Result<bool> {
    let Some(container) = context.current() else {
        log::info!("Cannot determine container for {}", context.container_type);
        return Ok(false);
    };
    let info = container.info().cloned().unwrap_or_else(Map::new);

    match context.container_type {
        ContainerType::File => {
            let parent_type = match context.parent_container_type {
                Some(
                    kind @ (ContainerType::Acquisition
                    | ContainerType::Project
                    | ContainerType::Session),
                ) => kind,
                _ => {
                    log::info!("Cannot determine file parent container type");
                    return Ok(false);
                }
            };
            let Some(parent_id) = context.slot(parent_type).and_then(Container::id) else {
                log::info!("Cannot determine {parent_type} id for file");
                return Ok(false);
            };
            let Some(file_name) = container.name() else {
                log::info!("Cannot determine name of file in {parent_type} {parent_id}");
                return Ok(false);
            };
            sink.set_file_info(parent_type, parent_id, file_name, &info)
                .with_context(|| format!("failed to update file {file_name} in {parent_type} {parent_id}"))?;
        }
        ContainerType::Project => {
            let Some(id) = container.id() else {
                log::info!("Cannot determine project id");
                return Ok(false);
            };
            sink.replace_project_info(id, &info)
                .with_context(|| format!("failed to update project {id}"))?;
        }
        ContainerType::Session => {
            let Some(id) = container.id() else {
                log::info!("Cannot determine session id");
                return Ok(false);
            };
            sink.replace_session_info(id, &info)
                .with_context(|| format!("failed to update session {id}"))?;
        }
        other => {
            log::info!("Cannot determine container type {other}");
            return Ok(false);
        }
    }
    Ok(true)
}
