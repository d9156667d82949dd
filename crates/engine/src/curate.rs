use std::path::Path;

use anyhow::Result;
use curate_protocol::{Container, ContainerType, Context, ContextSource, MetadataSink};
use curate_templates::{Namespace, Validator};
use serde::Serialize;

use crate::catalog::{resolve_catalog, PROJECT_TEMPLATE_FILE_NAME};
use crate::meta::{
    clear_meta_info, ensure_info_exists, process_matching_templates, validate_meta_info,
};
use crate::update::update_meta_info;

/// Run-wide switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurateOptions {
    /// Drop existing blocks before matching.
    pub reset: bool,
    /// Push changed containers after computing.
    pub update: bool,
    /// Validate enum membership too.
    pub check_enums: bool,
}

impl Default for CurateOptions {
    fn default() -> Self {
        Self {
            reset: false,
            update: true,
            check_enums: false,
        }
    }
}

/// Counters for one curation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CurationReport {
    pub visited: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub valid: usize,
    pub invalid: usize,
    pub pushed: usize,
    pub skipped: usize,
}

pub struct Curator {
    namespace: Namespace,
    options: CurateOptions,
    validator: Validator,
}

impl Curator {
    #[must_use]
    pub fn new(namespace: Namespace, options: CurateOptions) -> Self {
        Self {
            namespace,
            validator: Validator::new(options.check_enums),
            options,
        }
    }

    /// Match + compute, resolve paths, then write back changed containers.
    pub fn curate<S, U>(&self, source: &mut S, sink: &mut U) -> Result<CurationReport>
    where
        S: ContextSource + ?Sized,
        U: MetadataSink + ?Sized,
    {
        let mut report = CurationReport::default();

        self.match_pass(source, &mut report);
        self.resolve_paths(source);
        if self.options.update {
            self.write_back(source, sink, &mut report)?;
        } else {
            log::info!("update disabled; nothing pushed");
        }

        log::info!(
            "curated {} containers: {} matched, {} unmatched, {} valid, {} invalid, {} pushed",
            report.visited,
            report.matched,
            report.unmatched,
            report.valid,
            report.invalid,
            report.pushed
        );
        Ok(report)
    }

    fn match_pass<S: ContextSource + ?Sized>(&self, source: &mut S, report: &mut CurationReport) {
        let ns = self.namespace.name();
        for node in source.walk() {
            let Some(mut context) = source.context(node) else {
                log::debug!("node {} vanished before matching", node.0);
                continue;
            };
            report.visited += 1;

            if self.options.reset {
                if let Some(container) = context.current_mut() {
                    if clear_meta_info(container, &self.namespace) {
                        log::debug!("reset {ns} block on {}", context.container_type);
                    }
                }
            }

            match context.container_type {
                ContainerType::Project => {
                    self.process(&mut context, report);
                }
                ContainerType::Session => {
                    if let Some(session) = context.current_mut() {
                        ensure_info_exists(session, &self.namespace);
                    }
                }
                ContainerType::File if is_project_template(&context) => {
                    log::debug!("skipping {PROJECT_TEMPLATE_FILE_NAME}");
                }
                ContainerType::File => {
                    self.process(&mut context, report);
                    if let Some(file) = context.current_mut() {
                        match validate_meta_info(file, &self.namespace, &self.validator) {
                            Some(true) => report.valid += 1,
                            Some(false) => report.invalid += 1,
                            None => {}
                        }
                    }
                }
                ContainerType::Subject | ContainerType::Acquisition => {}
            }

            source.commit(&context);
        }
    }

    fn process(&self, context: &mut Context, report: &mut CurationReport) {
        if process_matching_templates(context, &self.namespace).is_some() {
            report.matched += 1;
        } else {
            report.unmatched += 1;
        }
    }

    fn resolve_paths<S: ContextSource + ?Sized>(&self, _source: &mut S) {
        log::debug!("path resolution pass: nothing to resolve");
    }

    fn write_back<S, U>(&self, source: &S, sink: &mut U, report: &mut CurationReport) -> Result<()>
    where
        S: ContextSource + ?Sized,
        U: MetadataSink + ?Sized,
    {
        for node in source.walk() {
            if !source.is_dirty(node) {
                continue;
            }
            let Some(context) = source.context(node) else {
                continue;
            };
            if update_meta_info(sink, &context)? {
                report.pushed += 1;
            } else {
                report.skipped += 1;
            }
        }
        Ok(())
    }
}

/// Resolves the catalog for `source`, then runs all three passes.
pub fn curate_tree<S, U>(
    source: &mut S,
    sink: &mut U,
    template_file: Option<&Path>,
    options: CurateOptions,
) -> Result<CurationReport>
where
    S: ContextSource + ?Sized,
    U: MetadataSink + ?Sized,
{
    let namespace = resolve_catalog(source, template_file)?;
    Curator::new(namespace, options).curate(source, sink)
}

fn is_project_template(context: &Context) -> bool {
    context.parent_container_type == Some(ContainerType::Project)
        && context.file.as_ref().and_then(Container::name) == Some(PROJECT_TEMPLATE_FILE_NAME)
}
