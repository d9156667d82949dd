use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use curate_engine::{curate_tree, CurateOptions};
use curate_tree::{Export, ProjectTree, UpdateLog};

mod catalog;

/// Environment fallback for `--template-file`.
pub const TEMPLATE_ENV: &str = "CURATE_BIDS_TEMPLATE";

#[derive(Parser)]
#[command(name = "curate-bids")]
#[command(about = "BIDS metadata curation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Curate one project of an export and print the pushed updates
    Curate(CurateArgs),

    /// Print the JSON schema of template catalog documents
    Schema,

    /// Validate a template catalog (default: the bundled BIDS catalog)
    #[command(name = "check-catalog")]
    CheckCatalog(CheckCatalogArgs),
}

#[derive(Args)]
struct CurateArgs {
    /// Project export document (JSON)
    #[arg(long)]
    tree: PathBuf,

    /// Project label
    #[arg(short = 'p', long = "project")]
    project_label: Option<String>,

    /// Session id, used to find the project when the label is not at hand
    #[arg(long = "session")]
    session_id: Option<String>,

    /// Reset BIDS data before running
    #[arg(long)]
    reset: bool,

    /// Template catalog to use (overrides CURATE_BIDS_TEMPLATE)
    #[arg(long)]
    template_file: Option<PathBuf>,

    /// Directory with the contents of files attached to the project
    #[arg(long)]
    attachments: Option<PathBuf>,

    /// Compute metadata without pushing updates
    #[arg(long)]
    no_update: bool,

    /// Also validate enum membership
    #[arg(long)]
    check_enums: bool,

    /// Write updates here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the curated export here
    #[arg(long)]
    write_tree: Option<PathBuf>,
}

#[derive(Args)]
struct CheckCatalogArgs {
    /// Catalog file (JSON or TOML)
    path: Option<PathBuf>,
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Curate(args) => run_curate(args),
        Commands::Schema => catalog::print_schema(),
        Commands::CheckCatalog(args) => catalog::check_catalog(args.path.as_deref()),
    }
}

fn run_curate(args: CurateArgs) -> Result<()> {
    if args.project_label.is_none() && args.session_id.is_none() {
        println!("Either project label or session id is required!");
        std::process::exit(1);
    }

    let export = Export::from_file(&args.tree)
        .with_context(|| format!("Failed to read export {}", args.tree.display()))?;
    let tree = select_project(&export, &args)?;
    let mut tree = match &args.attachments {
        Some(dir) => tree.with_attachments(dir),
        None => tree,
    };

    let template_file = args
        .template_file
        .clone()
        .or_else(|| env::var_os(TEMPLATE_ENV).map(PathBuf::from));
    let options = CurateOptions {
        reset: args.reset,
        update: !args.no_update,
        check_enums: args.check_enums,
    };

    let mut sink = UpdateLog::new();
    let report = curate_tree(&mut tree, &mut sink, template_file.as_deref(), options)?;
    log::debug!("report: {}", serde_json::to_string(&report)?);

    let updates = serde_json::to_string_pretty(&sink.into_updates())?;
    match &args.output {
        Some(path) => write_file(path, &updates)?,
        None => println!("{updates}"),
    }
    if let Some(path) = &args.write_tree {
        write_file(path, &serde_json::to_string_pretty(&tree.to_value())?)?;
    }
    Ok(())
}

fn select_project(export: &Export, args: &CurateArgs) -> Result<ProjectTree> {
    if let Some(label) = &args.project_label {
        return export
            .project_by_label(label)
            .with_context(|| format!("Failed to find project '{label}'"));
    }
    let session_id = args.session_id.as_deref().unwrap_or_default();
    export
        .project_by_session(session_id)
        .with_context(|| format!("Failed to find project for session {session_id}"))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}
