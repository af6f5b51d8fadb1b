//! CLI argument parsing for the drydock workflow.
//!
//! The CLI is intentionally thin: each subcommand maps onto one workflow
//! run function and carries no policy of its own.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "drydock",
    version,
    about = "Reproducible Docker environments and dependency hygiene for R research projects",
    after_help = "Commands:\n  validate --project <dir>   Detect (and with --fix repair) drift between code, DESCRIPTION, and renv.lock\n  plan --project <dir>       Show the reconciliation plan without applying it\n  docker --project <dir>     Resolve a build profile, write the Dockerfile, optionally build\n\nExamples:\n  drydock validate --project .\n  drydock validate --project . --fix --strict\n  drydock plan --project ~/work/reef-survey --json\n  drydock docker --project . --profile geospatial --build",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Validate(ValidateArgs),
    Plan(PlanArgs),
    Docker(DockerArgs),
}

/// Validate command inputs.
#[derive(Parser, Debug)]
#[command(about = "Detect and optionally repair dependency drift")]
pub struct ValidateArgs {
    /// Project root containing DESCRIPTION and renv.lock
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub project: PathBuf,

    /// Repair drift by editing DESCRIPTION and renv.lock in place
    #[arg(long)]
    pub fix: bool,

    /// Treat per-package resolution failures as fatal
    #[arg(long)]
    pub strict: bool,

    /// Emit a verbose transcript of the run
    #[arg(long)]
    pub verbose: bool,
}

/// Plan command inputs.
#[derive(Parser, Debug)]
#[command(about = "Compute the reconciliation plan without applying it")]
pub struct PlanArgs {
    /// Project root containing DESCRIPTION and renv.lock
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub project: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Emit a verbose transcript of the run
    #[arg(long)]
    pub verbose: bool,
}

/// Docker command inputs.
#[derive(Parser, Debug)]
#[command(about = "Resolve a build profile and produce (or reuse) an image")]
pub struct DockerArgs {
    /// Project root containing DESCRIPTION and renv.lock
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub project: PathBuf,

    /// Named environment profile from the catalog
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Override the base image
    #[arg(long, value_name = "IMAGE")]
    pub base_image: Option<String>,

    /// Override the system-library bundle
    #[arg(long, value_name = "BUNDLE")]
    pub system_libs: Option<String>,

    /// Override the package bundle
    #[arg(long, value_name = "BUNDLE")]
    pub packages: Option<String>,

    /// Image tag for a fresh build (default: drydock-<project>:latest)
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Build the image after resolving the definition
    #[arg(long)]
    pub build: bool,

    /// Build even when the cache already has a matching image
    #[arg(long, requires = "build")]
    pub force: bool,

    /// Emit a verbose transcript of the run
    #[arg(long)]
    pub verbose: bool,
}
