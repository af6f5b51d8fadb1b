//! Workflow orchestration: one run function per subcommand.
//!
//! Each step loads an explicit project context, wires components together,
//! and turns outcomes into exit codes; policy lives in the components.
mod build;
mod plan;
mod validate;

pub use build::run_docker;
pub use plan::run_plan;
pub use validate::run_validate;
