use anyhow::Result;
use clap::Parser;
use drydock::cli::{Command, RootArgs};
use drydock::workflow;
use std::process::ExitCode;

fn main() -> ExitCode {
    init_tracing();
    let args = RootArgs::parse();
    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &RootArgs) -> Result<ExitCode> {
    match &args.command {
        Command::Validate(args) => workflow::run_validate(args),
        Command::Plan(args) => workflow::run_plan(args),
        Command::Docker(args) => workflow::run_docker(args),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
