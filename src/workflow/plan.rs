//! Workflow plan step: show the reconciliation plan without applying it.
use crate::cli::PlanArgs;
use crate::context::ProjectContext;
use crate::reconcile::reconcile;
use crate::scan::{ScanReport, Scanner};
use anyhow::{Context, Result};
use serde::Serialize;
use std::process::ExitCode;

#[derive(Serialize)]
struct PlanSummary {
    files_scanned: usize,
    add_to_manifest: Vec<PlannedAddition>,
    add_to_lock: Vec<String>,
    orphans: Vec<String>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct PlannedAddition {
    name: String,
    first_reference: Option<String>,
}

/// Run the plan step. The plan is computed and printed, never applied.
pub fn run_plan(args: &PlanArgs) -> Result<ExitCode> {
    let ctx = ProjectContext::load(&args.project)?;
    let manifest = ctx.require_manifest()?;
    let lock = ctx.lockfile_or_empty()?;

    let scanner = Scanner::new(&ctx.config.extensions);
    let report = scanner.scan(ctx.root());
    if args.verbose {
        eprintln!("scanned {} files", report.files_scanned);
    }
    let plan = reconcile(&report.names(), &manifest, &lock);

    let summary = PlanSummary {
        files_scanned: report.files_scanned,
        add_to_manifest: plan
            .add_to_manifest
            .iter()
            .map(|name| PlannedAddition {
                name: name.clone(),
                first_reference: first_reference(&report, name),
            })
            .collect(),
        add_to_lock: plan.add_to_lock.iter().cloned().collect(),
        orphans: plan.orphans.iter().cloned().collect(),
        warnings: report.warnings.clone(),
    };

    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize plan summary")?;
        println!("{text}");
        return Ok(ExitCode::SUCCESS);
    }

    if summary.add_to_manifest.is_empty() && summary.add_to_lock.is_empty() {
        println!("nothing to do");
    }
    for addition in &summary.add_to_manifest {
        match &addition.first_reference {
            Some(reference) => {
                println!("add to DESCRIPTION: {} (first used at {reference})", addition.name)
            }
            None => println!("add to DESCRIPTION: {}", addition.name),
        }
    }
    for name in &summary.add_to_lock {
        println!("add to renv.lock: {name}");
    }
    for name in &summary.orphans {
        println!("orphan: {name}");
    }
    for warning in &summary.warnings {
        println!("warning: {warning}");
    }
    Ok(ExitCode::SUCCESS)
}

fn first_reference(report: &ScanReport, name: &str) -> Option<String> {
    report
        .first_reference(name)
        .map(|reference| format!("{}:{}", reference.path.display(), reference.line))
}
