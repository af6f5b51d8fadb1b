//! Workflow validate step: scan, reconcile, optionally repair.
use crate::cli::ValidateArgs;
use crate::context::ProjectContext;
use crate::reconcile::{apply, reconcile, ReconciliationPlan};
use crate::registry::RegistryClient;
use crate::scan::{ScanReport, Scanner};
use anyhow::Result;
use std::process::ExitCode;

/// Run the validate step.
///
/// Exit 0 when the project is clean or `--fix` repaired every edit; exit 1
/// when drift remains on disk (no `--fix`, or strict mode with resolution
/// failures).
pub fn run_validate(args: &ValidateArgs) -> Result<ExitCode> {
    let ctx = ProjectContext::load(&args.project)?;
    let manifest = ctx.require_manifest()?;
    let lock = ctx.lockfile_or_empty()?;

    let scanner = Scanner::new(&ctx.config.extensions);
    let report = scanner.scan(ctx.root());
    if args.verbose {
        eprintln!(
            "scanned {} files, found {} packages",
            report.files_scanned,
            report.names().len()
        );
    }

    let plan = reconcile(&report.names(), &manifest, &lock);
    report_orphans(&plan);
    for warning in &report.warnings {
        println!("warning: {warning}");
    }

    if !plan.has_drift() {
        println!("no drift: DESCRIPTION and renv.lock cover all scanned packages");
        return Ok(ExitCode::SUCCESS);
    }

    if !args.fix {
        report_drift(&plan, &report);
        println!(
            "run `drydock validate --project {} --fix` to repair",
            args.project.display()
        );
        return Ok(ExitCode::FAILURE);
    }

    let resolver = RegistryClient::new(&ctx.config.registry, ctx.config.timeout);
    let outcome = apply(&resolver, ctx.root(), &manifest, &lock, &plan)?;
    for name in &outcome.manifest_additions {
        println!("added {name} to DESCRIPTION");
    }
    for (name, version) in &outcome.lock_additions {
        println!("locked {name} {version}");
    }
    if outcome.failures.is_empty() {
        println!("drift repaired");
        return Ok(ExitCode::SUCCESS);
    }
    for failure in &outcome.failures {
        println!("warning: {failure}; re-run `drydock validate --fix` to retry");
    }
    if args.strict {
        println!(
            "{} package(s) left unresolved in strict mode",
            outcome.failures.len()
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn report_drift(plan: &ReconciliationPlan, report: &ScanReport) {
    for name in &plan.add_to_manifest {
        match report.first_reference(name) {
            Some(reference) => println!(
                "missing from DESCRIPTION: {name} (first used at {}:{})",
                reference.path.display(),
                reference.line
            ),
            None => println!("missing from DESCRIPTION: {name}"),
        }
    }
    for name in &plan.add_to_lock {
        println!("missing from renv.lock: {name}");
    }
}

fn report_orphans(plan: &ReconciliationPlan) {
    for name in &plan.orphans {
        println!(
            "orphan: {name} is locked but not in DESCRIPTION (left untouched; remove it from renv.lock manually if it is truly unused)"
        );
    }
}
