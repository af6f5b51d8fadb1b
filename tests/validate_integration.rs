//! End-to-end validate/plan runs against a scratch project and a stub
//! registry.

mod common;

use common::{project, registry_body, registry_config, run_drydock, stdout_of, StubRegistry};
use drydock::lockfile::Lockfile;
use drydock::manifest::Manifest;
use std::collections::HashMap;

const CLEAN_LOCK: &str = r#"{
  "R": { "Version": "4.4.1" },
  "Packages": {
    "pkgA": {
      "Package": "pkgA",
      "Version": "1.0.0",
      "Source": "Repository",
      "Repository": "CRAN"
    }
  }
}"#;

#[test]
fn clean_project_exits_zero() {
    let dir = project(&[
        ("DESCRIPTION", "Package: demo\nImports: pkgA\n"),
        ("renv.lock", CLEAN_LOCK),
        ("analysis.R", "pkgA::run()\n"),
    ]);
    let output = run_drydock(dir.path(), &["validate"]);
    assert!(output.status.success(), "stdout: {}", stdout_of(&output));
    assert!(stdout_of(&output).contains("no drift"));
}

#[test]
fn drift_without_fix_exits_one_and_names_the_package() {
    let dir = project(&[
        ("DESCRIPTION", "Package: demo\nImports: pkgA\n"),
        ("renv.lock", CLEAN_LOCK),
        ("analysis.R", "pkgA::run()\nlibrary(pkgB)\n"),
    ]);
    let output = run_drydock(dir.path(), &["validate"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("pkgB"));
    assert!(stdout.contains("analysis.R:2"));
    assert!(stdout.contains("--fix"));
}

#[test]
fn fix_adds_to_manifest_and_lock_from_the_registry() {
    let registry = StubRegistry::serve(HashMap::from([
        ("pkgA".to_string(), (200, registry_body("pkgA", "1.2.3"))),
        ("pkgB".to_string(), (200, registry_body("pkgB", "0.9.1"))),
    ]));
    let dir = project(&[
        ("DESCRIPTION", "Package: demo\nImports: pkgA\n"),
        ("drydock.json", &registry_config(registry.url())),
        ("analysis.R", "pkgA::run()\nlibrary(pkgB)\n"),
    ]);

    let output = run_drydock(dir.path(), &["validate", "--fix"]);
    assert!(output.status.success(), "stdout: {}", stdout_of(&output));

    let manifest = Manifest::load(&dir.path().join("DESCRIPTION")).expect("reload manifest");
    assert!(manifest.contains("pkgA"));
    assert!(manifest.contains("pkgB"));

    let lock = Lockfile::load(&dir.path().join("renv.lock")).expect("reload lock");
    assert_eq!(lock.packages.len(), 2);
    assert_eq!(lock.packages["pkgA"].version, "1.2.3");
    assert_eq!(lock.packages["pkgB"].version, "0.9.1");

    // A second run sees no drift: the fix is idempotent.
    let second = run_drydock(dir.path(), &["validate"]);
    assert!(second.status.success());
    assert!(stdout_of(&second).contains("no drift"));
}

#[test]
fn registry_404_fails_only_that_package() {
    let registry = StubRegistry::serve(HashMap::from([(
        "pkgA".to_string(),
        (200, registry_body("pkgA", "1.2.3")),
    )]));
    let dir = project(&[
        ("DESCRIPTION", "Package: demo\nImports: pkgA\n"),
        ("drydock.json", &registry_config(registry.url())),
        ("analysis.R", "pkgA::run()\nlibrary(pkgX)\n"),
    ]);

    let output = run_drydock(dir.path(), &["validate", "--fix"]);
    assert!(output.status.success(), "stdout: {}", stdout_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("pkgX"));
    assert!(stdout.contains("404"));

    let lock = Lockfile::load(&dir.path().join("renv.lock")).expect("reload lock");
    assert!(lock.contains("pkgA"));
    assert!(!lock.contains("pkgX"));

    // Strict mode turns the same partial failure into exit 1.
    let strict = run_drydock(dir.path(), &["validate", "--fix", "--strict"]);
    assert_eq!(strict.status.code(), Some(1));
}

#[test]
fn orphaned_lock_entry_is_reported_but_kept() {
    let dir = project(&[
        ("DESCRIPTION", "Package: demo\n"),
        (
            "renv.lock",
            r#"{
  "R": { "Version": "4.4.1" },
  "Packages": {
    "pkgC": {
      "Package": "pkgC",
      "Version": "2.0.0",
      "Source": "Repository"
    }
  }
}"#,
        ),
    ]);
    let output = run_drydock(dir.path(), &["validate"]);
    assert!(output.status.success(), "stdout: {}", stdout_of(&output));
    assert!(stdout_of(&output).contains("orphan: pkgC"));

    let lock = Lockfile::load(&dir.path().join("renv.lock")).expect("reload lock");
    assert_eq!(lock.packages["pkgC"].version, "2.0.0");
}

#[test]
fn plan_is_read_only_and_machine_readable() {
    let dir = project(&[
        ("DESCRIPTION", "Package: demo\nImports: pkgA\n"),
        ("analysis.R", "library(pkgB)\n"),
    ]);
    let before = std::fs::read_to_string(dir.path().join("DESCRIPTION")).expect("read manifest");

    let output = run_drydock(dir.path(), &["plan", "--json"]);
    assert!(output.status.success(), "stdout: {}", stdout_of(&output));
    let summary: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("parse plan JSON");
    assert_eq!(summary["add_to_manifest"][0]["name"], "pkgB");
    assert_eq!(
        summary["add_to_manifest"][0]["first_reference"],
        "analysis.R:1"
    );
    let lock_names: Vec<&str> = summary["add_to_lock"]
        .as_array()
        .expect("add_to_lock array")
        .iter()
        .filter_map(|value| value.as_str())
        .collect();
    assert_eq!(lock_names, vec!["pkgA", "pkgB"]);

    let after = std::fs::read_to_string(dir.path().join("DESCRIPTION")).expect("read manifest");
    assert_eq!(before, after);
    assert!(!dir.path().join("renv.lock").exists());
}

#[test]
fn missing_manifest_is_a_clear_error() {
    let dir = project(&[("analysis.R", "library(pkgB)\n")]);
    let output = run_drydock(dir.path(), &["validate"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DESCRIPTION"));
}
