//! Drift detection and repair across code, manifest, and lockfile.
//!
//! `reconcile` is a pure function of its three inputs; `apply` stages every
//! surviving edit and swaps the manifest and lockfile in together. Applying
//! a plan and reconciling again yields an empty plan.
use crate::lockfile::{LockEntry, Lockfile, LOCKFILE_NAME};
use crate::manifest::{DependencyField, Manifest, MANIFEST_FILE};
use crate::registry::{MetadataSource, PackageMetadata, ResolveError};
use crate::staging::{commit_staged, StagedWrite};
use anyhow::Result;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

/// Computed diff between scanned code, manifest, and lockfile.
///
/// Packages needing no edit do not appear; an empty plan (orphans aside) is
/// the no-drift signal. Orphans are report-only and never block anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub add_to_manifest: BTreeSet<String>,
    pub add_to_lock: BTreeSet<String>,
    pub orphans: BTreeSet<String>,
}

impl ReconciliationPlan {
    pub fn has_drift(&self) -> bool {
        !self.add_to_manifest.is_empty() || !self.add_to_lock.is_empty()
    }
}

/// Compute the edit set that makes manifest and lockfile cover the scanned
/// references.
pub fn reconcile(
    scanned: &BTreeSet<String>,
    manifest: &Manifest,
    lock: &Lockfile,
) -> ReconciliationPlan {
    let manifest_names = manifest.dependency_names();
    let add_to_manifest: BTreeSet<String> = scanned
        .iter()
        .filter(|name| !manifest_names.contains(*name))
        .cloned()
        .collect();
    let mut declared = manifest_names.clone();
    declared.extend(add_to_manifest.iter().cloned());
    let add_to_lock: BTreeSet<String> = declared
        .iter()
        .filter(|name| !lock.contains(name))
        .cloned()
        .collect();
    let orphans: BTreeSet<String> = lock
        .packages
        .keys()
        .filter(|name| !declared.contains(*name))
        .cloned()
        .collect();
    ReconciliationPlan {
        add_to_manifest,
        add_to_lock,
        orphans,
    }
}

/// What one `apply` call did, including the per-package failures it
/// recovered from.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub manifest_additions: Vec<String>,
    pub lock_additions: Vec<(String, String)>,
    pub failures: Vec<ResolveError>,
}

impl ApplyOutcome {
    pub fn changed(&self) -> bool {
        !self.manifest_additions.is_empty() || !self.lock_additions.is_empty()
    }
}

/// Resolve missing metadata and persist the plan's edits.
///
/// A package whose resolution fails is dropped from the staged edit set
/// entirely (both manifest and lock) and reported; the remaining packages
/// still land. Persistence failures abort the whole call with the originals
/// untouched.
pub fn apply(
    resolver: &dyn MetadataSource,
    project_root: &Path,
    manifest: &Manifest,
    lock: &Lockfile,
    plan: &ReconciliationPlan,
) -> Result<ApplyOutcome> {
    let mut outcome = ApplyOutcome::default();
    let mut next_lock = lock.clone();
    let mut failed: BTreeSet<&str> = BTreeSet::new();

    for name in &plan.add_to_lock {
        match resolver.resolve(name) {
            Ok(metadata) => {
                tracing::info!("resolved {name} {}", metadata.version);
                outcome
                    .lock_additions
                    .push((name.clone(), metadata.version.clone()));
                next_lock.insert(lock_entry(name, metadata));
            }
            Err(err) => {
                tracing::warn!("{err}");
                failed.insert(name.as_str());
                outcome.failures.push(err);
            }
        }
    }

    let mut next_manifest = manifest.clone();
    for name in &plan.add_to_manifest {
        if failed.contains(name.as_str()) {
            continue;
        }
        next_manifest.add_entry(name, DependencyField::Imports);
        outcome.manifest_additions.push(name.clone());
    }

    if !outcome.changed() {
        return Ok(outcome);
    }

    let writes = vec![
        StagedWrite {
            path: project_root.join(MANIFEST_FILE),
            bytes: next_manifest.render().into_bytes(),
        },
        StagedWrite {
            path: project_root.join(LOCKFILE_NAME),
            bytes: next_lock.render()?.into_bytes(),
        },
    ];
    commit_staged(project_root, &writes)?;
    Ok(outcome)
}

fn lock_entry(name: &str, metadata: PackageMetadata) -> LockEntry {
    LockEntry {
        name: name.to_string(),
        version: metadata.version,
        source: "Repository".to_string(),
        repository: metadata.repository.or_else(|| Some("CRAN".to_string())),
        hash: metadata.hash,
        requirements: metadata.requirements,
        extra: BTreeMap::new(),
    }
}
