//! Per-invocation project context.
//!
//! One context is constructed per command and handed to the components that
//! need it; no state is shared through globals.
use crate::config::Config;
use crate::lockfile::{Lockfile, LOCKFILE_NAME};
use crate::manifest::{Manifest, MANIFEST_FILE};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

pub struct ProjectContext {
    root: PathBuf,
    pub config: Config,
}

impl ProjectContext {
    pub fn load(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(anyhow!(
                "project root {} is not a directory (pass --project pointing at an R project)",
                root.display()
            ));
        }
        let config = Config::load(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.root.join(LOCKFILE_NAME)
    }

    pub fn dockerfile_path(&self) -> PathBuf {
        self.root.join("docker").join("Dockerfile")
    }

    /// The manifest is required for every reconciliation command.
    pub fn require_manifest(&self) -> Result<Manifest> {
        let path = self.manifest_path();
        if !path.is_file() {
            return Err(anyhow!(
                "missing {} at {} (create one with at least a `Package:` field)",
                MANIFEST_FILE,
                path.display()
            ));
        }
        Manifest::load(&path)
    }

    /// A project that has never been snapshotted gets an empty lockfile.
    pub fn lockfile_or_empty(&self) -> Result<Lockfile> {
        let path = self.lockfile_path();
        if !path.is_file() {
            return Ok(Lockfile::empty(&self.config.r_version));
        }
        Lockfile::load(&path)
    }

    /// Image tag stem: manifest package name, else the directory name.
    pub fn image_name(&self) -> String {
        let from_manifest = self
            .require_manifest()
            .ok()
            .and_then(|manifest| manifest.name());
        let name = from_manifest.unwrap_or_else(|| {
            self.root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string())
        });
        name.to_ascii_lowercase()
    }
}
