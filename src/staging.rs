//! Transactional persistence for manifest and lockfile edits.
//!
//! Edits are staged beside the originals and swapped in with rename; either
//! every file lands or the originals are left untouched. The swap region is
//! serialized across invocations by an exclusive advisory lock.
use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const LOCK_FILE: &str = ".drydock.lock";

/// One pending file replacement.
#[derive(Debug)]
pub struct StagedWrite {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Exclusive advisory lock on the project, held for the swap region.
///
/// Blocks until the lock is granted; concurrent applies serialize rather
/// than interleave. Released on drop.
struct ProjectLock {
    file: fs::File,
}

impl ProjectLock {
    fn acquire(project_root: &Path) -> Result<Self> {
        let path = project_root.join(LOCK_FILE);
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("open lock file {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("lock {}", path.display()))?;
        Ok(Self { file })
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Stage every write, then swap all of them into place.
///
/// Failure before the swap leaves the tree untouched; failure mid-swap rolls
/// the already-swapped files back from their backups.
pub fn commit_staged(project_root: &Path, writes: &[StagedWrite]) -> Result<()> {
    if writes.is_empty() {
        return Ok(());
    }
    let _lock = ProjectLock::acquire(project_root)?;
    let staging = tempfile::Builder::new()
        .prefix(".drydock-stage-")
        .tempdir_in(project_root)
        .with_context(|| format!("create staging dir in {}", project_root.display()))?;

    let mut staged: Vec<PathBuf> = Vec::new();
    for (index, write) in writes.iter().enumerate() {
        let staged_path = staging.path().join(format!("staged-{index}"));
        fs::write(&staged_path, &write.bytes)
            .with_context(|| format!("stage {}", write.path.display()))?;
        staged.push(staged_path);
    }

    swap_all(&staging, writes, &staged)
}

fn swap_all(staging: &TempDir, writes: &[StagedWrite], staged: &[PathBuf]) -> Result<()> {
    let mut swapped: Vec<(PathBuf, Option<PathBuf>)> = Vec::new();
    for (index, write) in writes.iter().enumerate() {
        match swap_one(staging, index, write, &staged[index]) {
            Ok(backup) => swapped.push((write.path.clone(), backup)),
            Err(err) => {
                rollback(&swapped);
                return Err(err.context(format!("swap in {}", write.path.display())));
            }
        }
    }
    Ok(())
}

fn swap_one(
    staging: &TempDir,
    index: usize,
    write: &StagedWrite,
    staged_path: &Path,
) -> Result<Option<PathBuf>> {
    let parent = write
        .path
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", write.path.display()))?;
    if !parent.is_dir() {
        return Err(anyhow!("{} is not a directory", parent.display()));
    }
    let backup = if write.path.exists() {
        let backup_path = staging.path().join(format!("backup-{index}"));
        fs::rename(&write.path, &backup_path)
            .with_context(|| format!("back up {}", write.path.display()))?;
        Some(backup_path)
    } else {
        None
    };
    if let Err(err) = fs::rename(staged_path, &write.path) {
        // Restore this file before reporting, so rollback only has to deal
        // with the earlier, fully swapped files.
        if let Some(backup_path) = &backup {
            let _ = fs::rename(backup_path, &write.path);
        }
        return Err(anyhow::Error::new(err));
    }
    Ok(backup)
}

fn rollback(swapped: &[(PathBuf, Option<PathBuf>)]) {
    for (dest, backup) in swapped {
        match backup {
            Some(backup_path) => {
                let _ = fs::remove_file(dest);
                let _ = fs::rename(backup_path, dest);
            }
            None => {
                let _ = fs::remove_file(dest);
            }
        }
    }
}
