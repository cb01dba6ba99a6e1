// file: src/system/files.rs
// version: 1.0.0
// guid: ca52d16a-2f0b-4225-a908-f9a38131ab63

//! Crash-safe file replacement, timestamped backups and the advisory run lock

use crate::error::{MeshError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Timestamp format of backup names; sorts chronologically as a string
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Replace `path` with `content` via a temp file in the same directory and a
/// rename, so readers see either the old or the new file.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mode = fs::metadata(path)
        .map(|m| m.permissions().mode())
        .unwrap_or(0o644);

    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))?;
    tmp.persist(path).map_err(|e| MeshError::Io(e.error))?;

    debug!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

/// A saved copy of a managed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Location of the copy
    pub path: PathBuf,
    /// File the copy was taken from
    pub source: PathBuf,
    pub timestamp: String,
}

/// Everything one apply changed: copies of the files it replaced and the
/// files it created. Rollback undoes one run as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRun {
    pub id: String,
    pub backups: Vec<BackupRecord>,
    pub created: Vec<PathBuf>,
}

/// Sort key of a run id: base timestamp, then the numeric collision suffix
fn stamp_key(stamp: &str) -> (&str, u32) {
    match stamp.split_once('-') {
        Some((base, n)) => (base, n.parse().unwrap_or(0)),
        None => (stamp, 0),
    }
}

/// Directory of timestamped copies named `<file>.<run id>`, plus one
/// `run-<run id>.json` manifest per completed run
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(source: &Path) -> Result<String> {
        source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                MeshError::backup_failed(source.display().to_string(), "path has no file name")
            })
    }

    fn manifest_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("run-{}.json", id))
    }

    /// Start a run stamped with the current time
    pub fn begin_run(&self, sources: &[&Path]) -> Result<BackupRun> {
        let stamp = chrono::Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        self.begin_run_at(sources, &stamp)
    }

    /// Start a run whose id is `stamp`, suffixed with `-N` when an earlier run
    /// or a copy of one of `sources` already uses it
    pub fn begin_run_at(&self, sources: &[&Path], stamp: &str) -> Result<BackupRun> {
        let names = sources
            .iter()
            .map(|s| Self::file_name(s))
            .collect::<Result<Vec<_>>>()?;
        let taken = |id: &str| {
            self.manifest_path(id).exists()
                || names
                    .iter()
                    .any(|name| self.dir.join(format!("{}.{}", name, id)).exists())
        };

        let mut id = stamp.to_string();
        let mut n = 1;
        while taken(&id) {
            id = format!("{}-{}", stamp, n);
            n += 1;
        }
        Ok(BackupRun {
            id,
            ..Default::default()
        })
    }

    /// Copy `source` into the store under the run id. A missing source is
    /// recorded as created by the run instead.
    pub fn backup(&self, run: &mut BackupRun, source: &Path) -> Result<()> {
        if !source.exists() {
            debug!("No existing {} to back up", source.display());
            run.created.push(source.to_path_buf());
            return Ok(());
        }

        let failed = |reason: String| MeshError::backup_failed(source.display().to_string(), reason);
        fs::create_dir_all(&self.dir)
            .map_err(|e| failed(format!("cannot create {}: {}", self.dir.display(), e)))?;

        let target = self.dir.join(format!("{}.{}", Self::file_name(source)?, run.id));
        fs::copy(source, &target).map_err(|e| failed(e.to_string()))?;
        info!("Backed up {} to {}", source.display(), target.display());

        run.backups.push(BackupRecord {
            path: target,
            source: source.to_path_buf(),
            timestamp: run.id.clone(),
        });
        Ok(())
    }

    /// Record a completed run so rollback can find it
    pub fn commit(&self, run: &BackupRun) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let manifest = serde_json::to_string_pretty(run)?;
        atomic_write(self.manifest_path(&run.id), &manifest)
    }

    /// Completed runs, oldest first
    pub fn runs(&self) -> Result<Vec<BackupRun>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("run-") && name.ends_with(".json") {
                let content = fs::read_to_string(entry.path())?;
                let run: BackupRun = serde_json::from_str(&content)?;
                runs.push(run);
            }
        }
        runs.sort_by(|a, b| stamp_key(&a.id).cmp(&stamp_key(&b.id)));
        Ok(runs)
    }

    /// Most recent completed run
    pub fn latest_run(&self) -> Result<Option<BackupRun>> {
        Ok(self.runs()?.pop())
    }

    /// Undo a run: put replaced files back and remove the ones it created
    pub fn restore(&self, run: &BackupRun) -> Result<()> {
        for record in &run.backups {
            let content = fs::read_to_string(&record.path)?;
            atomic_write(&record.source, &content)?;
            info!(
                "Restored {} from {}",
                record.source.display(),
                record.path.display()
            );
        }
        for path in &run.created {
            match fs::remove_file(path) {
                Ok(()) => info!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Drop the manifest of a rolled back run; the copies stay on disk
    pub fn retire(&self, run: &BackupRun) -> Result<()> {
        fs::remove_file(self.manifest_path(&run.id))?;
        Ok(())
    }
}

/// Exclusive advisory lock held for the duration of a write sequence
#[derive(Debug)]
pub struct ConfigLock {
    file: File,
    path: PathBuf,
}

impl ConfigLock {
    /// Take the lock without blocking; a concurrent run fails fast
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        // SAFETY: the descriptor belongs to `file`, which outlives the call
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            return Err(MeshError::LockFailed(format!(
                "{}: {}",
                path.display(),
                std::io::Error::last_os_error()
            )));
        }
        debug!("Acquired lock {}", path.display());
        Ok(Self { file, path })
    }
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        // SAFETY: see acquire
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        debug!("Released lock {}", self.path.display());
    }
}
