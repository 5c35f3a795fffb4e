//! syncer.rs - Filesystem primitives for steps that touch user files.
//!
//! Nothing here deletes user data: an existing destination is renamed to
//! `<name>.bak.<YYYYmmddHHMMSS>` before it is replaced, and whole-file rewrites go
//! through a temp file in the same directory followed by a rename.

use crate::command_runner::LogSink;
use crate::error::{ProvisionError, Result};
use chrono::Local;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// chrono format of the backup suffix (14 digits).
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// `path` with `.bak.<timestamp>` appended to its file name.
pub fn backup_path(path: &Path, timestamp: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak.");
    name.push(timestamp);
    path.with_file_name(name)
}

#[derive(Debug, Clone)]
pub struct FileSyncer {
    home: Option<PathBuf>,
}

impl Default for FileSyncer {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSyncer {
    pub fn new() -> Self {
        Self {
            home: dirs::home_dir(),
        }
    }

    /// Syncer resolving `~` against `home` instead of the real home directory.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
        }
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Expand a leading `~` or `~/`.
    pub fn expand_home(&self, path: &str) -> Result<PathBuf> {
        let rest = match path {
            "~" => "",
            p if p.starts_with("~/") => &p[2..],
            p => return Ok(PathBuf::from(p)),
        };
        let home = self
            .home
            .as_ref()
            .ok_or_else(|| ProvisionError::step("cannot determine the home directory"))?;
        Ok(home.join(rest))
    }

    /// Copy a regular file, creating the destination's parent directories.
    pub fn copy_file(&self, src: &Path, dst: &Path) -> Result<()> {
        let meta = fs::metadata(src)?;
        if !meta.is_file() {
            return Err(ProvisionError::step(format!(
                "{} is not a regular file",
                src.display()
            )));
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;
        Ok(())
    }

    /// Move `path` aside to a timestamped backup and return the backup's path.
    pub fn backup(&self, path: &Path) -> Result<PathBuf> {
        let timestamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut candidate = backup_path(path, &timestamp);
        let mut attempt = 1;
        // Same-second backups of one file must not clobber each other.
        while fs::symlink_metadata(&candidate).is_ok() {
            candidate = backup_path(path, &format!("{}.{}", timestamp, attempt));
            attempt += 1;
        }
        fs::rename(path, &candidate).map_err(|e| {
            ProvisionError::step(format!("failed to back up {}: {}", path.display(), e))
        })?;
        debug!("backed up {} to {}", path.display(), candidate.display());
        Ok(candidate)
    }

    /// Copy `src` over `dst`, backing up `dst` first if it exists.
    pub fn backup_and_copy(&self, src: &Path, dst: &Path) -> Result<Option<PathBuf>> {
        let backup = if fs::symlink_metadata(dst).is_ok() {
            Some(self.backup(dst)?)
        } else {
            None
        };
        self.copy_file(src, dst)?;
        Ok(backup)
    }

    /// Replace `path` with `content` atomically and set its mode bits.
    pub fn atomic_write(&self, path: &Path, content: &[u8], mode: u32) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".dotwizard-tmp-")
            .tempfile_in(dir)?;
        tmp.write_all(content)?;
        tmp.as_file().set_permissions(fs::Permissions::from_mode(mode))?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| ProvisionError::Io(e.error))?;
        Ok(())
    }

    /// Mirror `src` (file or directory tree) onto `dest`, backing up every file it
    /// replaces. A single file whose `dest` is an existing directory is copied into
    /// it. Returns the number of files written.
    pub fn sync_tree(&self, src: &Path, dest: &Path, sink: &LogSink) -> Result<usize> {
        let meta = fs::symlink_metadata(src).map_err(|_| {
            ProvisionError::step(format!("dotfile source {} does not exist", src.display()))
        })?;
        if meta.is_file() {
            // An existing directory receives the file; only that entry is backed up.
            let target = match (fs::metadata(dest), src.file_name()) {
                (Ok(existing), Some(name)) if existing.is_dir() => dest.join(name),
                _ => dest.to_path_buf(),
            };
            self.backup_and_copy(src, &target)?;
            return Ok(1);
        }

        fs::create_dir_all(dest)?;
        let mut copied = 0;
        let walker = WalkDir::new(src)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            let rel = entry.path().strip_prefix(src).map_err(|e| {
                ProvisionError::step(format!("unexpected path {}: {}", entry.path().display(), e))
            })?;
            let target = dest.join(rel);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target)?;
            } else if file_type.is_symlink() {
                sink.line(format!("  -> {} (link)", rel.display()));
                if fs::symlink_metadata(&target).is_ok() {
                    self.backup(&target)?;
                }
                let link = fs::read_link(entry.path())?;
                std::os::unix::fs::symlink(link, &target)?;
                copied += 1;
            } else {
                sink.line(format!("  -> {}", rel.display()));
                self.backup_and_copy(entry.path(), &target)?;
                copied += 1;
            }
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_path_appends_suffix() {
        let path = backup_path(Path::new("/home/me/.bashrc"), "20240102030405");
        assert_eq!(path, PathBuf::from("/home/me/.bashrc.bak.20240102030405"));
    }

    #[test]
    fn test_expand_home() {
        let syncer = FileSyncer::with_home("/home/tester");
        assert_eq!(
            syncer.expand_home("~/.config/kitty").unwrap(),
            PathBuf::from("/home/tester/.config/kitty")
        );
        assert_eq!(syncer.expand_home("~").unwrap(), PathBuf::from("/home/tester"));
        assert_eq!(syncer.expand_home("/etc/hosts").unwrap(), PathBuf::from("/etc/hosts"));
        assert_eq!(syncer.expand_home("~other/x").unwrap(), PathBuf::from("~other/x"));
    }

    #[test]
    fn test_expand_home_without_home_fails() {
        let syncer = FileSyncer { home: None };
        assert!(syncer.expand_home("~/x").is_err());
        assert!(syncer.expand_home("/x").is_ok());
    }

    #[test]
    fn test_atomic_write_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/file.conf");
        let syncer = FileSyncer::with_home(dir.path());

        syncer.atomic_write(&path, b"first", 0o600).unwrap();
        syncer.atomic_write(&path, b"second", 0o644).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_copy_file_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let syncer = FileSyncer::with_home(dir.path());
        assert!(syncer.copy_file(dir.path(), &dir.path().join("x")).is_err());
    }

    #[test]
    fn test_repeated_backups_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let syncer = FileSyncer::with_home(dir.path());
        let target = dir.path().join("rc");

        fs::write(&target, "one").unwrap();
        let first = syncer.backup(&target).unwrap();
        fs::write(&target, "two").unwrap();
        let second = syncer.backup(&target).unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(first).unwrap(), "one");
        assert_eq!(fs::read_to_string(second).unwrap(), "two");
    }
}
