//! Atomic, size-checked map file writer.
//!
//! A map is buffered in memory, written to a temporary file next to its
//! destination and renamed into place only once complete. Downstream
//! consumers therefore see either the old map or the whole new one.
//!
//! Before replacing an existing map the new size is compared to the old:
//! a large swing usually means a broken snapshot, not a real change, and
//! the old map is kept.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::WriteError;
use crate::report::WriteStatus;

/// Sentinel line marking a complete map.
pub const EOF_MARKER: &str = "E_O_F";

/// Hex SHA-256 of `content`.
pub fn digest(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Refuse a size change of more than `limit` percent.
///
/// An empty or missing old file accepts any new size.
pub fn check_similar_size(path: &Path, old: u64, new: u64, limit: f64) -> Result<(), WriteError> {
    if old == 0 {
        return Ok(());
    }
    let change = 100.0 * (new as f64 / old as f64) - 100.0;
    if change.abs() > limit {
        return Err(WriteError::SizeChange {
            path: path.to_path_buf(),
            limit,
            old,
            new,
            change,
        });
    }
    Ok(())
}

pub struct MapWriter {
    path: PathBuf,
    max_change_pct: Option<f64>,
    mode: u32,
    content: String,
    lines: usize,
}

impl MapWriter {
    /// `max_change_pct` of `None` disables the size check.
    pub fn new(path: impl Into<PathBuf>, max_change_pct: Option<f64>) -> Self {
        Self {
            path: path.into(),
            max_change_pct,
            mode: 0o644,
            content: String::new(),
            lines: 0,
        }
    }

    /// Permission bits of the finished file (default 0644).
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn write_line(&mut self, line: &str) {
        self.content.push_str(line);
        if !line.ends_with('\n') {
            self.content.push('\n');
        }
        self.lines += 1;
    }

    pub fn write_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.write_line(line.as_ref());
        }
    }

    /// Put the map in place. With `eof` the sentinel line is appended first.
    pub fn finish(self, eof: bool) -> Result<WriteStatus, WriteError> {
        self.prepare(eof)?.commit()
    }

    /// Run every check and stage the new content next to the destination
    /// without replacing it. Nothing is visible until `commit`.
    pub fn prepare(mut self, eof: bool) -> Result<PreparedMap, WriteError> {
        if eof {
            self.content.push_str(EOF_MARKER);
            self.content.push('\n');
        }
        let io_err = |source| WriteError::Io {
            path: self.path.clone(),
            source,
        };

        let new_digest = digest(self.content.as_bytes());
        let new_len = self.content.len() as u64;

        match fs::read(&self.path) {
            Ok(old) => {
                if digest(&old) == new_digest {
                    info!(path = %self.path.display(), "map unchanged");
                    return Ok(PreparedMap {
                        path: self.path.clone(),
                        staged: None,
                        status: WriteStatus::Unchanged { sha256: new_digest },
                    });
                }
                if let Some(limit) = self.max_change_pct {
                    check_similar_size(&self.path, old.len() as u64, new_len, limit)?;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(e)),
        }

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(self.content.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(self.mode))
            .map_err(io_err)?;

        Ok(PreparedMap {
            path: self.path.clone(),
            staged: Some(tmp),
            status: WriteStatus::Written {
                bytes: new_len,
                sha256: new_digest,
            },
        })
    }
}

/// A map that passed its checks and waits to be renamed into place.
///
/// Dropping it without `commit` removes the staged file and leaves the
/// destination as it was.
pub struct PreparedMap {
    path: PathBuf,
    staged: Option<NamedTempFile>,
    status: WriteStatus,
}

impl PreparedMap {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> &WriteStatus {
        &self.status
    }

    pub fn commit(self) -> Result<WriteStatus, WriteError> {
        if let Some(tmp) = self.staged {
            tmp.persist(&self.path).map_err(|e| WriteError::Io {
                path: self.path.clone(),
                source: e.error,
            })?;
            debug!(path = %self.path.display(), "map written");
        }
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_lines_and_eof() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("maps/passwd");
        let mut w = MapWriter::new(&path, Some(10.0));
        w.write_line("a:x:1:1::/:/bin/sh");
        w.write_line("b:x:2:2::/:/bin/sh\n");
        assert_eq!(w.lines(), 2);
        let status = w.finish(true).unwrap();

        assert!(matches!(status, WriteStatus::Written { .. }));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "a:x:1:1::/:/bin/sh\nb:x:2:2::/:/bin/sh\nE_O_F\n"
        );
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_identical_content_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("group");
        fs::write(&path, "g:*:1:a\n").unwrap();
        let mut w = MapWriter::new(&path, Some(5.0));
        w.write_line("g:*:1:a");
        assert!(matches!(w.finish(false).unwrap(), WriteStatus::Unchanged { .. }));
    }

    #[test]
    fn test_size_swing_keeps_old_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("group");
        let old = "g:*:1:alice,bob,carol,dave,erin,frank\n";
        fs::write(&path, old).unwrap();

        let mut w = MapWriter::new(&path, Some(5.0));
        w.write_line("g:*:1:");
        let err = w.finish(false).unwrap_err();
        assert!(matches!(err, WriteError::SizeChange { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), old);
        // no temp file left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_size_check_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("group");
        fs::write(&path, "g:*:1:alice,bob,carol,dave,erin,frank\n").unwrap();
        let mut w = MapWriter::new(&path, None);
        w.write_line("g:*:1:");
        assert!(matches!(w.finish(false).unwrap(), WriteStatus::Written { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "g:*:1:\n");
    }

    #[test]
    fn test_empty_old_file_accepts_anything() {
        assert!(check_similar_size(Path::new("x"), 0, 5000, 5.0).is_ok());
        assert!(check_similar_size(Path::new("x"), 100, 104, 5.0).is_ok());
        assert!(check_similar_size(Path::new("x"), 100, 94, 5.0).is_err());
    }

    #[test]
    fn test_prepare_leaves_destination_until_commit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("passwd");
        fs::write(&path, "a:x:1:1::/:/bin/sh\n").unwrap();

        let mut w = MapWriter::new(&path, Some(10.0));
        w.write_line("b:x:2:2::/:/bin/sh");
        let prepared = w.prepare(false).unwrap();
        assert!(matches!(prepared.status(), WriteStatus::Written { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a:x:1:1::/:/bin/sh\n");

        prepared.commit().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "b:x:2:2::/:/bin/sh\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_dropped_preparation_cleans_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("group");
        let mut w = MapWriter::new(&path, None);
        w.write_line("g:*:1:a");
        drop(w.prepare(true).unwrap());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
