//! JSON documents replaced whole on every write.
//!
//! A write goes to `.<name>.tmp` next to the target, is fsynced and renamed
//! over it, so a reader sees either the old or the new document. Writers
//! share that temp path and therefore serialize on `<name>.lock`, which is
//! left in place between writes.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use pegboard_core::error::PegboardError;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtomicJsonError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cannot lock {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<AtomicJsonError> for PegboardError {
    fn from(e: AtomicJsonError) -> Self {
        match e {
            AtomicJsonError::Io(io) => io.into(),
            AtomicJsonError::Json(json) => json.into(),
            lock @ AtomicJsonError::Lock { .. } => PegboardError::io(lock.to_string()),
        }
    }
}

/// A typed JSON document at a fixed path.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _doc: PhantomData<T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` for a missing or blank file; unparsable content is an error.
    pub fn load(&self) -> Result<Option<T>, AtomicJsonError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, data: &T) -> Result<(), AtomicJsonError> {
        let json = serde_json::to_string_pretty(data)?;
        let (dir, tmp_path) = self.sibling_paths()?;
        fs::create_dir_all(dir)?;

        let _lock = lock_for_write(self.path.with_extension("lock"))?;
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(json.as_bytes())?;
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn sibling_paths(&self) -> Result<(&Path, PathBuf), AtomicJsonError> {
        let (Some(dir), Some(name)) = (self.path.parent(), self.path.file_name()) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Not a file path: {}", self.path.display()),
            )
            .into());
        };
        let tmp = dir.join(format!(".{}.tmp", name.to_string_lossy()));
        Ok((dir, tmp))
    }
}

/// Exclusive lock released when the returned handle is dropped.
fn lock_for_write(path: PathBuf) -> Result<File, AtomicJsonError> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;
    match file.lock_exclusive() {
        Ok(()) => Ok(file),
        Err(source) => Err(AtomicJsonError::Lock { path, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Layout {
        panes: Vec<String>,
    }

    fn layout(n: usize) -> Layout {
        Layout {
            panes: (0..n).map(|i| format!("pane-{i}")).collect(),
        }
    }

    #[test]
    fn test_missing_and_blank_files_load_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("layout.json");
        let file = AtomicJsonFile::<Layout>::new(path.clone());
        assert!(file.load().unwrap().is_none());

        fs::write(&path, "  \n").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_save_creates_directory_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested");
        let file = AtomicJsonFile::<Layout>::new(dir.join("layout.json"));

        file.save(&layout(2)).unwrap();

        assert_eq!(file.load().unwrap(), Some(layout(2)));
        assert!(!dir.join(".layout.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_a_serialization_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("layout.json");
        fs::write(&path, "{ not json").unwrap();
        let err = AtomicJsonFile::<Layout>::new(path).load().unwrap_err();
        let converted: PegboardError = err.into();
        assert!(converted.is_serialization());
    }

    #[test]
    fn test_concurrent_writers_leave_a_whole_document() {
        let temp_dir = TempDir::new().unwrap();
        let file = Arc::new(AtomicJsonFile::<Layout>::new(
            temp_dir.path().join("layout.json"),
        ));

        let writers: Vec<_> = (1..=4)
            .map(|n| {
                let file = Arc::clone(&file);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        file.save(&layout(n)).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let loaded = file.load().unwrap().unwrap();
        assert!((1..=4).contains(&loaded.panes.len()));
    }
}
