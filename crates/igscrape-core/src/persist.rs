//! Crash-safe JSON file writes.
//!
//! A write is split into two steps: [`stage_json`] serializes the value into
//! a temporary file next to the target and fsyncs it, and
//! [`StagedFile::commit`] renames it over the target. Until `commit`
//! returns, readers of the target see the previous complete file (or no
//! file). A staged file dropped without committing is removed.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A fully written temporary file waiting to replace its target.
#[derive(Debug)]
pub struct StagedFile {
    temp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Path of the temporary file.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically replaces the target with the staged content.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Io`] if the rename fails; the target is left
    /// untouched in that case.
    pub fn commit(mut self) -> Result<(), PersistError> {
        fs::rename(&self.temp_path, &self.target)
            .map_err(|e| PersistError::io(&self.target, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// Serializes `value` as pretty JSON into a temporary file in the target's
/// directory, creating the directory if needed.
///
/// # Errors
///
/// Returns [`PersistError`] if the directory cannot be created, the value
/// cannot be serialized, or the file cannot be written and synced.
pub fn stage_json<T>(target: &Path, value: &T) -> Result<StagedFile, PersistError>
where
    T: Serialize + ?Sized,
{
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| PersistError::io(&dir, e))?;

    let file_name = target
        .file_name()
        .map_or_else(|| "output".into(), |n| n.to_string_lossy().into_owned());
    let temp_path = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    // Constructed before the first write so a failure below cleans up.
    let staged = StagedFile {
        temp_path,
        target: target.to_path_buf(),
        committed: false,
    };

    let file = File::create(&staged.temp_path).map_err(|e| PersistError::io(&staged.temp_path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| PersistError::Json {
        path: staged.temp_path.clone(),
        source: e,
    })?;
    writer
        .write_all(b"\n")
        .map_err(|e| PersistError::io(&staged.temp_path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| PersistError::io(&staged.temp_path, e.into_error()))?;
    file.sync_all()
        .map_err(|e| PersistError::io(&staged.temp_path, e))?;

    Ok(staged)
}

/// Writes `value` to `target` atomically (stage, fsync, rename).
///
/// # Errors
///
/// See [`stage_json`] and [`StagedFile::commit`].
pub fn write_json_atomic<T>(target: &Path, value: &T) -> Result<(), PersistError>
where
    T: Serialize + ?Sized,
{
    stage_json(target, value)?.commit()
}

/// Reads and parses a JSON file. Returns `Ok(None)` if it does not exist.
///
/// # Errors
///
/// Returns [`PersistError`] if the file exists but cannot be read or parsed.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| PersistError::Json {
            path: path.to_path_buf(),
            source: e,
        })
}
