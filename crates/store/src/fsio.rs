// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path-safe filesystem primitives.
//!
//! Every write the crate performs goes through these helpers: owner-only
//! modes, atomic temp+rename replacement, append in a single open, and a
//! traversal check that resolves symlinks before comparing against the
//! declared base directory.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Mode for every file the core creates.
pub const FILE_MODE: u32 = 0o600;

/// Mode for every directory the core creates.
pub const DIR_MODE: u32 = 0o700;

/// Errors from the filesystem primitives.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("path traversal: {candidate} escapes {base}")]
    PathTraversal { candidate: PathBuf, base: PathBuf },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FsError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        FsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Normalize `.` and `..` components lexically, without touching the
/// filesystem. Used as the fallback when neither a path nor its parent
/// exists yet.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve a path through symlinks where it exists; otherwise resolve the
/// nearest existing ancestor and re-append the not-yet-created remainder.
fn resolve_best_effort(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    let normalized = normalize_lexically(path);
    for ancestor in normalized.ancestors().skip(1) {
        if let Ok(resolved) = ancestor.canonicalize() {
            if let Ok(rest) = normalized.strip_prefix(ancestor) {
                return resolved.join(rest);
            }
        }
    }
    normalized
}

/// Check that `candidate` resolves to a location under `base`.
///
/// Both sides are resolved through symlinks where they exist, so neither a
/// `..` component nor a symlink pointing outside the base can slip a write
/// past the check. Returns the resolved candidate.
pub fn validate_resolved_path(candidate: &Path, base: &Path) -> Result<PathBuf, FsError> {
    let resolved_base = resolve_best_effort(base);
    let resolved = resolve_best_effort(candidate);

    match resolved.strip_prefix(&resolved_base) {
        Ok(rel) if !rel.starts_with("..") => Ok(resolved),
        _ => Err(FsError::PathTraversal {
            candidate: candidate.to_path_buf(),
            base: base.to_path_buf(),
        }),
    }
}

/// Create a directory (and its ancestors) with the given mode.
pub fn ensure_dir_with_mode(dir: &Path, mode: u32) -> Result<(), FsError> {
    DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(dir)
        .map_err(|e| FsError::io(dir, e))
}

fn ensure_parent(path: &Path) -> Result<(), FsError> {
    if let Some(parent) = path.parent() {
        ensure_dir_with_mode(parent, DIR_MODE)?;
    }
    Ok(())
}

/// Write a file with the given mode, truncating any prior content.
///
/// Validates the destination against `base` first.
pub fn write_file_with_mode(
    path: &Path,
    base: &Path,
    bytes: &[u8],
    mode: u32,
) -> Result<(), FsError> {
    validate_resolved_path(path, base)?;
    ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .map_err(|e| FsError::io(path, e))?;
    file.write_all(bytes).map_err(|e| FsError::io(path, e))
}

/// Append to a file, creating it with the given mode if needed.
///
/// Create-or-append happens in one `open` (`O_WRONLY|O_APPEND|O_CREAT`),
/// so there is no window between an existence check and the write.
pub fn append_file_with_mode(
    path: &Path,
    base: &Path,
    bytes: &[u8],
    mode: u32,
) -> Result<(), FsError> {
    validate_resolved_path(path, base)?;
    ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .mode(mode)
        .open(path)
        .map_err(|e| FsError::io(path, e))?;
    file.write_all(bytes).map_err(|e| FsError::io(path, e))
}

/// Temp-file name for an atomic replace: `<path>.tmp.<pid>.<millis>`.
fn temp_path_for(path: &Path) -> PathBuf {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".tmp.{}.{}", std::process::id(), millis));
    PathBuf::from(name)
}

/// Atomically replace `path` with `bytes` via temp file + rename.
pub fn atomic_write_bytes(
    path: &Path,
    base: &Path,
    bytes: &[u8],
    mode: u32,
) -> Result<(), FsError> {
    validate_resolved_path(path, base)?;
    ensure_parent(path)?;

    let tmp = temp_path_for(path);
    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(&tmp)
            .map_err(|e| FsError::io(&tmp, e))?;
        file.write_all(bytes).map_err(|e| FsError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| FsError::io(path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Atomically replace `path` with pretty-printed JSON.
pub fn atomic_write_json<T: Serialize>(
    path: &Path,
    base: &Path,
    value: &T,
    mode: u32,
) -> Result<(), FsError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| FsError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    bytes.push(b'\n');
    atomic_write_bytes(path, base, &bytes, mode)
}

/// Read and parse a JSON file.
///
/// `Ok(None)` when the file does not exist; a parse failure is an error;
/// callers that want malformed-tolerant reads use [`read_json_lenient`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, FsError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(FsError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| FsError::Json {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Read and parse a JSON file, treating malformed content as absent.
///
/// The parse failure is logged, not propagated.
pub fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, FsError> {
    match read_json(path) {
        Ok(value) => Ok(value),
        Err(FsError::Json { path, source }) => {
            tracing::warn!(path = %path.display(), error = %source, "ignoring malformed json");
            Ok(None)
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
#[path = "fsio_tests.rs"]
mod tests;
