//! Deploy directory scanning.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::content_type;
use crate::error::{io_err, SyncError};

/// One file in the deploy directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Object key: the path relative to the deploy root, `/`-separated.
    pub key: String,
    pub path: PathBuf,
    pub size: u64,
    /// SHA-256 of the file contents, lowercase hex.
    pub sha256: String,
    pub content_type: &'static str,
}

/// Walk `root` recursively and hash every file. Results are sorted by key.
///
/// Symlinks are followed; directories themselves produce no entries.
pub fn scan(root: &Path) -> Result<Vec<LocalFile>, SyncError> {
    let mut files = Vec::new();
    walk(root, root, &mut files)?;
    files.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(files)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<LocalFile>) -> Result<(), SyncError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out)?;
            continue;
        }

        let contents = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
        out.push(LocalFile {
            key: object_key(root, &path),
            size: contents.len() as u64,
            sha256: sha256_hex(&contents),
            content_type: content_type::infer(&path),
            path,
        });
    }
    Ok(())
}

/// `root/a/b.html` → `a/b.html`, regardless of the platform separator.
pub fn object_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}
