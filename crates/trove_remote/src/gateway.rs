//! Transfer gateway abstraction
//!
//! A remote blob store addressed by `(folder, name)`. Folders use `/`
//! separators whatever the local platform.

use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One entry of a remote folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: Option<u64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// Permission bits as reported by the server
    pub mode: Option<u32>,
    /// Seconds since the Unix epoch
    pub atime: Option<u64>,
    /// Seconds since the Unix epoch
    pub mtime: Option<u64>,
}

/// Put/get/list/delete/exists over a remote store
pub trait TransferGateway {
    /// Human-readable label used in logs and errors, e.g. `sftp://host:22`.
    fn destination(&self) -> String;

    /// Upload `local` as `folder/name`, creating `folder` if absent.
    fn put(&self, local: &Path, folder: &str, name: &str) -> Result<()>;

    /// Download `folder/name` into `download_dir` and return the local path.
    fn get(&self, folder: &str, name: &str, download_dir: &Path) -> Result<PathBuf>;

    fn exists(&self, folder: &str, name: &str) -> Result<bool>;

    /// Remove `folder/name`. An absent file is `Ok(false)` and logged as a warning.
    fn delete(&self, folder: &str, name: &str) -> Result<bool>;

    /// Entries of `folder`, newest modification first.
    fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>>;

    /// Create `folder` and any missing parents. Returns false if it already existed.
    fn create_folder(&self, folder: &str) -> Result<bool>;
}

impl<G: TransferGateway + ?Sized> TransferGateway for Box<G> {
    fn destination(&self) -> String {
        (**self).destination()
    }
    fn put(&self, local: &Path, folder: &str, name: &str) -> Result<()> {
        (**self).put(local, folder, name)
    }
    fn get(&self, folder: &str, name: &str, download_dir: &Path) -> Result<PathBuf> {
        (**self).get(folder, name, download_dir)
    }
    fn exists(&self, folder: &str, name: &str) -> Result<bool> {
        (**self).exists(folder, name)
    }
    fn delete(&self, folder: &str, name: &str) -> Result<bool> {
        (**self).delete(folder, name)
    }
    fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>> {
        (**self).list(folder)
    }
    fn create_folder(&self, folder: &str) -> Result<bool> {
        (**self).create_folder(folder)
    }
}

/// Join a remote folder and a name with exactly one `/`.
pub fn remote_join(folder: &str, name: &str) -> String {
    let trimmed = folder.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if trimmed.is_empty() {
        if folder.starts_with('/') {
            return format!("/{}", name);
        }
        return name.to_string();
    }
    format!("{}/{}", trimmed, name)
}

/// Order a listing newest first, ties by name.
pub(crate) fn sort_newest_first(entries: &mut [RemoteEntry]) {
    entries.sort_by(|a, b| b.mtime.cmp(&a.mtime).then_with(|| a.name.cmp(&b.name)));
}
