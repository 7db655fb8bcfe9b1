//! Transfer gateway over a local directory
//!
//! Remote folders map under a root directory. Used for mounted shares and in
//! tests; behaves like the SFTP gateway, including folder creation on `put`.

use crate::error::{RemoteError, Result};
use crate::gateway::{sort_newest_first, RemoteEntry, TransferGateway};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Gateway rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalDirGateway {
    root: PathBuf,
}

impl LocalDirGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a remote folder under the root. `..` components are refused.
    fn folder_path(&self, operation: &'static str, folder: &str) -> Result<PathBuf> {
        let relative = Path::new(folder.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(RemoteError::operation(
                self.destination(),
                operation,
                folder,
                io::Error::new(io::ErrorKind::InvalidInput, "folder escapes the gateway root"),
            ));
        }
        Ok(self.root.join(relative))
    }

    fn file_path(&self, operation: &'static str, folder: &str, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name == ".." {
            return Err(RemoteError::operation(
                self.destination(),
                operation,
                name,
                io::Error::new(io::ErrorKind::InvalidInput, "invalid remote file name"),
            ));
        }
        Ok(self.folder_path(operation, folder)?.join(name))
    }

    fn op_err(&self, operation: &'static str, path: &Path, source: io::Error) -> RemoteError {
        RemoteError::operation(self.destination(), operation, path.to_string_lossy(), source)
    }
}

impl TransferGateway for LocalDirGateway {
    fn destination(&self) -> String {
        format!("file://{}", self.root.display())
    }

    fn put(&self, local: &Path, folder: &str, name: &str) -> Result<()> {
        if !local.is_file() {
            return Err(RemoteError::local(
                local,
                io::Error::new(io::ErrorKind::NotFound, "local file not found"),
            ));
        }
        self.create_folder(folder)?;
        let target = self.file_path("put", folder, name)?;
        fs::copy(local, &target).map_err(|e| self.op_err("put", &target, e))?;
        tracing::info!(destination = %self.destination(), path = %target.display(), "Uploaded");
        Ok(())
    }

    fn get(&self, folder: &str, name: &str, download_dir: &Path) -> Result<PathBuf> {
        let source = self.file_path("get", folder, name)?;
        if !source.is_file() {
            return Err(RemoteError::NotFound {
                destination: self.destination(),
                path: crate::gateway::remote_join(folder, name),
            });
        }
        fs::create_dir_all(download_dir).map_err(|e| RemoteError::local(download_dir, e))?;
        let target = download_dir.join(name);
        fs::copy(&source, &target).map_err(|e| self.op_err("get", &source, e))?;
        tracing::info!(destination = %self.destination(), path = %target.display(), "Downloaded");
        Ok(target)
    }

    fn exists(&self, folder: &str, name: &str) -> Result<bool> {
        Ok(self.file_path("exists", folder, name)?.exists())
    }

    fn delete(&self, folder: &str, name: &str) -> Result<bool> {
        let target = self.file_path("delete", folder, name)?;
        match fs::remove_file(&target) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(destination = %self.destination(), path = %target.display(), "Nothing to delete");
                Ok(false)
            }
            Err(e) => Err(self.op_err("delete", &target, e)),
        }
    }

    fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>> {
        let dir = self.folder_path("list", folder)?;
        let read = fs::read_dir(&dir).map_err(|e| self.op_err("list", &dir, e))?;

        let mut entries = Vec::new();
        for item in read {
            let item = item.map_err(|e| self.op_err("list", &dir, e))?;
            let metadata = item.metadata().map_err(|e| self.op_err("list", &item.path(), e))?;
            entries.push(entry_from_metadata(
                item.file_name().to_string_lossy().into_owned(),
                &metadata,
            ));
        }
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    fn create_folder(&self, folder: &str) -> Result<bool> {
        let dir = self.folder_path("create_folder", folder)?;
        if dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&dir).map_err(|e| self.op_err("create_folder", &dir, e))?;
        Ok(true)
    }
}

fn epoch_secs(time: io::Result<SystemTime>) -> Option<u64> {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}

#[cfg(unix)]
fn entry_from_metadata(name: String, metadata: &fs::Metadata) -> RemoteEntry {
    use std::os::unix::fs::MetadataExt;
    RemoteEntry {
        name,
        is_dir: metadata.is_dir(),
        size: Some(metadata.len()),
        uid: Some(metadata.uid()),
        gid: Some(metadata.gid()),
        mode: Some(metadata.mode()),
        atime: epoch_secs(metadata.accessed()),
        mtime: epoch_secs(metadata.modified()),
    }
}

#[cfg(not(unix))]
fn entry_from_metadata(name: String, metadata: &fs::Metadata) -> RemoteEntry {
    RemoteEntry {
        name,
        is_dir: metadata.is_dir(),
        size: Some(metadata.len()),
        uid: None,
        gid: None,
        mode: None,
        atime: epoch_secs(metadata.accessed()),
        mtime: epoch_secs(metadata.modified()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_creates_folder_and_get_downloads() {
        let tmp = TempDir::new().unwrap();
        let gateway = LocalDirGateway::new(tmp.path().join("remote"));
        let local = tmp.path().join("inventory.json");
        fs::write(&local, "[]").unwrap();

        gateway.put(&local, "/incoming/site-a", "inventory.json").unwrap();
        assert!(gateway.exists("/incoming/site-a", "inventory.json").unwrap());

        let downloaded = gateway
            .get("/incoming/site-a", "inventory.json", &tmp.path().join("dl"))
            .unwrap();
        assert_eq!(downloaded, tmp.path().join("dl/inventory.json"));
        assert_eq!(fs::read_to_string(downloaded).unwrap(), "[]");
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let gateway = LocalDirGateway::new(tmp.path());
        let err = gateway.get("/x", "nope.json", tmp.path()).unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[test]
    fn test_delete_absent_is_false() {
        let tmp = TempDir::new().unwrap();
        let gateway = LocalDirGateway::new(tmp.path());
        fs::write(tmp.path().join("f.txt"), "x").unwrap();

        assert!(gateway.delete("/", "f.txt").unwrap());
        assert!(!gateway.delete("/", "f.txt").unwrap());
    }

    #[test]
    fn test_create_folder_reports_creation() {
        let tmp = TempDir::new().unwrap();
        let gateway = LocalDirGateway::new(tmp.path());
        assert!(gateway.create_folder("a/b/c").unwrap());
        assert!(!gateway.create_folder("a/b/c").unwrap());
    }

    #[test]
    fn test_list_attributes() {
        let tmp = TempDir::new().unwrap();
        let gateway = LocalDirGateway::new(tmp.path());
        fs::write(tmp.path().join("one.txt"), "12345").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();

        let entries = gateway.list("/").unwrap();
        assert_eq!(entries.len(), 2);
        let file = entries.iter().find(|e| e.name == "one.txt").unwrap();
        assert_eq!(file.size, Some(5));
        assert!(!file.is_dir);
        assert!(file.mtime.is_some());
        assert!(entries.iter().any(|e| e.name == "sub" && e.is_dir));
    }

    #[test]
    fn test_refuses_escaping_folder() {
        let tmp = TempDir::new().unwrap();
        let gateway = LocalDirGateway::new(tmp.path().join("root"));
        let err = gateway.create_folder("../outside").unwrap_err();
        assert!(matches!(err, RemoteError::Operation { operation: "create_folder", .. }));
    }
}
