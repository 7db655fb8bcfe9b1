//! SFTP transfer gateway (libssh2 via `ssh2`)
//!
//! Authentication uses the private key when its file exists, otherwise the
//! password. One session is opened per gateway and reused for every call.

use crate::error::{RemoteError, Result};
use crate::gateway::{remote_join, sort_newest_first, RemoteEntry, TransferGateway};
use serde::Deserialize;
use ssh2::{ErrorCode, Session, Sftp};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `LIBSSH2_FX_NO_SUCH_FILE`
const FX_NO_SUCH_FILE: i32 = 2;
/// `LIBSSH2_FX_NO_SUCH_PATH`
const FX_NO_SUCH_PATH: i32 = 10;

fn default_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    30
}

/// Connection settings for an SFTP server
#[derive(Clone, Deserialize)]
pub struct SftpSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Used when the file exists; takes precedence over the password
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    #[serde(default)]
    pub private_key_passphrase: Option<String>,
    /// Connect and per-operation timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SftpSettings {
    pub fn destination(&self) -> String {
        format!("sftp://{}@{}:{}", self.username, self.host, self.port)
    }
}

impl fmt::Debug for SftpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Which credential a connection will use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    PrivateKey,
    Password,
}

/// Private key if its file exists, else password if one is set.
pub fn choose_auth(settings: &SftpSettings) -> Option<AuthMethod> {
    match &settings.private_key {
        Some(key) if key.is_file() => Some(AuthMethod::PrivateKey),
        _ if settings.password.is_some() => Some(AuthMethod::Password),
        _ => None,
    }
}

/// Transfer gateway over one SFTP session
pub struct SftpGateway {
    session: Session,
    sftp: Sftp,
    destination: String,
}

impl SftpGateway {
    /// Connect, handshake, authenticate and open the SFTP subsystem.
    pub fn connect(settings: &SftpSettings) -> Result<Self> {
        let destination = settings.destination();
        let connect_err = |message: String| RemoteError::Connect {
            destination: destination.clone(),
            message,
        };
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));

        let addrs = (settings.host.as_str(), settings.port)
            .to_socket_addrs()
            .map_err(|e| connect_err(e.to_string()))?;
        let mut last_error = None;
        let mut tcp = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    tcp = Some(stream);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }
        let tcp = tcp.ok_or_else(|| {
            connect_err(
                last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "host resolved to no addresses".to_string()),
            )
        })?;

        let mut session = Session::new().map_err(|e| connect_err(e.to_string()))?;
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| connect_err(e.to_string()))?;

        authenticate(&session, settings, &destination)?;

        let sftp = session.sftp().map_err(|e| connect_err(e.to_string()))?;
        tracing::debug!(destination = %destination, "SFTP session open");

        Ok(Self {
            session,
            sftp,
            destination,
        })
    }

    fn op_err(&self, operation: &'static str, path: &str, err: ssh2::Error) -> RemoteError {
        RemoteError::operation(self.destination.clone(), operation, path, io::Error::from(err))
    }

    fn stat_exists(&self, operation: &'static str, path: &str) -> Result<bool> {
        match self.sftp.stat(Path::new(path)) {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(self.op_err(operation, path, e)),
        }
    }
}

impl Drop for SftpGateway {
    fn drop(&mut self) {
        let _ = self.session.disconnect(None, "closing", None);
    }
}

fn authenticate(session: &Session, settings: &SftpSettings, destination: &str) -> Result<()> {
    let auth_err = |message: String| RemoteError::Auth {
        destination: destination.to_string(),
        message,
    };

    match choose_auth(settings) {
        Some(AuthMethod::PrivateKey) => {
            let key = settings
                .private_key
                .as_deref()
                .ok_or_else(|| auth_err("private key path missing".to_string()))?;
            session
                .userauth_pubkey_file(
                    &settings.username,
                    None,
                    key,
                    settings.private_key_passphrase.as_deref(),
                )
                .map_err(|e| auth_err(e.to_string()))?;
        }
        Some(AuthMethod::Password) => {
            let password = settings.password.as_deref().unwrap_or_default();
            session
                .userauth_password(&settings.username, password)
                .map_err(|e| auth_err(e.to_string()))?;
        }
        None => {
            return Err(auth_err(
                "no password configured and no readable private key".to_string(),
            ))
        }
    }

    if !session.authenticated() {
        return Err(auth_err("server rejected credentials".to_string()));
    }
    Ok(())
}

fn is_not_found(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::SFTP(FX_NO_SUCH_FILE) | ErrorCode::SFTP(FX_NO_SUCH_PATH))
}

/// Every prefix of an absolute or relative remote folder, shortest first.
fn folder_prefixes(folder: &str) -> Vec<String> {
    let absolute = folder.starts_with('/');
    let mut current = String::new();
    let mut prefixes = Vec::new();
    for part in folder.split('/').filter(|p| !p.is_empty() && *p != ".") {
        if !current.is_empty() || absolute {
            current.push('/');
        }
        current.push_str(part);
        prefixes.push(current.clone());
    }
    prefixes
}

impl TransferGateway for SftpGateway {
    fn destination(&self) -> String {
        self.destination.clone()
    }

    fn put(&self, local: &Path, folder: &str, name: &str) -> Result<()> {
        let mut source = File::open(local).map_err(|e| RemoteError::local(local, e))?;
        self.create_folder(folder)?;

        let remote_path = remote_join(folder, name);
        let mut target = self
            .sftp
            .create(Path::new(&remote_path))
            .map_err(|e| self.op_err("put", &remote_path, e))?;
        let bytes = io::copy(&mut source, &mut target)
            .map_err(|e| RemoteError::operation(self.destination.clone(), "put", &remote_path, e))?;

        tracing::info!(destination = %self.destination, path = %remote_path, bytes, "Uploaded");
        Ok(())
    }

    fn get(&self, folder: &str, name: &str, download_dir: &Path) -> Result<PathBuf> {
        let remote_path = remote_join(folder, name);
        let mut source = match self.sftp.open(Path::new(&remote_path)) {
            Ok(file) => file,
            Err(e) if is_not_found(&e) => {
                return Err(RemoteError::NotFound {
                    destination: self.destination.clone(),
                    path: remote_path,
                })
            }
            Err(e) => return Err(self.op_err("get", &remote_path, e)),
        };

        fs::create_dir_all(download_dir).map_err(|e| RemoteError::local(download_dir, e))?;
        let local_path = download_dir.join(name);
        let mut target = File::create(&local_path).map_err(|e| RemoteError::local(&local_path, e))?;
        let bytes = io::copy(&mut source, &mut target)
            .map_err(|e| RemoteError::operation(self.destination.clone(), "get", &remote_path, e))?;

        tracing::info!(destination = %self.destination, path = %remote_path, local = %local_path.display(), bytes, "Downloaded");
        Ok(local_path)
    }

    fn exists(&self, folder: &str, name: &str) -> Result<bool> {
        self.stat_exists("exists", &remote_join(folder, name))
    }

    fn delete(&self, folder: &str, name: &str) -> Result<bool> {
        let remote_path = remote_join(folder, name);
        match self.sftp.unlink(Path::new(&remote_path)) {
            Ok(()) => {
                tracing::info!(destination = %self.destination, path = %remote_path, "Deleted");
                Ok(true)
            }
            Err(e) if is_not_found(&e) => {
                tracing::warn!(destination = %self.destination, path = %remote_path, "Nothing to delete");
                Ok(false)
            }
            Err(e) => Err(self.op_err("delete", &remote_path, e)),
        }
    }

    fn list(&self, folder: &str) -> Result<Vec<RemoteEntry>> {
        let dir = if folder.is_empty() { "." } else { folder };
        let items = self
            .sftp
            .readdir(Path::new(dir))
            .map_err(|e| self.op_err("list", dir, e))?;

        let mut entries: Vec<RemoteEntry> = items
            .into_iter()
            .map(|(path, stat)| RemoteEntry {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                is_dir: stat.is_dir(),
                size: stat.size,
                uid: stat.uid,
                gid: stat.gid,
                mode: stat.perm,
                atime: stat.atime,
                mtime: stat.mtime,
            })
            .collect();
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    fn create_folder(&self, folder: &str) -> Result<bool> {
        let mut created = false;
        for prefix in folder_prefixes(folder) {
            if self.stat_exists("create_folder", &prefix)? {
                continue;
            }
            self.sftp
                .mkdir(Path::new(&prefix), 0o755)
                .map_err(|e| self.op_err("create_folder", &prefix, e))?;
            tracing::info!(destination = %self.destination, path = %prefix, "Created remote folder");
            created = true;
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn settings() -> SftpSettings {
        SftpSettings {
            host: "backup.example".to_string(),
            port: 2222,
            username: "trove".to_string(),
            password: Some("secret".to_string()),
            private_key: None,
            private_key_passphrase: None,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_folder_prefixes() {
        assert_eq!(folder_prefixes("/a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
        assert_eq!(folder_prefixes("a//b/"), vec!["a", "a/b"]);
        assert!(folder_prefixes("/").is_empty());
    }

    #[test]
    fn test_key_takes_precedence_when_present() {
        let key = NamedTempFile::new().unwrap();
        let mut s = settings();
        s.private_key = Some(key.path().to_path_buf());
        assert_eq!(choose_auth(&s), Some(AuthMethod::PrivateKey));
    }

    #[test]
    fn test_missing_key_falls_back_to_password() {
        let mut s = settings();
        s.private_key = Some(PathBuf::from("/definitely/not/here/id_rsa"));
        assert_eq!(choose_auth(&s), Some(AuthMethod::Password));

        s.password = None;
        assert_eq!(choose_auth(&s), None);
    }

    #[test]
    fn test_debug_redacts_password() {
        let text = format!("{:?}", settings());
        assert!(!text.contains("secret"));
        assert!(text.contains("<redacted>"));
        assert_eq!(settings().destination(), "sftp://trove@backup.example:2222");
    }
}
