//! Atomic credential installation

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::AgentError;

const KEY_MODE: u32 = 0o600;
const CERT_MODE: u32 = 0o644;

/// Replace the certificate and key files with a new pair
///
/// Both files are staged next to their targets and renamed into place. If
/// the certificate cannot be installed after the key was, the previous key
/// is put back, so the pair on disk always matches.
///
/// # Errors
/// Returns `AgentError::Storage` if either file cannot be written.
pub async fn install_credential(
    cert_path: &Path,
    key_path: &Path,
    cert_pem: &str,
    key_pem: &str,
) -> Result<(), AgentError> {
    let cert_path = cert_path.to_path_buf();
    let key_path = key_path.to_path_buf();
    let cert_pem = cert_pem.to_string();
    let key_pem = key_pem.to_string();

    tokio::task::spawn_blocking(move || install_blocking(&cert_path, &key_path, &cert_pem, &key_pem))
        .await
        .map_err(|e| AgentError::Storage(format!("credential write task failed: {e}")))?
}

fn install_blocking(
    cert_path: &Path,
    key_path: &Path,
    cert_pem: &str,
    key_pem: &str,
) -> Result<(), AgentError> {
    reject_symlink(cert_path)?;
    reject_symlink(key_path)?;

    let key_tmp = stage(key_path, key_pem, KEY_MODE)?;
    let cert_tmp = match stage(cert_path, cert_pem, CERT_MODE) {
        Ok(tmp) => tmp,
        Err(e) => {
            let _ = fs::remove_file(&key_tmp);
            return Err(e);
        }
    };

    let previous_key = fs::read(key_path).ok();

    if let Err(e) = fs::rename(&key_tmp, key_path) {
        let _ = fs::remove_file(&key_tmp);
        let _ = fs::remove_file(&cert_tmp);
        return Err(AgentError::Storage(format!(
            "failed to install {}: {e}",
            key_path.display()
        )));
    }

    if let Err(e) = fs::rename(&cert_tmp, cert_path) {
        let _ = fs::remove_file(&cert_tmp);
        restore_key(key_path, previous_key.as_deref());
        return Err(AgentError::Storage(format!(
            "failed to install {}: {e}",
            cert_path.display()
        )));
    }

    sync_parent(key_path);
    sync_parent(cert_path);
    debug!(cert = %cert_path.display(), key = %key_path.display(), "credential installed");
    Ok(())
}

/// Write `content` to a fresh sibling of `path` and flush it to disk
fn stage(path: &Path, content: &str, mode: u32) -> Result<PathBuf, AgentError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| AgentError::Storage(format!("invalid file name: {}", path.display())))?;

    fs::create_dir_all(parent).map_err(|e| {
        AgentError::Storage(format!("failed to create {}: {e}", parent.display()))
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let tmp = parent.join(format!(".{file_name}.{}.{nonce}.tmp", std::process::id()));

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options
        .open(&tmp)
        .map_err(|e| AgentError::Storage(format!("failed to create {}: {e}", tmp.display())))?;

    let written = file
        .write_all(content.as_bytes())
        .and_then(|()| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(AgentError::Storage(format!(
            "failed to write {}: {e}",
            tmp.display()
        )));
    }

    Ok(tmp)
}

fn restore_key(key_path: &Path, previous: Option<&[u8]>) {
    let restored = match previous {
        Some(old) => String::from_utf8(old.to_vec())
            .map_err(|e| AgentError::Storage(e.to_string()))
            .and_then(|old| stage(key_path, &old, KEY_MODE))
            .and_then(|tmp| {
                fs::rename(&tmp, key_path).map_err(|e| {
                    let _ = fs::remove_file(&tmp);
                    AgentError::Storage(e.to_string())
                })
            }),
        None => fs::remove_file(key_path).map_err(|e| AgentError::Storage(e.to_string())),
    };

    if let Err(e) = restored {
        warn!(key = %key_path.display(), error = %e, "failed to roll back private key");
    }
}

fn reject_symlink(path: &Path) -> Result<(), AgentError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Err(AgentError::Storage(format!(
            "refusing to replace symlink {}",
            path.display()
        ))),
        _ => Ok(()),
    }
}

fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = OpenOptions::new().read(true).open(parent) {
            let _ = dir.sync_all();
        }
    }
}
