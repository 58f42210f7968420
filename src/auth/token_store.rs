use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::auth::credentials::TokenData;
use crate::error::{IrDataError, Result};

/// Read a previously persisted token pair.
pub async fn load(path: &Path) -> Result<TokenData> {
    let data = fs::read(path).await?;
    serde_json::from_slice(&data).map_err(|e| {
        IrDataError::Persistence(format!("corrupt auth file {}: {}", path.display(), e))
    })
}

/// Persist the token pair: write a private sibling temp file, then rename it over `path`.
pub async fn save(path: &Path, token: &TokenData) -> Result<()> {
    debug!(auth_file = %path.display(), "saving auth info to file");
    let data = serde_json::to_vec(token)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    let written = async {
        let mut file = private_file(&tmp).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        fs::rename(&tmp, path).await
    }
    .await;
    if written.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    Ok(written?)
}

// hidden, unique per process and call, so an existing user file is never reused
fn temp_path(path: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "auth".to_owned());
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

#[cfg(unix)]
async fn private_file(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .await
}

#[cfg(not(unix))]
async fn private_file(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path).await
}
