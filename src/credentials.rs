//! API key materialization
//!
//! `notarytool` only accepts the App Store Connect key as a file path, so the
//! raw key material is written into the run's workspace before anything else
//! happens.

use crate::config::ApiCredentials;
use crate::error::{NotarizeError, Result};
use jsonwebtoken::EncodingKey;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// A key file on disk. It lives as long as the workspace that contains it.
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write the API key verbatim to `AuthKey_<key id>.p8` inside `dir`.
///
/// Existing content is overwritten. On unix the file is owner-only (0600).
/// Any write failure is a configuration error.
pub async fn materialize(dir: &Path, credentials: &ApiCredentials) -> Result<CredentialFile> {
    let path = dir.join(key_file_name(&credentials.api_key_id));

    write_key(&path, &credentials.api_key).await.map_err(|e| {
        NotarizeError::Configuration(format!(
            "Failed to write API key to {}: {e}",
            path.display()
        ))
    })?;

    Ok(CredentialFile { path })
}

async fn write_key(path: &Path, key: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(key).await?;
    file.flush().await?;
    Ok(())
}

/// File name `notarytool` users conventionally give API keys.
fn key_file_name(key_id: &str) -> String {
    let sanitized: String = key_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("AuthKey_{sanitized}.p8")
}

/// Findings from a best-effort look at the key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMaterial {
    /// PEM-encoded EC key, what App Store Connect issues
    Ec,
    /// PEM-encoded RSA key, accepted but unusual
    Rsa,
    /// Neither; passed through untouched and left for notarytool to judge
    Unrecognized,
}

/// Classify the key without rejecting anything.
#[must_use]
pub fn inspect_key_material(key: &[u8]) -> KeyMaterial {
    if EncodingKey::from_ec_pem(key).is_ok() {
        KeyMaterial::Ec
    } else if EncodingKey::from_rsa_pem(key).is_ok() {
        KeyMaterial::Rsa
    } else {
        KeyMaterial::Unrecognized
    }
}
