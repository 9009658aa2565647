//! Packaging a product into a single zip with `ditto`

use crate::error::{NotarizeError, Result};
use crate::reporter::Reporter;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;

/// Arguments for `ditto`: create a PKZip archive that embeds the parent
/// directory name of the source.
#[must_use]
pub fn ditto_args(product_path: &Path, archive_path: &Path) -> Vec<std::ffi::OsString> {
    vec![
        "-c".into(),
        "-k".into(),
        "--keepParent".into(),
        product_path.as_os_str().to_owned(),
        archive_path.as_os_str().to_owned(),
    ]
}

/// Archive `product_path` into `archive_path`.
///
/// A spawn failure or a non-zero exit is logged through `reporter` and
/// returned as [`NotarizeError::Packaging`].
pub async fn create_archive(
    ditto: &Path,
    product_path: &Path,
    archive_path: &Path,
    reporter: &dyn Reporter,
) -> Result<PathBuf> {
    let output = tokio::process::Command::new(ditto)
        .args(ditto_args(product_path, archive_path))
        .stdin(Stdio::null())
        .output()
        .await;

    let failure = match output {
        Ok(output) if output.status.success() => return Ok(archive_path.to_path_buf()),
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            format!(
                "{} exited with {}: {}",
                ditto.display(),
                output.status,
                stderr.trim()
            )
        }
        Err(e) => format!("Failed to run {}: {e}", ditto.display()),
    };

    reporter.error(&failure);
    Err(NotarizeError::Packaging(failure))
}

/// Hex SHA-256 of a file, read in 8KB chunks.
pub async fn file_digest(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
