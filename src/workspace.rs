//! Run-scoped scratch directory for the credential file and the archive

use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Uniquely named temporary directory owned by one pipeline run.
///
/// Dropping it removes the directory silently, which covers cancellation.
/// [`Workspace::cleanup`] is the normal exit path and warns when removal fails.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("notarize-").tempdir()?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Archive destination for a product: `<stem>.zip`, or `archive.zip`.
    #[must_use]
    pub fn archive_path(&self, product_path: &Path) -> PathBuf {
        let name = product_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map_or_else(|| "archive.zip".to_string(), |stem| format!("{stem}.zip"));
        self.dir.path().join(name)
    }

    /// Remove the directory and everything in it.
    pub async fn cleanup(self) {
        let path = self.dir.keep();
        cleanup_path(&path, "notarization workspace").await;
    }
}

/// Attempt to remove a file or directory, logging warnings on failure.
///
/// Cleanup is best-effort: it never returns an error, and a path that is
/// already gone counts as cleaned up.
pub async fn cleanup_path<P: AsRef<Path>>(path: P, description: &str) {
    let path = path.as_ref();

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return;
    }

    let is_dir = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let result = if is_dir {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    if let Err(e) = result {
        // NotFound is OK - someone removed it first
        if e.kind() != std::io::ErrorKind::NotFound {
            let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
            let mut buffer = bufwtr.buffer();

            let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
            let _ = writeln!(&mut buffer, "⚠️  Warning: Failed to cleanup {description}");
            let _ = buffer.reset();
            let _ = writeln!(&mut buffer, "   Path: {}", path.display());
            let _ = writeln!(&mut buffer, "   Error: {e}");
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                let _ = writeln!(
                    &mut buffer,
                    "   The directory may contain an API key. Remove it manually: rm -rf {}",
                    path.display()
                );
            }
            let _ = bufwtr.print(&buffer);
        }
    }
}
