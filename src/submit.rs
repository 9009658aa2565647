//! Submission to Apple's notary service via `xcrun notarytool`
//!
//! `notarytool submit --wait` blocks until the service returns a verdict or
//! its own `--timeout` elapses. The exit code is the verdict. A caller-side
//! deadline wraps the whole call so a hung tool cannot stall the run forever.

use crate::error::{NotarizeError, Result};
use crate::reporter::Reporter;
use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;

/// Value passed to `notarytool --timeout`
pub const NOTARYTOOL_TIMEOUT: &str = "15m";

/// Caller-side deadline: notarytool's own timeout plus a minute of grace.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(16 * 60);

/// Everything one submission needs.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionRequest<'a> {
    pub product_path: &'a Path,
    pub archive_path: &'a Path,
    pub key_path: &'a Path,
    pub api_key_id: &'a str,
    pub api_issuer: &'a str,
    pub verbose: bool,
}

impl SubmissionRequest<'_> {
    /// Arguments passed to `xcrun`.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "notarytool".into(),
            "submit".into(),
            "--key".into(),
            self.key_path.as_os_str().to_owned(),
            "--key-id".into(),
            self.api_key_id.into(),
            "--issuer".into(),
            self.api_issuer.into(),
            "--wait".into(),
            "--timeout".into(),
            NOTARYTOOL_TIMEOUT.into(),
        ];
        if self.verbose {
            args.push("--verbose".into());
        }
        args.push(self.archive_path.as_os_str().to_owned());
        args
    }
}

/// Verdict derived from a finished notarytool process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted { stdout: String },
    Rejected { exit_code: Option<i32>, output: String },
}

impl SubmissionOutcome {
    /// Exit 0 is acceptance; anything else is rejection with `"{stdout}\n{stderr}"`.
    #[must_use]
    pub fn classify(exit_code: Option<i32>, stdout: &[u8], stderr: &[u8]) -> Self {
        let stdout = decode_stream(stdout);
        if exit_code == Some(0) {
            return Self::Accepted { stdout };
        }
        let stderr = decode_stream(stderr);
        Self::Rejected {
            exit_code,
            output: format!("{stdout}\n{stderr}"),
        }
    }
}

/// Lossy UTF-8 with one trailing line break removed.
fn decode_stream(bytes: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

/// Submit an archive and wait for the verdict.
///
/// # Returns
/// * `Ok(stdout)` - notarytool exited 0; stdout was reported via `info`
/// * `Err(NotarizeError::Precondition)` - the product is gone
/// * `Err(NotarizeError::Submission)` - non-zero exit; the combined output was
///   reported via `error` and is also the error message
/// * `Err(NotarizeError::Timeout)` - `deadline` elapsed; the child was killed
pub async fn submit(
    xcrun: &Path,
    request: &SubmissionRequest<'_>,
    deadline: Duration,
    reporter: &dyn Reporter,
) -> Result<String> {
    if !tokio::fs::try_exists(request.product_path).await.unwrap_or(false) {
        return Err(NotarizeError::Precondition(format!(
            "No product could be found at {}",
            request.product_path.display()
        )));
    }

    let mut child = tokio::process::Command::new(xcrun)
        .args(request.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            NotarizeError::CommandExecution(format!(
                "{} notarytool failed to start: {e}",
                xcrun.display()
            ))
        })?;

    let waited = tokio::time::timeout(deadline, wait_and_capture(&mut child, request.verbose)).await;

    let (status, stdout, stderr) = match waited {
        Ok(result) => result?,
        Err(_elapsed) => {
            let _ = child.kill().await;
            return Err(NotarizeError::Timeout(deadline));
        }
    };

    match SubmissionOutcome::classify(status.code(), &stdout, &stderr) {
        SubmissionOutcome::Accepted { stdout } => {
            reporter.info(&stdout);
            Ok(stdout)
        }
        SubmissionOutcome::Rejected { exit_code, output } => {
            reporter.error(&output);
            Err(NotarizeError::Submission { exit_code, output })
        }
    }
}

/// Await the child while draining both pipes, teeing to the host when verbose.
async fn wait_and_capture(
    child: &mut Child,
    verbose: bool,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (status, stdout, stderr) = tokio::try_join!(
        child.wait(),
        capture(stdout, verbose.then(tokio::io::stdout)),
        capture(stderr, verbose.then(tokio::io::stderr)),
    )?;

    Ok((status, stdout, stderr))
}

/// Read `reader` to EOF, copying each chunk to `sink` when one is given.
///
/// Forwarding is decorative: a broken host stream stops forwarding but not capture.
pub async fn capture<R, W>(reader: Option<R>, mut sink: Option<W>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut captured = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(captured);
    };

    let mut buffer = vec![0u8; 8192];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        captured.extend_from_slice(&buffer[..n]);

        if let Some(out) = sink.as_mut() {
            let forwarded = async {
                out.write_all(&buffer[..n]).await?;
                out.flush().await
            };
            if forwarded.await.is_err() {
                sink = None;
            }
        }
    }

    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(verbose: bool) -> SubmissionRequest<'a> {
        SubmissionRequest {
            product_path: Path::new("/build/App.app"),
            archive_path: Path::new("/tmp/ws/App.zip"),
            key_path: Path::new("/tmp/ws/AuthKey_K.p8"),
            api_key_id: "K",
            api_issuer: "ISS",
            verbose,
        }
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn notarytool_arguments() {
        assert_eq!(
            strings(request(false).args()),
            [
                "notarytool", "submit", "--key", "/tmp/ws/AuthKey_K.p8", "--key-id", "K",
                "--issuer", "ISS", "--wait", "--timeout", "15m", "/tmp/ws/App.zip",
            ]
        );
    }

    #[test]
    fn verbose_flag_precedes_archive() {
        let args = strings(request(true).args());
        assert_eq!(&args[args.len() - 2..], ["--verbose", "/tmp/ws/App.zip"]);
    }

    #[test]
    fn exit_zero_is_accepted() {
        assert_eq!(
            SubmissionOutcome::classify(Some(0), b"Accepted\n", b"noise"),
            SubmissionOutcome::Accepted {
                stdout: "Accepted".into()
            }
        );
    }

    #[test]
    fn nonzero_exit_combines_streams() {
        assert_eq!(
            SubmissionOutcome::classify(Some(1), b"X", b"Y"),
            SubmissionOutcome::Rejected {
                exit_code: Some(1),
                output: "X\nY".into()
            }
        );
        assert_eq!(
            SubmissionOutcome::classify(Some(2), b"X\n", b"Y\n"),
            SubmissionOutcome::Rejected {
                exit_code: Some(2),
                output: "X\nY".into()
            }
        );
    }

    #[test]
    fn killed_process_is_rejected() {
        assert!(matches!(
            SubmissionOutcome::classify(None, b"", b""),
            SubmissionOutcome::Rejected { exit_code: None, .. }
        ));
    }

    #[tokio::test]
    async fn capture_tees_into_sink() {
        let mut sink = Vec::new();
        let captured = capture(Some(&b"hello\nworld"[..]), Some(&mut sink))
            .await
            .unwrap();
        assert_eq!(captured, b"hello\nworld");
        assert_eq!(sink, b"hello\nworld");
    }

    #[tokio::test]
    async fn capture_without_sink_only_collects() {
        let captured = capture(Some(&b"quiet"[..]), None::<tokio::io::Sink>)
            .await
            .unwrap();
        assert_eq!(captured, b"quiet");
    }

    #[tokio::test]
    async fn vanished_product_fails_before_spawning() {
        let reporter = crate::reporter::MemoryReporter::new();
        let mut req = request(false);
        req.product_path = Path::new("/nonexistent/Gone.app");

        let err = submit(
            Path::new("/nonexistent/xcrun"),
            &req,
            DEFAULT_DEADLINE,
            &reporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, NotarizeError::Precondition(_)));
        assert_eq!(err.to_string(), "No product could be found at /nonexistent/Gone.app");
        assert!(reporter.events().is_empty());
    }
}
