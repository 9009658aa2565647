//! Notarization pipeline: configure, archive, submit.
//!
//! One run walks `Configuring -> Archiving -> Submitting -> Done` and stops at
//! the first failure. Whatever goes wrong, the reporter sees exactly one
//! failure verdict:
//!
//! - packaging failures: `Notarization failed`
//! - everything else: `Notarization failed with an unexpected error: <message>`

use crate::archive;
use crate::config::{NotarizeConfig, NotarizeInputs, PRODUCT_PATH_OUTPUT, Toolchain};
use crate::credentials::{self, KeyMaterial};
use crate::error::{NotarizeError, Result};
use crate::reporter::Reporter;
use crate::submit::{self, DEFAULT_DEADLINE, SubmissionRequest};
use crate::workspace::Workspace;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuring,
    Archiving,
    Submitting,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuring => "configuring",
            Self::Archiving => "archiving",
            Self::Submitting => "submitting",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// A failed run: the stage it stopped in and the cause.
#[derive(Debug, Error)]
#[error("{}", failure_message(.error))]
pub struct PipelineFailure {
    pub stage: Stage,
    pub error: NotarizeError,
}

/// Top-level report text for a failure.
#[must_use]
pub fn failure_message(error: &NotarizeError) -> String {
    if error.is_packaging() {
        "Notarization failed".to_string()
    } else {
        format!("Notarization failed with an unexpected error: {error}")
    }
}

/// Runs the archive-and-submit pipeline against a reporter.
pub struct Pipeline<'a> {
    reporter: &'a dyn Reporter,
    toolchain: Toolchain,
    deadline: Duration,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(reporter: &'a dyn Reporter, toolchain: Toolchain) -> Self {
        Self {
            reporter,
            toolchain,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Override the caller-side deadline for the submission.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run once. On success the product path is published as the
    /// `product-path` output and returned.
    pub async fn run(&self, inputs: NotarizeInputs) -> std::result::Result<PathBuf, PipelineFailure> {
        let mut stage = Stage::Configuring;
        let result = self.execute(inputs, &mut stage).await;

        let result = result.and_then(|product_path| {
            self.reporter
                .set_output(PRODUCT_PATH_OUTPUT, &product_path.to_string_lossy())?;
            Ok(product_path)
        });

        match result {
            Ok(product_path) => Ok(product_path),
            Err(error) => {
                let failure = PipelineFailure { stage, error };
                self.reporter.set_failed(&failure.to_string());
                Err(failure)
            }
        }
    }

    async fn execute(&self, inputs: NotarizeInputs, stage: &mut Stage) -> Result<PathBuf> {
        let config = NotarizeConfig::from_inputs(inputs).await?;
        let workspace = Workspace::create()?;

        let result = self.run_stages(&config, &workspace, stage).await;
        workspace.cleanup().await;
        result
    }

    async fn run_stages(
        &self,
        config: &NotarizeConfig,
        workspace: &Workspace,
        stage: &mut Stage,
    ) -> Result<PathBuf> {
        // Last step of configuring: the key file must exist before packaging
        let key_file = credentials::materialize(workspace.path(), &config.credentials).await?;
        match credentials::inspect_key_material(&config.credentials.api_key) {
            KeyMaterial::Ec => {}
            KeyMaterial::Rsa => self
                .reporter
                .warning("API key is an RSA key; App Store Connect issues EC keys"),
            KeyMaterial::Unrecognized => self
                .reporter
                .warning("API key is not a PEM-encoded private key; notarytool may reject it"),
        }

        *stage = Stage::Archiving;
        let archive_path = self
            .grouped("Archiving Application", async {
                let archive_path = archive::create_archive(
                    &self.toolchain.ditto,
                    &config.product_path,
                    &workspace.archive_path(&config.product_path),
                    self.reporter,
                )
                .await?;

                self.reporter.info(&format!(
                    "Created application archive at {}",
                    archive_path.display()
                ));
                if let Ok(digest) = archive::file_digest(&archive_path).await {
                    self.reporter.info(&format!("Archive SHA-256: {digest}"));
                }
                Ok::<_, NotarizeError>(archive_path)
            })
            .await?;

        *stage = Stage::Submitting;
        let request = SubmissionRequest {
            product_path: &config.product_path,
            archive_path: &archive_path,
            key_path: key_file.path(),
            api_key_id: &config.credentials.api_key_id,
            api_issuer: &config.credentials.api_issuer,
            verbose: config.verbose,
        };
        self.grouped(
            "Submitting for Notarizing",
            submit::submit(&self.toolchain.xcrun, &request, self.deadline, self.reporter),
        )
        .await?;

        *stage = Stage::Done;
        Ok(config.product_path.clone())
    }

    /// Wrap `work` in a reporter group that is closed on every path.
    async fn grouped<T>(&self, name: &str, work: impl Future<Output = T>) -> T {
        self.reporter.start_group(name);
        let output = work.await;
        self.reporter.end_group();
        output
    }
}
