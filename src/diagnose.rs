//! Diagnose notarization setup without submitting anything

use crate::config::{NotarizeInputs, Toolchain, expand_tilde_path};
use crate::credentials::{KeyMaterial, inspect_key_material};
use crate::error::{NotarizeError, Result};
use std::path::Path;
use std::process::Stdio;

/// Result of checking one external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Available(String),
    Missing(String),
}

/// Validate inputs and external tools.
///
/// Checks that the API key inputs are present, that `ditto` can be spawned,
/// and that `xcrun notarytool --version` succeeds.
pub async fn diagnose_notarization_setup(inputs: &NotarizeInputs, toolchain: &Toolchain) -> Result<()> {
    println!("🔍 Diagnosing notarization setup...\n");

    let mut problems = Vec::new();

    let key_source = inputs.api_key.as_ref().map(|k| k.as_bytes().to_vec());
    match (key_source, &inputs.api_key_file) {
        (Some(key), _) => report_key(&key),
        (None, Some(file)) => match tokio::fs::read(expand_tilde_path(file)?).await {
            Ok(key) => report_key(&key),
            Err(e) => {
                crate::error!("API key file {file} is not readable: {e}");
                problems.push("API key file");
            }
        },
        (None, None) => {
            crate::error!("No API key provided (appstore-connect-api-key)");
            problems.push("API key");
        }
    }

    for (label, value) in [
        ("Key ID", &inputs.api_key_id),
        ("Issuer", &inputs.api_issuer),
    ] {
        match value {
            Some(v) => crate::success!("{label}: {v}"),
            None => {
                crate::error!("{label} not provided");
                problems.push(label);
            }
        }
    }

    match check_ditto(&toolchain.ditto).await {
        ToolStatus::Available(_) => crate::success!("ditto is available"),
        ToolStatus::Missing(reason) => {
            crate::error!("ditto not found: {reason}");
            problems.push("ditto");
        }
    }

    match check_notarytool(&toolchain.xcrun).await {
        ToolStatus::Available(version) => crate::success!("xcrun notarytool is available ({version})"),
        ToolStatus::Missing(reason) => {
            crate::error!("xcrun notarytool not found: {reason}");
            println!("   Install Xcode Command Line Tools:");
            println!("   xcode-select --install");
            problems.push("xcrun notarytool");
        }
    }

    if problems.is_empty() {
        println!("\n✅ Notarization setup looks good!");
        return Ok(());
    }

    Err(NotarizeError::MissingDependency(problems.join(", ")))
}

fn report_key(key: &[u8]) {
    match inspect_key_material(key) {
        KeyMaterial::Ec => crate::success!("API key is a valid EC private key"),
        KeyMaterial::Rsa => crate::warn!("API key is RSA; App Store Connect issues EC keys"),
        KeyMaterial::Unrecognized => {
            crate::warn!("API key is not a PEM private key; notarytool may reject it");
        }
    }
}

/// `ditto` has no version flag; being able to spawn it is enough.
pub async fn check_ditto(ditto: &Path) -> ToolStatus {
    let spawned = tokio::process::Command::new(ditto)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match spawned {
        Ok(_) => ToolStatus::Available(ditto.display().to_string()),
        Err(e) => ToolStatus::Missing(e.to_string()),
    }
}

pub async fn check_notarytool(xcrun: &Path) -> ToolStatus {
    let output = tokio::process::Command::new(xcrun)
        .args(["notarytool", "--version"])
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            ToolStatus::Available(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(output) => ToolStatus::Missing(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        Err(e) => ToolStatus::Missing(e.to_string()),
    }
}
