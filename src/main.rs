use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use kodegen_bundler_notarize::config::{
    DEFAULT_DITTO, DEFAULT_XCRUN, NotarizeInputs, Toolchain, expand_tilde_path, parse_verbose,
};
use kodegen_bundler_notarize::diagnose::diagnose_notarization_setup;
use kodegen_bundler_notarize::{ActionsReporter, Pipeline, Reporter, TerminalReporter};

// ============================================================================
// ERROR HANDLING STRATEGY
// ============================================================================
//
// The pipeline reports its own verdict through the selected Reporter, exactly
// once. main therefore maps a failed run to a non-zero ExitCode instead of
// returning the error, which would print it a second time.
//
// Errors that happen before a pipeline exists (unreadable --config file,
// failed diagnosis) are returned as anyhow errors.
// ============================================================================

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReporterKind {
    /// GitHub Actions workflow commands when `GITHUB_ACTIONS=true`, terminal otherwise
    Auto,
    Actions,
    Terminal,
}

#[derive(Parser)]
#[command(name = "kodegen_notarize")]
#[command(version, about = "Archive a build product and submit it for Apple notarization")]
struct Cli {
    /// Path to the product to notarize (.app, .pkg, binary)
    #[arg(long, env = "INPUT_PRODUCT-PATH")]
    product_path: Option<String>,

    /// Apple ID username (accepted for compatibility, unused)
    #[arg(long, env = "INPUT_APPSTORE-CONNECT-USERNAME")]
    appstore_connect_username: Option<String>,

    /// App-specific password (accepted for compatibility, unused)
    #[arg(long, env = "INPUT_APPSTORE-CONNECT-PASSWORD", hide_env_values = true)]
    appstore_connect_password: Option<String>,

    /// Contents of the App Store Connect .p8 API key
    #[arg(
        long,
        env = "INPUT_APPSTORE-CONNECT-API-KEY",
        hide_env_values = true,
        allow_hyphen_values = true
    )]
    appstore_connect_api_key: Option<String>,

    /// Path to the App Store Connect .p8 API key (used when the key contents are not given)
    #[arg(long, env = "INPUT_APPSTORE-CONNECT-API-KEY-FILE")]
    appstore_connect_api_key_file: Option<String>,

    /// App Store Connect API key ID
    #[arg(long, env = "INPUT_APPSTORE-CONNECT-API-KEY-ID")]
    appstore_connect_api_key_id: Option<String>,

    /// App Store Connect issuer ID
    #[arg(long, env = "INPUT_APPSTORE-CONNECT-API-ISSUER")]
    appstore_connect_api_issuer: Option<String>,

    /// Primary bundle identifier (accepted for compatibility, unused)
    #[arg(long, env = "INPUT_PRIMARY-BUNDLE-ID")]
    primary_bundle_id: Option<String>,

    /// Stream notarytool output live; only "true" enables it
    #[arg(long, env = "INPUT_VERBOSE", num_args = 0..=1, default_missing_value = "true")]
    verbose: Option<String>,

    /// Path to inputs file (TOML); flags and environment override it
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Where progress and the verdict are reported
    #[arg(long, value_enum, default_value = "auto")]
    reporter: ReporterKind,

    /// Archiving tool
    #[arg(long, default_value = DEFAULT_DITTO)]
    ditto: PathBuf,

    /// Developer tool launcher hosting notarytool
    #[arg(long, default_value = DEFAULT_XCRUN)]
    xcrun: PathBuf,

    /// Give up on notarytool after this many seconds
    #[arg(long, default_value_t = 960)]
    timeout_secs: u64,

    /// Check credentials and tools without submitting
    #[arg(long)]
    diagnose: bool,
}

impl Cli {
    fn inputs(&self) -> NotarizeInputs {
        NotarizeInputs {
            product_path: self.product_path.clone(),
            username: self.appstore_connect_username.clone(),
            password: self.appstore_connect_password.clone(),
            api_key: self.appstore_connect_api_key.clone(),
            api_key_file: self.appstore_connect_api_key_file.clone(),
            api_key_id: self.appstore_connect_api_key_id.clone(),
            api_issuer: self.appstore_connect_api_issuer.clone(),
            primary_bundle_id: self.primary_bundle_id.clone(),
            verbose: self.verbose.as_deref().map(parse_verbose),
        }
    }

    fn reporter(&self) -> Box<dyn Reporter> {
        let actions = match self.reporter {
            ReporterKind::Actions => true,
            ReporterKind::Terminal => false,
            ReporterKind::Auto => std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true"),
        };
        if actions {
            Box::new(ActionsReporter::from_env())
        } else {
            Box::new(TerminalReporter)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let file_inputs = match &cli.config {
        Some(path) => {
            let path = PathBuf::from(expand_tilde_path(&path.to_string_lossy())?);
            NotarizeInputs::from_toml_file(&path).await?
        }
        None => NotarizeInputs::default(),
    };
    let inputs = file_inputs.overlay(cli.inputs());

    let toolchain = Toolchain {
        ditto: cli.ditto.clone(),
        xcrun: cli.xcrun.clone(),
    };

    if cli.diagnose {
        diagnose_notarization_setup(&inputs, &toolchain).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let reporter = cli.reporter();
    let pipeline = Pipeline::new(reporter.as_ref(), toolchain)
        .with_deadline(Duration::from_secs(cli.timeout_secs));

    // Dropping the run kills notarytool and removes the workspace
    tokio::select! {
        result = pipeline.run(inputs) => match result {
            Ok(_) => Ok(ExitCode::SUCCESS),
            Err(_) => Ok(ExitCode::FAILURE),
        },
        _ = tokio::signal::ctrl_c() => {
            // The dropped run never reached its own end_group
            reporter.end_group();
            reporter.set_failed("Notarization cancelled");
            Ok(ExitCode::from(130))
        }
    }
}
