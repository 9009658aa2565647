//! Archive a build product and submit it to Apple's notary service
//!
//! The pipeline packages a product with `ditto`, submits the archive with
//! `xcrun notarytool submit --wait`, and reports the verdict to a CI runner
//! or a terminal through a [`Reporter`].

#[macro_use]
pub mod output;

pub mod archive;
pub mod config;
pub mod credentials;
pub mod diagnose;
pub mod error;
pub mod pipeline;
pub mod reporter;
pub mod submit;
pub mod workspace;

// Re-export common types
pub use config::{NotarizeConfig, NotarizeInputs, Toolchain};
pub use error::NotarizeError;
pub use pipeline::{Pipeline, PipelineFailure, Stage};
pub use reporter::{ActionsReporter, MemoryReporter, Reporter, TerminalReporter};
