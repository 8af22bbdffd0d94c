//! # fedtrust-cli
//!
//! Command-line front end for the fedtrust federation engine.
//!
//! - Key pair generation into the PEM key store
//! - Trust resolution lookups against configured metadata
//! - Response production for a subject
//! - Response consumption and validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use context::EngineContext;
pub use error::{CliError, CliResult};

use std::path::Path;

use fedtrust_core::Config;

/// Loads configuration from `path`, or defaults when no file is given.
///
/// # Errors
///
/// Returns `Core` if the file cannot be read or fails validation.
pub fn load_config(path: Option<&Path>) -> CliResult<Config> {
    match path {
        Some(path) => Ok(Config::from_file(path)?),
        None => {
            tracing::debug!("no configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}
