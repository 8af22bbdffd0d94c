//! # fedtrust-core
//!
//! Configuration, error handling, and audit events shared by the fedtrust
//! federation engine crates.
//!
//! - [`config`] - TOML-backed engine configuration
//! - [`error`] - Core error type
//! - [`event`] - Audit events and audit sinks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;

pub use config::Config;
pub use error::{Error, Result};
pub use event::{AuditCode, AuditEvent, AuditOutcome, AuditSink};
