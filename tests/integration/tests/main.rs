//! End-to-end integration tests.
//!
//! These tests drive the engine the way a deployment does: keys in a PEM
//! key store directory, metadata in a file, and settings in a TOML config.

mod common;
mod federation_flows;
mod signatures;
mod trust_resolution;
