//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use fedtrust_core::config::CONFIG_ENV_VAR;

/// fedtrust - SAML trust resolution and assertion exchange.
#[derive(Debug, Parser)]
#[command(name = "fedtrust")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a key pair into the key store directory.
    Keygen(KeygenArgs),

    /// Print a trusted entity resolved from metadata.
    Resolve(ResolveArgs),

    /// Build a response for a subject and print its XML.
    Produce(ProduceArgs),

    /// Validate a response and print the accepted assertion.
    Consume(ConsumeArgs),
}

/// Key families `keygen` can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyAlgorithm {
    /// RSA 2048.
    Rsa2048,
    /// RSA 3072.
    Rsa3072,
    /// RSA 4096.
    Rsa4096,
    /// ECDSA P-256.
    P256,
    /// ECDSA P-384.
    P384,
}

/// Arguments of `keygen`.
#[derive(Debug, clap::Args)]
pub struct KeygenArgs {
    /// Key store alias.
    pub alias: String,

    /// Key algorithm.
    #[arg(short, long, value_enum, default_value = "rsa2048")]
    pub algorithm: KeyAlgorithm,
}

/// Entity roles `resolve` can look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    /// Identity provider.
    Idp,
    /// Service provider.
    Sp,
}

/// Arguments of `resolve`.
#[derive(Debug, clap::Args)]
pub struct ResolveArgs {
    /// Entity ID to resolve.
    pub entity_id: String,

    /// Role to resolve the entity in.
    #[arg(short, long, value_enum, default_value = "sp")]
    pub role: RoleArg,

    /// Protocol, overriding the configured one (`saml2.0` or `saml1.1`).
    #[arg(short, long)]
    pub protocol: Option<String>,
}

/// Arguments of `produce`.
#[derive(Debug, clap::Args)]
pub struct ProduceArgs {
    /// Subject identifier.
    pub subject: String,

    /// Assertion lifetime in seconds, overriding the configured one.
    #[arg(long)]
    pub lifetime: Option<u64>,

    /// Attribute as `name=value`; repeatable.
    #[arg(short, long = "attribute", value_parser = parse_attribute)]
    pub attributes: Vec<(String, String)>,

    /// Authentication context class reference.
    #[arg(long)]
    pub authn_context: Option<String>,

    /// Write the response to a file instead of standard output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments of `consume`.
#[derive(Debug, clap::Args)]
pub struct ConsumeArgs {
    /// File holding the response XML.
    pub input: PathBuf,
}

fn parse_attribute(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_produce_arguments() {
        let cli = Cli::parse_from([
            "fedtrust",
            "--config",
            "fedtrust.toml",
            "produce",
            "189502",
            "-a",
            "mail=jane@example.com",
            "--attribute",
            "role=",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("fedtrust.toml")));
        let Command::Produce(args) = cli.command else {
            panic!("expected produce");
        };
        assert_eq!(args.subject, "189502");
        assert_eq!(
            args.attributes,
            vec![
                ("mail".to_string(), "jane@example.com".to_string()),
                ("role".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn rejects_malformed_attribute() {
        assert!(Cli::try_parse_from(["fedtrust", "produce", "s", "-a", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["fedtrust", "produce", "s", "-a", "=x"]).is_err());
    }

    #[test]
    fn keygen_defaults_to_rsa() {
        let cli = Cli::parse_from(["fedtrust", "keygen", "idp-signing"]);
        let Command::Keygen(args) = cli.command else {
            panic!("expected keygen");
        };
        assert_eq!(args.algorithm, KeyAlgorithm::Rsa2048);
    }
}
