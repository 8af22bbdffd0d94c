//! Response consumption.

use fedtrust_saml::pipeline::{AssertionConsumer, ConsumerSettings};
use fedtrust_saml::LifecycleValidator;

use crate::cli::ConsumeArgs;
use crate::context::EngineContext;
use crate::output::{output_json, success};

/// Validates a response read from a file and prints the accepted assertion.
pub async fn run_consume(args: ConsumeArgs, context: &EngineContext) -> crate::CliResult<()> {
    let xml = tokio::fs::read_to_string(&args.input).await?;

    let settings = ConsumerSettings::from_config(&context.config)?;
    let resolver = context.resolver().await?;
    let validator = LifecycleValidator::new(settings.protocol, resolver.clone())
        .with_config(&context.config.validation);
    let consumer = AssertionConsumer::new(
        settings,
        resolver,
        context.decryption_credential().await?,
        validator,
        context.capabilities()?,
        context.audit.clone(),
    )?;

    let assertion = consumer.consume_xml(&xml).await?;
    success(&format!("Accepted assertion {}", assertion.id));
    output_json(&assertion)
}
