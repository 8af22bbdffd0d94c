//! Response production.

use chrono::Duration;
use fedtrust_saml::pipeline::{AssertionProducer, AssertionRequest, ProducerSettings};

use crate::cli::ProduceArgs;
use crate::context::EngineContext;
use crate::output::{info, success};
use crate::CliError;

/// Produces a response for the subject and prints or writes its XML.
pub async fn run_produce(args: ProduceArgs, context: &EngineContext) -> crate::CliResult<()> {
    let settings = ProducerSettings::from_config(&context.config)?;
    let resolver = context.resolver().await?;
    let signing_key = context.signing_credential().await?;
    let producer = AssertionProducer::new(
        settings,
        resolver,
        signing_key,
        context.capabilities()?,
        context.audit.clone(),
    )?;

    let produced = producer.produce(&build_request(&args)?)?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, produced.xml.as_bytes()).await?;
            success(&format!("Wrote response {} to {}", produced.response.id, path.display()));
        }
        None => println!("{}", produced.xml),
    }
    info(&format!("Deliver to {}", produced.destination));
    Ok(())
}

fn build_request(args: &ProduceArgs) -> crate::CliResult<AssertionRequest> {
    let mut request = AssertionRequest::new(args.subject.clone());
    if let Some(secs) = args.lifetime {
        let lifetime = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| CliError::InvalidArgument(format!("lifetime too large: {secs}")))?;
        request.lifetime = Some(lifetime);
    }
    if let Some(class) = &args.authn_context {
        request = request.with_authn_context_class(class.clone());
    }
    for (name, value) in &args.attributes {
        request = request.with_attribute(name.clone(), value.clone());
    }
    Ok(request)
}
