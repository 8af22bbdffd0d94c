//! Trust resolution lookups.

use fedtrust_saml::ProtocolVersion;
use serde_json::json;

use crate::cli::{ResolveArgs, RoleArg};
use crate::context::EngineContext;
use crate::output::output_json;
use crate::CliError;

/// Resolves an entity from metadata and prints what is trusted about it.
pub async fn run_resolve(args: ResolveArgs, context: &EngineContext) -> crate::CliResult<()> {
    let protocol = match args.protocol.as_deref() {
        Some(name) => ProtocolVersion::from_config(name)
            .ok_or_else(|| CliError::InvalidArgument(format!("unknown protocol: {name}")))?,
        None => context.protocol()?,
    };
    let resolver = context.resolver().await?;

    let entity = match args.role {
        RoleArg::Idp => resolver.resolve_identity_provider(&args.entity_id, protocol)?,
        RoleArg::Sp => resolver.resolve_service_provider(&args.entity_id, protocol)?,
    };

    let mut endpoints: Vec<_> = entity
        .endpoints()
        .iter()
        .map(|(binding, location)| json!({ "binding": binding.uri(), "location": location }))
        .collect();
    endpoints.sort_by_key(|e| e["binding"].as_str().map(str::to_string));

    let encryption = resolver
        .resolve_encryption_credential(&entity)
        .map(|(credential, algorithm)| json!({ "key_id": credential.key_id(), "algorithm": algorithm }));

    output_json(&json!({
        "entity_id": entity.entity_id(),
        "role": entity.role().to_string(),
        "protocol": protocol.name(),
        "endpoints": endpoints,
        "signing_keys": entity
            .signing_credentials()
            .iter()
            .map(fedtrust_crypto::PublicCredential::key_id)
            .collect::<Vec<_>>(),
        "signing_required": resolver.resolve_signing_requirement(&entity),
        "encryption": encryption,
    }))
}
