//! Key generation.

use fedtrust_crypto::{KeyFamily, PrivateCredential};

use crate::cli::{KeyAlgorithm, KeygenArgs};
use crate::context::EngineContext;
use crate::output::{info, success};

/// Generates a key pair and stores it under the given alias.
pub async fn run_keygen(args: KeygenArgs, context: &EngineContext) -> crate::CliResult<()> {
    let credential = generate(args.algorithm)?;
    context.keystore.store_private(&args.alias, &credential).await?;

    success(&format!("Stored key pair '{}'", args.alias));
    info(&format!(
        "Key id {} in {}",
        credential.public_credential().key_id(),
        context.config.keystore.directory.display()
    ));
    Ok(())
}

fn generate(algorithm: KeyAlgorithm) -> crate::CliResult<PrivateCredential> {
    let credential = match algorithm {
        KeyAlgorithm::Rsa2048 => PrivateCredential::generate_rsa(2048)?,
        KeyAlgorithm::Rsa3072 => PrivateCredential::generate_rsa(3072)?,
        KeyAlgorithm::Rsa4096 => PrivateCredential::generate_rsa(4096)?,
        KeyAlgorithm::P256 => PrivateCredential::generate(KeyFamily::EcP256)?,
        KeyAlgorithm::P384 => PrivateCredential::generate(KeyFamily::EcP384)?,
    };
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedtrust_core::Config;
    use fedtrust_crypto::KeyStore;

    #[tokio::test]
    async fn generated_key_can_be_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.keystore.directory = dir.path().to_path_buf();
        let context = EngineContext::new(config);

        let args = KeygenArgs {
            alias: "idp-signing".into(),
            algorithm: KeyAlgorithm::P256,
        };
        run_keygen(args, &context).await.unwrap();

        let loaded = context
            .keystore
            .load_private_credential("idp-signing", None)
            .await
            .unwrap();
        assert_eq!(loaded.family(), KeyFamily::EcP256);
    }
}
