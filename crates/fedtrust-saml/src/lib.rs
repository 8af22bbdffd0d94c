//! SAML 1.1 and 2.0 federation engine.
//!
//! This crate turns peer metadata into trust decisions and uses them to
//! exchange assertions:
//!
//! - **Trust resolution** - Entities, endpoints, and keys from metadata
//! - **Hybrid encryption** - Per-message session keys wrapped for the recipient
//! - **XML signatures** - Enveloped signatures validated against resolved keys
//! - **Lifecycle validation** - Version, issuer, window, subject, destination, replay
//! - **Pipelines** - Producer and consumer flows with audit events
//!
//! # Architecture
//!
//! - [`types`] - SAML data model shared by both protocol versions
//! - [`xml`] - Minimal XML element tree, writer, and canonical form
//! - [`codec`] - XML marshalling of assertions and responses
//! - [`metadata`] - Metadata model, sources, and the trust resolver
//! - [`signature`] - Signature engine and trust anchors
//! - [`encryption`] - Assertion encryption and wrapped key resolution
//! - [`validation`] - Assertion lifecycle checks
//! - [`replay`] - Replay store collaborator
//! - [`pipeline`] - Producer, consumer, and the implementation registry
//! - [`error`] - Error types for SAML operations
//!
//! # Example
//!
//! ```rust,ignore
//! use fedtrust_saml::metadata::{FileMetadataSource, MetadataTrustResolver};
//! use fedtrust_saml::pipeline::{AssertionRequest, ImplementationRegistry};
//!
//! let resolver = Arc::new(MetadataTrustResolver::load(Arc::new(source)).await?);
//! let capabilities = ImplementationRegistry::new().capabilities_for(Some("acme"));
//! let producer = AssertionProducer::new(settings, resolver, Some(key), capabilities, audit)?;
//! let produced = producer.produce(&AssertionRequest::new("189502"))?;
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Metadata](https://docs.oasis-open.org/security/saml/v2.0/saml-metadata-2.0-os.pdf)
//! - [SAML 1.1 Core](https://www.oasis-open.org/committees/download.php/3406/oasis-sstc-saml-core-1.1.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [XML Encryption](https://www.w3.org/TR/xmlenc-core1/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod encryption;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod replay;
pub mod signature;
pub mod types;
pub mod validation;
pub mod xml;

pub use codec::{AssertionCodec, XmlAssertionCodec};
pub use encryption::{AssertionEncrypter, KeyPlacement};
pub use error::{SamlError, SamlResult};
pub use metadata::{MetadataTrustResolver, TrustedEntity};
pub use pipeline::{AssertionConsumer, AssertionProducer, ImplementationRegistry};
pub use replay::{InMemoryReplayStore, ReplayStore};
pub use signature::SignatureEngine;
pub use types::*;
pub use validation::LifecycleValidator;
