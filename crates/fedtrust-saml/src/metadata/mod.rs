//! Metadata: document model, sources, and the trust resolver.

mod document;
mod resolver;
mod source;

pub use document::{
    Endpoint, EntityDescriptor, KeyDescriptor, KeyUse, MetadataDocument, RoleDescriptor,
};
pub use resolver::{MetadataTrustResolver, RefreshPolicy, TrustedEntity, DEFAULT_LOAD_TIMEOUT};
pub use source::{FileMetadataSource, HttpMetadataSource, InMemoryMetadataSource, MetadataSource};
