//! Metadata sources.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use url::Url;

use super::MetadataDocument;
use crate::error::{SamlError, SamlResult};

/// Loads a metadata document.
///
/// Sources may retry internally; the resolver bounds every load with its own
/// timeout.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Loads and parses the current document.
    async fn load(&self) -> SamlResult<MetadataDocument>;

    /// Describes the source for log records.
    fn describe(&self) -> String;
}

/// Metadata read from a file.
#[derive(Debug, Clone)]
pub struct FileMetadataSource {
    path: PathBuf,
}

impl FileMetadataSource {
    /// Creates a source for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MetadataSource for FileMetadataSource {
    async fn load(&self) -> SamlResult<MetadataDocument> {
        let xml = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SamlError::Metadata(format!("cannot read {}: {e}", self.path.display()))
        })?;
        MetadataDocument::parse(&xml)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Metadata held in memory, replaceable at run time.
#[derive(Debug, Default)]
pub struct InMemoryMetadataSource {
    document: RwLock<MetadataDocument>,
}

impl InMemoryMetadataSource {
    /// Creates a source serving `document`.
    #[must_use]
    pub fn from_document(document: MetadataDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }

    /// Creates a source from metadata XML.
    ///
    /// # Errors
    ///
    /// Returns `Metadata` if the XML does not parse.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        MetadataDocument::parse(xml).map(Self::from_document)
    }

    /// Replaces the served document. The next load returns it.
    pub fn replace(&self, document: MetadataDocument) {
        *self.document.write() = document;
    }
}

#[async_trait]
impl MetadataSource for InMemoryMetadataSource {
    async fn load(&self) -> SamlResult<MetadataDocument> {
        Ok(self.document.read().clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Metadata fetched over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    url: Url,
    client: reqwest::Client,
}

impl HttpMetadataSource {
    /// Creates a source for `url`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the URL is invalid or not HTTP(S).
    pub fn new(url: &str) -> SamlResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| SamlError::Configuration(format!("invalid metadata URL {url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SamlError::Configuration(format!(
                "unsupported metadata URL scheme: {}",
                url.scheme()
            )));
        }
        Ok(Self {
            url,
            client: reqwest::Client::new(),
        })
    }

    /// Uses a preconfigured client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn load(&self) -> SamlResult<MetadataDocument> {
        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::ACCEPT, "application/samlmetadata+xml")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SamlError::Metadata(format!("cannot fetch {}: {e}", self.url)))?;
        let xml = response
            .text()
            .await
            .map_err(|e| SamlError::Metadata(format!("cannot read {}: {e}", self.url)))?;
        MetadataDocument::parse(&xml)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
