//! Component wiring.
//!
//! Builds the long-lived components once from a [`Config`]: one embedder
//! shared by ingest and search, one vector index, the Drive client, and the
//! optional OAuth client. Secrets come from the environment here and
//! nowhere else.

use anyhow::{bail, Result};
use drive_recall_core::embedding::Embedder;
use drive_recall_core::index::memory::InMemoryIndex;
use drive_recall_core::index::VectorIndex;
use drive_recall_core::ingest::Ingestor;
use drive_recall_core::search::Retriever;
use drive_recall_core::source::DocumentSource;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, IndexConfig};
use crate::drive::DriveClient;
use crate::embedding::create_embedder;
use crate::identity::GoogleIdentity;
use crate::pinecone::PineconeIndex;

/// Everything the CLI and HTTP layers need to run the pipelines.
#[derive(Clone)]
pub struct Services {
    pub ingestor: Arc<Ingestor>,
    pub retriever: Arc<Retriever>,
    pub drive: Arc<DriveClient>,
    pub identity: Option<Arc<GoogleIdentity>>,
}

impl Services {
    /// Build every component named in `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let index = create_index(&config.index, embedder.dims()).await?;
        let drive = Arc::new(DriveClient::new(&config.drive)?);
        let identity = match &config.oauth {
            Some(oauth) => Some(Arc::new(GoogleIdentity::from_env(oauth)?)),
            None => None,
        };

        info!(
            embedder = embedder.model_name(),
            dims = embedder.dims(),
            index = %config.index.provider,
            "services initialised"
        );

        Ok(Self::new(config, drive, embedder, index, identity))
    }

    /// Assemble services from already-built components.
    pub fn new(
        config: &Config,
        drive: Arc<DriveClient>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        identity: Option<Arc<GoogleIdentity>>,
    ) -> Self {
        let source: Arc<dyn DocumentSource> = drive.clone();
        let ingestor = Ingestor::new(source, embedder.clone(), index.clone())
            .with_policy(config.ingest.policy)
            .with_concurrency(config.ingest.concurrency);
        let retriever = Retriever::new(embedder, index)
            .with_limits(config.retrieval.default_limit, config.retrieval.max_limit);

        Self {
            ingestor: Arc::new(ingestor),
            retriever: Arc::new(retriever),
            drive,
            identity,
        }
    }
}

/// Create the vector index named by `config.provider`.
///
/// A Pinecone index is checked against the embedder's dimensionality
/// before it is used.
pub async fn create_index(config: &IndexConfig, dims: usize) -> Result<Arc<dyn VectorIndex>> {
    if dims == 0 {
        bail!("vector index needs an enabled embedding provider (dims is 0)");
    }
    match config.provider.as_str() {
        "memory" => Ok(Arc::new(InMemoryIndex::new(dims))),
        "pinecone" => {
            let index = PineconeIndex::from_env(config, dims)?;
            index.verify_dimension().await?;
            Ok(Arc::new(index))
        }
        other => bail!("Unknown index provider: {}", other),
    }
}
