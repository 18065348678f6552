//! Ingest job: configuration, fetcher and sink wired around the pipeline

use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::IngestConfig;
use crate::error::Result;
use crate::event::S3Event;
use crate::fetch::{ObjectFetcher, ObjectLocation};
use crate::hasher::{Argon2Hasher, CredentialHasher};
use crate::parser::CredentialParser;
use crate::pipeline::IngestPipeline;
use crate::sink::CredentialSink;

pub struct IngestJob<S: CredentialSink> {
    pipeline: IngestPipeline<S>,
    fetcher: Arc<dyn ObjectFetcher>,
}

impl<S: CredentialSink + 'static> IngestJob<S> {
    /// Validate `config` and build the job with an Argon2id hasher
    pub fn new(config: &IngestConfig, fetcher: Arc<dyn ObjectFetcher>, sink: Arc<S>) -> Result<Self> {
        config.validate()?;
        let hasher = Arc::new(Argon2Hasher::new(&config.hash)?);
        Self::with_hasher(config, fetcher, sink, hasher)
    }

    /// Same as [`IngestJob::new`] with a caller-supplied hasher
    pub fn with_hasher(
        config: &IngestConfig,
        fetcher: Arc<dyn ObjectFetcher>,
        sink: Arc<S>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Result<Self> {
        config.validate()?;

        let parser = CredentialParser::new(config.sentinels.clone());
        Ok(Self {
            pipeline: IngestPipeline::new(config.pipeline, parser, hasher, sink),
            fetcher,
        })
    }

    /// Ingest one object end to end
    #[instrument(skip(self, location), fields(location = %location))]
    pub async fn ingest(&self, location: &ObjectLocation) -> Result<()> {
        info!("Processing {}", location);
        let source = self.fetcher.open(location).await?;
        self.pipeline.run(source).await
    }

    /// Ingest every object of an event in order, stopping at the first error
    pub async fn handle_event(&self, event: &S3Event) -> Result<()> {
        info!(objects = event.records.len(), "Handling S3 event");
        for location in event.locations() {
            self.ingest(&location).await?;
        }
        Ok(())
    }
}
