//! Job orchestration: resolve, probe, pick a strategy, fetch and transcribe,
//! merge, assemble.
//!
//! One [`TranscriptionPipeline`] is shared by all requests; each call to
//! [`TranscriptionPipeline::run`] is an independent job with its own
//! [`MediaSource`]. Jobs are fail-fast: any error other than a failed size
//! probe aborts the job and no partial transcript is returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use transcribe_gateway::core::pipeline::{PipelineConfig, TranscriptionPipeline, TranscriptionRequest};
//! use transcribe_gateway::core::resolver::{HttpResolver, ResolverConfig};
//! use transcribe_gateway::core::stt::{WhisperConfig, WhisperTranscriber};
//!
//! let pipeline = TranscriptionPipeline::new(
//!     PipelineConfig::default(),
//!     Arc::new(HttpResolver::new(ResolverConfig::default())?),
//!     Arc::new(WhisperTranscriber::new(WhisperConfig { api_key: key, ..Default::default() })?),
//! )?;
//! let payload = pipeline
//!     .run(TranscriptionRequest::new("https://cdn.example.com/talk.mp3"))
//!     .await?;
//! println!("{}", payload.text);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use super::assembler::{TranscriptPayload, assemble};
use super::error::{PipelineError, PipelineResult};
use super::fetcher::ChunkFetcher;
use super::merge::merge_chunk_results;
use super::probe::{ProbeOutcome, SizeProber};
use super::redirect::GuardedClient;
use super::resolver::{MediaResolver, ResolverClient};
use super::scheduler::{ChunkScheduler, plan_chunks};
use super::source::MediaSource;
use super::strategy::{RetrievalStrategy, StrategyConfig, StrategyOverrides, select_strategy};
use super::stt::{MediaHint, Transcriber};
use super::types::{ChunkResult, ChunkTask};

// =============================================================================
// Configuration
// =============================================================================

/// Default timeout for one range or whole-file download.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 120;

/// Default timeout for the size probe.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// Pipeline-wide settings, immutable for the lifetime of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub strategy: StrategyConfig,
    pub fetch_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Skip the private-address SSRF check (local development and tests)
    pub allow_private_sources: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            allow_private_sources: false,
        }
    }
}

/// One transcription job as requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionRequest {
    pub reference: String,
    pub overrides: StrategyOverrides,
}

impl TranscriptionRequest {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            overrides: StrategyOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: StrategyOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Chunked retrieval and transcription pipeline.
pub struct TranscriptionPipeline {
    config: PipelineConfig,
    resolver: Arc<ResolverClient>,
    prober: SizeProber,
    fetcher: ChunkFetcher,
    transcriber: Arc<dyn Transcriber>,
}

impl TranscriptionPipeline {
    pub fn new(
        config: PipelineConfig,
        resolver: Arc<dyn MediaResolver>,
        transcriber: Arc<dyn Transcriber>,
    ) -> PipelineResult<Self> {
        let http_client = GuardedClient::new(config.allow_private_sources)?;

        let resolver = Arc::new(ResolverClient::new(resolver, config.allow_private_sources));
        let prober = SizeProber::new(
            http_client.clone(),
            Duration::from_secs(config.probe_timeout_secs),
        );
        let fetcher = ChunkFetcher::new(
            http_client,
            resolver.clone(),
            Duration::from_secs(config.fetch_timeout_secs),
        );

        Ok(Self {
            config,
            resolver,
            prober,
            fetcher,
            transcriber,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Name of the transcription engine, for logs and health output.
    pub fn provider_info(&self) -> &'static str {
        self.transcriber.provider_info()
    }

    /// Run one job to completion.
    pub async fn run(&self, request: TranscriptionRequest) -> PipelineResult<TranscriptPayload> {
        let job_id = Uuid::new_v4();
        let span = info_span!("transcription_job", %job_id);
        self.execute(request).instrument(span).await
    }

    async fn execute(&self, request: TranscriptionRequest) -> PipelineResult<TranscriptPayload> {
        let started = Instant::now();
        info!(provider = self.provider_info(), "Starting transcription job");

        let resolved_url = self.resolver.resolve(&request.reference).await?;
        let mut source = MediaSource::new(request.reference, resolved_url);

        let probe = self.prober.probe(&source.resolved_url()).await;
        if let ProbeOutcome::Unknown { ref reason } = probe {
            info!(reason = %reason, "Size unknown, using whole-file fallback");
        }
        source.set_total_size(probe.total_size());

        let strategy = select_strategy(
            source.total_size(),
            request.overrides,
            &self.config.strategy,
        );
        info!(
            strategy = %strategy,
            total_size = source.total_size(),
            "Selected retrieval strategy"
        );

        let results = match strategy.chunking() {
            None => {
                let result = self.transcribe_whole(&source).await?;
                if strategy == RetrievalStrategy::UnknownSizeFallback {
                    source.set_total_size(result.byte_length);
                }
                vec![result]
            }
            Some((chunk_size, max_parallel)) => {
                let tasks = plan_chunks(
                    source.total_size(),
                    chunk_size,
                    self.config.strategy.max_chunk_count,
                )?;
                let hint = MediaHint::from_source(&source.resolved_url(), None);
                info!(
                    chunks = tasks.len(),
                    chunk_size, max_parallel, "Planned chunked retrieval"
                );
                ChunkScheduler::new(max_parallel)
                    .run(&tasks, |task| self.transcribe_chunk(&source, task, &hint))
                    .await?
            }
        };

        let merged = merge_chunk_results(&results);
        let payload = assemble(merged, &results, strategy, source.total_size());

        info!(
            segments = payload.meta.segment_count,
            bytes = payload.meta.bytes_processed,
            duration_secs = payload.meta.processed_duration,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transcription job complete"
        );
        Ok(payload)
    }

    async fn transcribe_whole(&self, source: &MediaSource) -> PipelineResult<ChunkResult> {
        let media = self.fetcher.fetch_whole(source).await?;
        let hint = MediaHint::from_source(&source.resolved_url(), media.content_type.as_deref());
        let byte_length = media.bytes.len() as u64;
        debug!(bytes = byte_length, "Fetched whole file");

        let transcript = self
            .transcriber
            .transcribe(media.bytes, &hint)
            .await
            .map_err(|source| PipelineError::Transcription { offset: 0, source })?;

        Ok(ChunkResult {
            offset: 0,
            byte_length,
            transcript,
        })
    }

    async fn transcribe_chunk(
        &self,
        source: &MediaSource,
        task: ChunkTask,
        hint: &MediaHint,
    ) -> PipelineResult<ChunkResult> {
        let bytes = self.fetcher.fetch_range(source, task).await?;
        let byte_length = bytes.len() as u64;
        debug!(offset = task.offset, bytes = byte_length, "Fetched chunk");

        let transcript = self
            .transcriber
            .transcribe(bytes, hint)
            .await
            .map_err(|source| PipelineError::Transcription {
                offset: task.offset,
                source,
            })?;

        Ok(ChunkResult {
            offset: task.offset,
            byte_length,
            transcript,
        })
    }
}
