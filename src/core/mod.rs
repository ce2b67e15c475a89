pub mod assembler;
pub mod error;
pub mod fetcher;
pub mod merge;
pub mod pipeline;
pub mod probe;
pub mod redirect;
pub mod resolver;
pub mod scheduler;
pub mod source;
pub mod strategy;
pub mod stt;
pub mod types;
pub mod validation;

// Re-export commonly used types for convenience
pub use assembler::{JobMeta, TranscriptPayload};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{PipelineConfig, TranscriptionPipeline, TranscriptionRequest};
pub use resolver::{HttpResolver, MediaResolver, ResolverConfig};
pub use strategy::{RetrievalStrategy, StrategyConfig, StrategyOverrides, select_strategy};
pub use stt::{
    MediaHint, STTError, STTProvider, Transcriber, WhisperConfig, WhisperTranscriber,
    get_supported_stt_providers,
};
pub use types::{ChunkResult, ChunkTask, ChunkTranscript, MergedTranscript, Segment, Word};
