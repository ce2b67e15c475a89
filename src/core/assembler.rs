//! Final payload assembly: merged transcript plus job metadata.

use serde::Serialize;

use super::strategy::RetrievalStrategy;
use super::types::{ChunkResult, MergedTranscript, Segment, Word};

/// Read-only summary of how a job ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobMeta {
    /// End of the last kept segment, in seconds (0 when there are none)
    pub processed_duration: f64,
    pub segment_count: usize,
    pub bytes_processed: u64,
    /// `None` when the size was never determined
    pub file_size: Option<u64>,
    /// `None` when the size is unknown
    pub complete: Option<bool>,
    pub parallelism: usize,
    pub chunk_size: u64,
    pub strategy: &'static str,
    pub chunk_count: usize,
}

/// What a successful job returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptPayload {
    pub text: String,
    pub segments: Vec<Segment>,
    pub words: Vec<Word>,
    pub meta: JobMeta,
}

/// Combine the merged transcript with job bookkeeping.
///
/// `total_size` is the size known after retrieval (0 = unknown). Whole-file
/// strategies report parallelism 1 and the bytes actually fetched as their
/// chunk size.
pub fn assemble(
    merged: MergedTranscript,
    results: &[ChunkResult],
    strategy: RetrievalStrategy,
    total_size: u64,
) -> TranscriptPayload {
    let bytes_processed: u64 = results.iter().map(|r| r.byte_length).sum();
    let processed_duration = merged.segments.last().map(|s| s.end).unwrap_or(0.0);

    let (chunk_size, parallelism) = strategy
        .chunking()
        .unwrap_or((bytes_processed, 1));

    let file_size = (total_size > 0).then_some(total_size);
    let complete = file_size.map(|size| bytes_processed >= size);

    let meta = JobMeta {
        processed_duration,
        segment_count: merged.segments.len(),
        bytes_processed,
        file_size,
        complete,
        parallelism,
        chunk_size,
        strategy: strategy.name(),
        chunk_count: results.len(),
    };

    TranscriptPayload {
        text: merged.full_text,
        segments: merged.segments,
        words: merged.words,
        meta,
    }
}
