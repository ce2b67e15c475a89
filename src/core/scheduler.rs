//! Chunk planning and batched execution.
//!
//! Tasks run in batches of at most `max_parallel`. Every task in a batch is
//! polled concurrently with `join_all`, and the batch is a full barrier: the
//! next batch starts only after every task of the current one has finished,
//! successfully or not. A failure anywhere in a batch aborts the job.

use futures::future::join_all;
use std::future::Future;
use tracing::{debug, warn};

use super::error::{PipelineError, PipelineResult};
use super::types::{ChunkResult, ChunkTask};

/// Split `[0, total_size)` into contiguous tasks of `chunk_size` bytes.
///
/// The last task's end is clamped to `total_size - 1`. Returns no tasks when
/// either argument is zero, and [`PipelineError::SourceTooLarge`] when the
/// plan would exceed `max_chunks` tasks.
pub fn plan_chunks(
    total_size: u64,
    chunk_size: u64,
    max_chunks: usize,
) -> PipelineResult<Vec<ChunkTask>> {
    if total_size == 0 || chunk_size == 0 {
        return Ok(Vec::new());
    }

    let chunk_count = total_size.div_ceil(chunk_size);
    if chunk_count > max_chunks as u64 {
        return Err(PipelineError::SourceTooLarge {
            total_size,
            chunk_count,
            limit: max_chunks,
        });
    }

    let mut tasks = Vec::new();
    let mut offset = 0;
    while offset < total_size {
        let end_inclusive = offset.saturating_add(chunk_size - 1).min(total_size - 1);
        tasks.push(ChunkTask {
            offset,
            end_inclusive,
        });
        offset = end_inclusive + 1;
    }
    Ok(tasks)
}

/// Runs chunk tasks in bounded, sequential batches.
#[derive(Debug, Clone, Copy)]
pub struct ChunkScheduler {
    max_parallel: usize,
}

impl ChunkScheduler {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Execute `tasks` with `work`, returning results in offset order.
    ///
    /// On failure the error of the lowest-offset failed task in the failing
    /// batch is returned and no further batches are started.
    pub async fn run<F, Fut>(&self, tasks: &[ChunkTask], work: F) -> PipelineResult<Vec<ChunkResult>>
    where
        F: Fn(ChunkTask) -> Fut,
        Fut: Future<Output = PipelineResult<ChunkResult>>,
    {
        let total_batches = tasks.len().div_ceil(self.max_parallel);
        let mut results = Vec::with_capacity(tasks.len());
        let mut bytes_done: u64 = 0;

        for (batch_index, batch) in tasks.chunks(self.max_parallel).enumerate() {
            debug!(
                batch = batch_index + 1,
                total_batches,
                tasks = batch.len(),
                first_offset = batch.first().map(|t| t.offset),
                "Dispatching batch"
            );

            let outcomes = join_all(batch.iter().map(|task| work(*task))).await;

            let mut first_error: Option<PipelineError> = None;
            for outcome in outcomes {
                match outcome {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        warn!(error = %e, "Chunk task failed");
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }

            bytes_done += batch.iter().map(ChunkTask::byte_len).sum::<u64>();
            debug!(
                batch = batch_index + 1,
                bytes_done, "Batch complete"
            );
        }

        results.sort_by_key(|r| r.offset);
        Ok(results)
    }
}
