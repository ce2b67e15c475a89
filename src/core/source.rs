//! Per-job media source state.
//!
//! The resolved URL is shared by every concurrent chunk task of a job and can
//! be replaced in place when the origin reports that authorization expired.
//! Refreshes are single-flight: tasks that observed the same expired URL
//! wait on one resolver call instead of each issuing their own.

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::info;

use super::error::PipelineResult;
use super::resolver::ResolverClient;

/// A resolved URL together with the number of times it has been refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub url: String,
    pub generation: u64,
}

/// The media being processed by one job.
#[derive(Debug)]
pub struct MediaSource {
    input_reference: String,
    resolved: RwLock<ResolvedUrl>,
    refresh_lock: Mutex<()>,
    /// 0 = unknown
    total_size: u64,
}

impl MediaSource {
    pub fn new(input_reference: impl Into<String>, resolved_url: impl Into<String>) -> Self {
        Self {
            input_reference: input_reference.into(),
            resolved: RwLock::new(ResolvedUrl {
                url: resolved_url.into(),
                generation: 0,
            }),
            refresh_lock: Mutex::new(()),
            total_size: 0,
        }
    }

    pub fn input_reference(&self) -> &str {
        &self.input_reference
    }

    /// Snapshot of the current URL and its generation.
    pub fn current(&self) -> ResolvedUrl {
        self.resolved.read().clone()
    }

    pub fn resolved_url(&self) -> String {
        self.resolved.read().url.clone()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Record the probed size, or back-fill it after a whole-file fallback.
    pub fn set_total_size(&mut self, total_size: u64) {
        self.total_size = total_size;
    }

    /// Re-resolve the input reference after `seen_generation` expired.
    ///
    /// If another task already refreshed past `seen_generation`, its result is
    /// returned without calling the resolver again.
    pub async fn refresh(
        &self,
        seen_generation: u64,
        resolver: &ResolverClient,
    ) -> PipelineResult<ResolvedUrl> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.current();
        if current.generation != seen_generation {
            return Ok(current);
        }

        let url = resolver.resolve(&self.input_reference).await?;

        let mut resolved = self.resolved.write();
        resolved.url = url;
        resolved.generation += 1;
        info!(
            generation = resolved.generation,
            "Refreshed download URL after authorization expiry"
        );
        Ok(resolved.clone())
    }
}
