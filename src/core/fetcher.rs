//! Byte-range and whole-file retrieval with one authorization refresh.
//!
//! A 401 or 403 from the origin means the download URL expired. The fetcher
//! re-resolves the source once (shared across concurrent tasks, see
//! [`MediaSource::refresh`]) and retries the same request once. A second
//! authorization failure becomes a [`PipelineError::Fetch`].

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{PipelineError, PipelineResult};
use super::redirect::GuardedClient;
use super::resolver::ResolverClient;
use super::source::MediaSource;
use super::types::ChunkTask;
use super::validation::{validate_content_type, validate_payload};

/// A whole-file download.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Fetches media bytes for a job.
pub struct ChunkFetcher {
    http_client: GuardedClient,
    resolver: Arc<ResolverClient>,
    timeout: Duration,
}

impl ChunkFetcher {
    pub fn new(
        http_client: GuardedClient,
        resolver: Arc<ResolverClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            resolver,
            timeout,
        }
    }

    /// Fetch and validate one byte range.
    pub async fn fetch_range(&self, source: &MediaSource, task: ChunkTask) -> PipelineResult<Bytes> {
        let bytes = self
            .with_auth_retry(source, task.offset, |url| self.get_range(url, task))
            .await?;
        validate_payload(&bytes, task.offset)?;
        check_range_length(&bytes, task)?;
        Ok(bytes)
    }

    /// Fetch and validate the whole resource in one request.
    pub async fn fetch_whole(&self, source: &MediaSource) -> PipelineResult<FetchedMedia> {
        let media = self
            .with_auth_retry(source, 0, |url| self.get_whole(url))
            .await?;
        validate_content_type(media.content_type.as_deref())?;
        validate_payload(&media.bytes, 0)?;
        Ok(media)
    }

    async fn with_auth_retry<T, F, Fut>(
        &self,
        source: &MediaSource,
        offset: u64,
        attempt: F,
    ) -> PipelineResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let current = source.current();
        match attempt(current.url).await {
            Err(PipelineError::AuthExpired { status }) => {
                warn!(offset, status, "Download authorization expired, re-resolving");
                let refreshed = source.refresh(current.generation, &self.resolver).await?;
                match attempt(refreshed.url).await {
                    Err(PipelineError::AuthExpired { status }) => Err(PipelineError::fetch(
                        offset,
                        Some(status),
                        "authorization still rejected after re-resolving",
                    )),
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn get_range(&self, url: String, task: ChunkTask) -> PipelineResult<Bytes> {
        let offset = task.offset;
        debug!(offset, end = task.end_inclusive, "Fetching range");

        let response = self
            .http_client
            .get(&url, Some(task.range_header().as_str()), self.timeout, offset)
            .await?;

        let status = response.status();
        if is_auth_failure(status) {
            return Err(PipelineError::AuthExpired {
                status: status.as_u16(),
            });
        }
        if status != StatusCode::PARTIAL_CONTENT && status != StatusCode::OK {
            return Err(PipelineError::fetch(
                offset,
                Some(status.as_u16()),
                format!("unexpected status {status} for range request"),
            ));
        }

        if status == StatusCode::PARTIAL_CONTENT {
            let content_range = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok());
            check_content_range_start(content_range, task)?;
        }

        let body = response.bytes().await.map_err(|e| {
            PipelineError::fetch(offset, Some(status.as_u16()), format!("body read failed: {e}"))
        })?;

        if status == StatusCode::OK {
            return slice_full_body(body, task);
        }
        Ok(body)
    }

    async fn get_whole(&self, url: String) -> PipelineResult<FetchedMedia> {
        debug!("Fetching whole file");

        let response = self.http_client.get(&url, None, self.timeout, 0).await?;

        let status = response.status();
        if is_auth_failure(status) {
            return Err(PipelineError::AuthExpired {
                status: status.as_u16(),
            });
        }
        if status != StatusCode::OK {
            return Err(PipelineError::fetch(
                0,
                Some(status.as_u16()),
                format!("unexpected status {status} for whole-file request"),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = response.bytes().await.map_err(|e| {
            PipelineError::fetch(0, Some(status.as_u16()), format!("body read failed: {e}"))
        })?;

        Ok(FetchedMedia {
            bytes,
            content_type,
        })
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// A 206 must start where the task starts. A missing header is tolerated
/// and left to the length check.
fn check_content_range_start(content_range: Option<&str>, task: ChunkTask) -> PipelineResult<()> {
    let Some(value) = content_range else {
        return Ok(());
    };
    let start = value
        .trim()
        .strip_prefix("bytes")
        .map(str::trim_start)
        .and_then(|rest| rest.split_once('-'))
        .and_then(|(start, _)| start.trim().parse::<u64>().ok());

    match start {
        Some(start) if start == task.offset => Ok(()),
        _ => Err(PipelineError::fetch(
            task.offset,
            Some(StatusCode::PARTIAL_CONTENT.as_u16()),
            format!("Content-Range '{value}' does not match requested {}", task.range_header()),
        )),
    }
}

/// Every chunk must carry exactly the bytes it asked for.
fn check_range_length(bytes: &Bytes, task: ChunkTask) -> PipelineResult<()> {
    let len = bytes.len() as u64;
    if len != task.byte_len() {
        return Err(PipelineError::fetch(
            task.offset,
            None,
            format!(
                "origin returned {len} bytes for {}, expected {}",
                task.range_header(),
                task.byte_len()
            ),
        ));
    }
    Ok(())
}

/// An origin that ignores `Range` answers 200 with the full body.
fn slice_full_body(body: Bytes, task: ChunkTask) -> PipelineResult<Bytes> {
    let len = body.len() as u64;
    if len == task.byte_len() && task.offset == 0 {
        return Ok(body);
    }
    if len > task.end_inclusive {
        debug!(offset = task.offset, "Origin ignored Range, slicing full body");
        return Ok(body.slice(task.offset as usize..=task.end_inclusive as usize));
    }
    Err(PipelineError::fetch(
        task.offset,
        Some(StatusCode::OK.as_u16()),
        format!(
            "origin ignored Range and returned {len} bytes, short of byte {}",
            task.end_inclusive
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_full_body() {
        let body = Bytes::from_static(b"0123456789");
        let task = ChunkTask {
            offset: 4,
            end_inclusive: 6,
        };
        assert_eq!(slice_full_body(body.clone(), task).unwrap(), "456");

        let first = ChunkTask {
            offset: 0,
            end_inclusive: 9,
        };
        assert_eq!(slice_full_body(body.clone(), first).unwrap(), body);

        let beyond = ChunkTask {
            offset: 8,
            end_inclusive: 15,
        };
        assert!(matches!(
            slice_full_body(body, beyond),
            Err(PipelineError::Fetch { offset: 8, .. })
        ));
    }

    #[test]
    fn test_range_length_must_match_task() {
        let task = ChunkTask {
            offset: 1000,
            end_inclusive: 1009,
        };
        assert!(check_range_length(&Bytes::from_static(b"0123456789"), task).is_ok());

        let short = check_range_length(&Bytes::from_static(b"01234"), task);
        assert!(matches!(short, Err(PipelineError::Fetch { offset: 1000, .. })));

        let long = check_range_length(&Bytes::from_static(b"0123456789AB"), task);
        assert!(matches!(long, Err(PipelineError::Fetch { offset: 1000, .. })));
    }

    #[test]
    fn test_content_range_start_must_match_task() {
        let task = ChunkTask {
            offset: 500,
            end_inclusive: 999,
        };
        assert!(check_content_range_start(Some("bytes 500-999/2000"), task).is_ok());
        assert!(check_content_range_start(None, task).is_ok());
        assert!(matches!(
            check_content_range_start(Some("bytes 0-499/2000"), task),
            Err(PipelineError::Fetch {
                offset: 500,
                status: Some(206),
                ..
            })
        ));
        assert!(check_content_range_start(Some("bytes */2000"), task).is_err());
    }

    #[test]
    fn test_auth_failure_statuses() {
        assert!(is_auth_failure(StatusCode::UNAUTHORIZED));
        assert!(is_auth_failure(StatusCode::FORBIDDEN));
        assert!(!is_auth_failure(StatusCode::NOT_FOUND));
    }
}
