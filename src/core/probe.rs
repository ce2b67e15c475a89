//! Size probing with a one-byte range request.
//!
//! Probing is advisory: any failure yields [`ProbeOutcome::Unknown`], which
//! routes the job to the whole-file fallback instead of failing it.

use reqwest::header::CONTENT_RANGE;
use std::time::Duration;
use tracing::{debug, warn};

use super::redirect::GuardedClient;

/// Result of a size probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The origin reported the total size of the resource
    Known { total_size: u64 },
    /// No usable size indicator; treated as size 0
    Unknown { reason: String },
}

impl ProbeOutcome {
    /// Total size in bytes, 0 when unknown.
    pub fn total_size(&self) -> u64 {
        match self {
            Self::Known { total_size } => *total_size,
            Self::Unknown { .. } => 0,
        }
    }
}

/// Parse the total from a `Content-Range` value such as `bytes 0-0/12345`.
///
/// Returns `None` for an unknown (`*`) or zero total.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let value = value.trim();
    let rest = value
        .strip_prefix("bytes")
        .map(str::trim_start)
        .unwrap_or(value);
    let (_, total) = rest.rsplit_once('/')?;
    total.trim().parse::<u64>().ok().filter(|t| *t > 0)
}

/// Issues `Range: bytes=0-0` requests.
pub struct SizeProber {
    http_client: GuardedClient,
    timeout: Duration,
}

impl SizeProber {
    pub fn new(http_client: GuardedClient, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }

    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        let response = match self
            .http_client
            .get(url, Some("bytes=0-0"), self.timeout, 0)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Size probe failed, size unknown");
                return ProbeOutcome::Unknown {
                    reason: format!("probe request failed: {e}"),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Size probe rejected, size unknown");
            return ProbeOutcome::Unknown {
                reason: format!("probe returned {status}"),
            };
        }

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        match total {
            Some(total_size) => {
                debug!(total_size, "Size probe succeeded");
                ProbeOutcome::Known { total_size }
            }
            None => ProbeOutcome::Unknown {
                reason: "no usable Content-Range total".to_string(),
            },
        }
    }
}
