//! Outbound media requests with a per-hop SSRF check.
//!
//! The underlying client never follows redirects on its own. Every
//! `Location` is resolved against the current URL and passed through
//! [`validate_media_url`] before it is requested, so an origin cannot bounce
//! a fetch onto a private or metadata address.

use reqwest::header::{LOCATION, RANGE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::error::{PipelineError, PipelineResult};
use crate::utils::url_validation::validate_media_url;

/// Redirect hops followed before a request is abandoned.
pub const MAX_REDIRECTS: usize = 10;

/// HTTP client for origin requests. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GuardedClient {
    http_client: Client,
    allow_private_sources: bool,
}

impl GuardedClient {
    pub fn new(allow_private_sources: bool) -> PipelineResult<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(32)
            .redirect(Policy::none())
            .user_agent(concat!("Transcribe-Gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::fetch(0, None, format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            allow_private_sources,
        })
    }

    /// `GET url`, optionally with a `Range` header, following redirects
    /// through the address guard.
    ///
    /// `url` itself must already have been validated. Errors are reported
    /// as [`PipelineError::Fetch`] at `offset`.
    pub async fn get(
        &self,
        url: &str,
        range: Option<&str>,
        timeout: Duration,
        offset: u64,
    ) -> PipelineResult<Response> {
        let mut current = Url::parse(url)
            .map_err(|e| PipelineError::fetch(offset, None, format!("invalid URL: {e}")))?;

        for hop in 0..=MAX_REDIRECTS {
            let mut request = self.http_client.get(current.clone()).timeout(timeout);
            if let Some(range) = range {
                request = request.header(RANGE, range);
            }

            let response = request
                .send()
                .await
                .map_err(|e| PipelineError::fetch(offset, None, format!("request failed: {e}")))?;

            if !response.status().is_redirection() {
                return Ok(response);
            }
            if hop == MAX_REDIRECTS {
                break;
            }

            current = self.next_hop(&current, &response, offset).await?;
            debug!(offset, hop = hop + 1, "Following redirect");
        }

        Err(PipelineError::fetch(
            offset,
            None,
            format!("more than {MAX_REDIRECTS} redirects"),
        ))
    }

    async fn next_hop(&self, current: &Url, response: &Response, offset: u64) -> PipelineResult<Url> {
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PipelineError::fetch(offset, Some(status), "redirect without a Location header")
            })?;

        let next = current.join(location).map_err(|e| {
            PipelineError::fetch(offset, Some(status), format!("invalid redirect target: {e}"))
        })?;

        if let Err(e) = validate_media_url(next.as_str(), self.allow_private_sources).await {
            warn!(offset, status, error = %e, "Redirect target refused");
            return Err(PipelineError::fetch(
                offset,
                Some(status),
                format!("redirect refused: {e}"),
            ));
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn redirect_to(location: &str) -> ResponseTemplate {
        ResponseTemplate::new(302).insert_header("location", location)
    }

    #[tokio::test]
    async fn test_follows_redirect_when_target_allowed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.mp3"))
            .respond_with(redirect_to("/cdn/a.mp3"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/a.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 4]))
            .expect(1)
            .mount(&server)
            .await;

        let client = GuardedClient::new(true).unwrap();
        let response = client
            .get(&format!("{}/a.mp3", server.uri()), None, TIMEOUT, 0)
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_redirect_to_loopback_refused() {
        let server = MockServer::start().await;
        let internal = format!("{}/internal/secret.mp3", server.uri());
        Mock::given(method("GET"))
            .and(path("/a.mp3"))
            .respond_with(redirect_to(&internal))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/internal/secret.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 4]))
            .expect(0)
            .mount(&server)
            .await;

        let client = GuardedClient::new(false).unwrap();
        let err = client
            .get(&format!("{}/a.mp3", server.uri()), Some("bytes=0-0"), TIMEOUT, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Fetch {
                status: Some(302),
                ..
            }
        ));
        assert!(err.to_string().contains("redirect refused"));
    }

    #[tokio::test]
    async fn test_redirect_to_metadata_address_refused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(redirect_to("http://169.254.169.254/latest/meta-data/"))
            .mount(&server)
            .await;

        let client = GuardedClient::new(false).unwrap();
        let err = client
            .get(&format!("{}/a.mp3", server.uri()), None, TIMEOUT, 4096)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { offset: 4096, .. }));
    }

    #[tokio::test]
    async fn test_redirect_loop_abandoned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop.mp3"))
            .respond_with(redirect_to("/loop.mp3"))
            .expect(MAX_REDIRECTS as u64 + 1)
            .mount(&server)
            .await;

        let client = GuardedClient::new(true).unwrap();
        let err = client
            .get(&format!("{}/loop.mp3", server.uri()), None, TIMEOUT, 0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("redirects"));
    }

    #[tokio::test]
    async fn test_redirect_without_location() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(301))
            .mount(&server)
            .await;

        let client = GuardedClient::new(true).unwrap();
        let err = client
            .get(&format!("{}/a.mp3", server.uri()), None, TIMEOUT, 0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Location"));
    }
}
