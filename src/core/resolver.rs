//! Resolver client: turns an input reference into a directly fetchable URL.
//!
//! References whose path already ends in a known media extension are used as
//! is. Anything else (a page URL, a share link) is sent to an external
//! resolver service that answers with a direct, usually time-limited,
//! download URL.
//!
//! The client is invoked once up front and once more when a fetch reports
//! that the download authorization expired (see [`crate::core::source`]).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::error::{PipelineError, PipelineResult};
use crate::utils::url_validation::validate_media_url;

// =============================================================================
// Media Extensions
// =============================================================================

/// Path extensions that mark a reference as already being a media file.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "mp4", "m4a", "m4b", "aac", "wav", "flac", "ogg", "oga", "opus", "webm", "mkv", "mov",
    "mpeg", "mpga", "mpg", "avi", "3gp",
];

/// Default timeout for resolver calls.
pub const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 30;

/// Return the recognized media extension of a URL's path, if any.
///
/// The query string and fragment are ignored, so signed CDN links such as
/// `https://cdn.example.com/talk.mp3?sig=abc` are recognized.
pub fn media_extension(url: &str) -> Option<&'static str> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };

    let file_name = path.rsplit('/').next()?;
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();

    MEDIA_EXTENSIONS
        .iter()
        .copied()
        .find(|known| *known == extension)
}

/// True when the reference can be fetched directly without resolution.
#[inline]
pub fn has_media_extension(reference: &str) -> bool {
    media_extension(reference).is_some()
}

// =============================================================================
// Resolver Service
// =============================================================================

/// External service that maps a reference to a direct download URL.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolve `reference` into a URL usable for byte-range retrieval.
    async fn resolve(&self, reference: &str) -> PipelineResult<String>;
}

/// Settings for [`HttpResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Endpoint that accepts `POST {"url": reference}`
    pub endpoint: Option<String>,
    /// Bearer credential for the endpoint
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: DEFAULT_RESOLVER_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Serialize)]
struct ResolveRequest<'a> {
    url: &'a str,
}

/// Resolver answers seen in the wild use several field names for the link.
#[derive(Debug, Default, Deserialize)]
struct ResolveResponse {
    url: Option<String>,
    download_url: Option<String>,
    #[serde(rename = "downloadUrl")]
    download_url_camel: Option<String>,
    data: Option<ResolveResponseData>,
}

#[derive(Debug, Default, Deserialize)]
struct ResolveResponseData {
    url: Option<String>,
}

impl ResolveResponse {
    fn into_download_url(self) -> Option<String> {
        [
            self.url,
            self.download_url,
            self.download_url_camel,
            self.data.and_then(|d| d.url),
        ]
        .into_iter()
        .flatten()
        .map(|u| u.trim().to_string())
        .find(|u| is_http_url(u))
    }
}

fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// [`MediaResolver`] backed by an HTTP JSON endpoint.
pub struct HttpResolver {
    config: ResolverConfig,
    http_client: Client,
}

impl HttpResolver {
    pub fn new(config: ResolverConfig) -> PipelineResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                PipelineError::resolution(None, format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl MediaResolver for HttpResolver {
    async fn resolve(&self, reference: &str) -> PipelineResult<String> {
        let endpoint = self.config.endpoint.as_deref().ok_or_else(|| {
            PipelineError::resolution(
                None,
                "reference has no media extension and no resolver endpoint is configured",
            )
        })?;

        debug!(endpoint = %endpoint, "Calling resolver service");

        let mut request = self
            .http_client
            .post(endpoint)
            .json(&ResolveRequest { url: reference });
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::resolution(None, format!("resolver unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Resolver rejected reference");
            return Err(PipelineError::resolution(
                Some(status.as_u16()),
                format!("resolver returned {status}: {}", truncate(&body, 200)),
            ));
        }

        let parsed: ResolveResponse = response.json().await.map_err(|e| {
            PipelineError::resolution(
                Some(status.as_u16()),
                format!("malformed resolver response: {e}"),
            )
        })?;

        parsed.into_download_url().ok_or_else(|| {
            PipelineError::resolution(
                Some(status.as_u16()),
                "malformed resolver response: no usable download URL",
            )
        })
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

// =============================================================================
// Resolver Client
// =============================================================================

/// Resolution entry point used by the pipeline.
///
/// Applies the media-extension shortcut and checks every URL it hands out
/// against the SSRF guard.
pub struct ResolverClient {
    resolver: Arc<dyn MediaResolver>,
    allow_private_sources: bool,
}

impl ResolverClient {
    pub fn new(resolver: Arc<dyn MediaResolver>, allow_private_sources: bool) -> Self {
        Self {
            resolver,
            allow_private_sources,
        }
    }

    /// Resolve `reference` to a URL that is safe to fetch.
    ///
    /// A caller URL that fails the guard is an [`PipelineError::InvalidReference`].
    /// A resolver answer that fails it is a [`PipelineError::Resolution`],
    /// since the caller had no say in it.
    pub async fn resolve(&self, reference: &str) -> PipelineResult<String> {
        if has_media_extension(reference) {
            debug!("Reference has a media extension, skipping resolver");
            validate_media_url(reference, self.allow_private_sources)
                .await
                .map_err(|e| PipelineError::InvalidReference(e.to_string()))?;
            return Ok(reference.to_string());
        }

        let url = self.resolver.resolve(reference).await?;
        if let Err(e) = validate_media_url(&url, self.allow_private_sources).await {
            warn!(error = %e, "Resolver returned a URL that fails the address guard");
            return Err(PipelineError::resolution(
                None,
                format!("resolver returned a URL that cannot be fetched: {e}"),
            ));
        }
        info!("Reference resolved to a direct download URL");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver_for(server: &MockServer) -> HttpResolver {
        HttpResolver::new(ResolverConfig {
            endpoint: Some(format!("{}/resolve", server.uri())),
            api_key: Some("resolver-key".to_string()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_media_extension_detection() {
        assert_eq!(media_extension("https://a.example/x/talk.MP3"), Some("mp3"));
        assert_eq!(
            media_extension("https://a.example/v.webm?token=abc#t=10"),
            Some("webm")
        );
        assert_eq!(media_extension("https://a.example/clip.3gp"), Some("3gp"));
        assert_eq!(media_extension("https://a.example/watch?v=mp3"), None);
        assert_eq!(media_extension("https://a.example/page.html"), None);
        assert_eq!(media_extension("https://a.example/"), None);
    }

    #[test]
    fn test_download_url_field_precedence() {
        let response: ResolveResponse =
            serde_json::from_value(json!({"downloadUrl": "https://cdn.example/a.mp3"})).unwrap();
        assert_eq!(
            response.into_download_url().as_deref(),
            Some("https://cdn.example/a.mp3")
        );

        let response: ResolveResponse =
            serde_json::from_value(json!({"data": {"url": "https://cdn.example/b.m4a"}}))
                .unwrap();
        assert_eq!(
            response.into_download_url().as_deref(),
            Some("https://cdn.example/b.m4a")
        );

        let response: ResolveResponse =
            serde_json::from_value(json!({"url": "", "download_url": "ftp://x/y"})).unwrap();
        assert!(response.into_download_url().is_none());
    }

    #[tokio::test]
    async fn test_resolver_posts_reference_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resolve"))
            .and(header("authorization", "Bearer resolver-key"))
            .and(body_json(json!({"url": "https://video.example/watch/42"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"download_url": "https://cdn.example/42.mp4"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = resolver_for(&server)
            .resolve("https://video.example/watch/42")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/42.mp4");
    }

    #[tokio::test]
    async fn test_resolver_non_success_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = resolver_for(&server)
            .resolve("https://video.example/watch/42")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Resolution {
                status: Some(502),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_resolver_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let err = resolver_for(&server)
            .resolve("https://video.example/watch/42")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_resolution_error() {
        let resolver = HttpResolver::new(ResolverConfig::default()).unwrap();
        let err = resolver.resolve("https://video.example/watch/42").await;
        assert!(matches!(err, Err(PipelineError::Resolution { .. })));
    }

    #[tokio::test]
    async fn test_client_skips_resolver_for_media_urls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = ResolverClient::new(Arc::new(resolver_for(&server)), true);
        let url = client
            .resolve("http://127.0.0.1:9/audio/episode.mp3")
            .await
            .unwrap();
        assert_eq!(url, "http://127.0.0.1:9/audio/episode.mp3");
    }

    #[tokio::test]
    async fn test_client_rejects_private_targets() {
        let server = MockServer::start().await;
        let client = ResolverClient::new(Arc::new(resolver_for(&server)), false);
        let err = client
            .resolve("http://127.0.0.1/audio/episode.mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_private_url_from_resolver_is_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resolve"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": "http://169.254.169.254/latest/meta-data/audio.mp3"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ResolverClient::new(Arc::new(resolver_for(&server)), false);
        let err = client
            .resolve("https://video.example/watch/42")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Resolution { status: None, .. }));
        assert!(err.to_string().contains("cannot be fetched"));
    }
}
