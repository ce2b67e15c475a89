//! `/transcribe` endpoint.
//!
//! Accepts the media reference either as query parameters (`GET`) or as a
//! JSON body (`POST`):
//!
//! ```json
//! { "url": "https://example.com/episode/42", "chunk_size": 4194304, "parallel": 4 }
//! ```
//!
//! `chunk_size` and `parallel` are optional; non-positive or non-numeric
//! values are ignored and the computed defaults apply.

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use url::Url;

use crate::auth::Auth;
use crate::core::assembler::TranscriptPayload;
use crate::core::pipeline::TranscriptionRequest;
use crate::core::strategy::StrategyOverrides;
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Transcription request parameters
#[derive(Debug, Default, Deserialize)]
pub struct TranscribeParams {
    /// Media reference: a direct media URL or a page/share URL to resolve
    #[serde(default)]
    pub url: Option<String>,
    /// Chunk size override in bytes
    #[serde(default, deserialize_with = "lenient_positive")]
    pub chunk_size: Option<u64>,
    /// Parallelism override
    #[serde(default, alias = "parallelism", deserialize_with = "lenient_positive")]
    pub parallel: Option<u64>,
}

impl TranscribeParams {
    /// Validate the reference and build a pipeline request.
    pub fn into_request(self) -> AppResult<TranscriptionRequest> {
        let reference = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing required parameter: url".to_string()))?;

        let parsed = Url::parse(reference)
            .map_err(|e| AppError::BadRequest(format!("Invalid url '{reference}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::BadRequest(format!(
                "Invalid url '{reference}': only http and https are supported"
            )));
        }

        let parallel = self.parallel.and_then(|p| usize::try_from(p).ok());
        Ok(TranscriptionRequest::new(reference)
            .with_overrides(StrategyOverrides::new(self.chunk_size, parallel)))
    }
}

/// Accept numbers or numeric strings; anything else (or a non-positive value) becomes `None`.
fn lenient_positive<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(positive_integer))
}

fn positive_integer(value: &Value) -> Option<u64> {
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 1.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.filter(|v| *v > 0)
}

/// `GET /transcribe?url=...&chunk_size=...&parallel=...`
pub async fn transcribe_get(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    params: Result<Query<TranscribeParams>, QueryRejection>,
) -> AppResult<Json<TranscriptPayload>> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    run_transcription(&state, &auth, params).await
}

/// `POST /transcribe` with a JSON body
pub async fn transcribe_post(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    params: Result<Json<TranscribeParams>, JsonRejection>,
) -> AppResult<Json<TranscriptPayload>> {
    let Json(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    run_transcription(&state, &auth, params).await
}

async fn run_transcription(
    state: &AppState,
    auth: &Auth,
    params: TranscribeParams,
) -> AppResult<Json<TranscriptPayload>> {
    let request = params.into_request()?;

    info!(
        auth_id = ?auth.id,
        chunk_size = ?request.overrides.chunk_size,
        parallel = ?request.overrides.parallelism,
        "Transcription requested"
    );

    let payload = state.pipeline.run(request).await?;
    Ok(Json(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> TranscribeParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_overrides_parsed_leniently() {
        let p = params(json!({"url": "https://a.example/x.mp3", "chunk_size": "4096", "parallel": 3}));
        assert_eq!(p.chunk_size, Some(4096));
        assert_eq!(p.parallel, Some(3));

        let p = params(json!({"url": "https://a.example/x.mp3", "chunk_size": "abc", "parallel": -2}));
        assert_eq!(p.chunk_size, None);
        assert_eq!(p.parallel, None);

        let p = params(json!({"url": "https://a.example/x.mp3", "chunk_size": 0, "parallelism": "5"}));
        assert_eq!(p.chunk_size, None);
        assert_eq!(p.parallel, Some(5));

        let p = params(json!({"url": "https://a.example/x.mp3", "chunk_size": null, "parallel": true}));
        assert_eq!(p.chunk_size, None);
        assert_eq!(p.parallel, None);
    }

    #[test]
    fn test_into_request() {
        let request = params(json!({"url": "  https://a.example/x.mp3 ", "chunk_size": 1024}))
            .into_request()
            .unwrap();
        assert_eq!(request.reference, "https://a.example/x.mp3");
        assert_eq!(request.overrides.chunk_size, Some(1024));
        assert_eq!(request.overrides.parallelism, None);
    }

    #[test]
    fn test_missing_or_invalid_url_rejected() {
        for value in [
            json!({}),
            json!({"url": "   "}),
            json!({"url": "not a url"}),
            json!({"url": "ftp://a.example/x.mp3"}),
        ] {
            assert!(matches!(
                params(value).into_request(),
                Err(AppError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn test_query_string_params() {
        let uri: axum::http::Uri = "/transcribe?url=https%3A%2F%2Fa.example%2Fx.mp3&chunk_size=2048&parallel=x"
            .parse()
            .unwrap();
        let Query(p) = Query::<TranscribeParams>::try_from_uri(&uri).unwrap();
        assert_eq!(p.url.as_deref(), Some("https://a.example/x.mp3"));
        assert_eq!(p.chunk_size, Some(2048));
        assert_eq!(p.parallel, None);
    }
}
