//! Payload sanity checks applied before anything is sent for transcription.
//!
//! Origins and CDNs that fail often still answer with a success status and an
//! HTML error page or a JSON error object. These checks catch such bodies by
//! looking at their leading bytes.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{PipelineError, PipelineResult};

/// How many leading bytes are inspected.
const SNIFF_LEN: usize = 512;

static MARKUP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*<(?:!doctype|html|\?xml|head|body)").expect("Invalid regex pattern")
});

static ERROR_OBJECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*\{\s*"(?:error|errors|message|code|status)"\s*:"#)
        .expect("Invalid regex pattern")
});

/// Reject empty payloads and payloads that are markup or an error object.
pub fn validate_payload(bytes: &[u8], offset: u64) -> PipelineResult<()> {
    if bytes.is_empty() {
        return Err(PipelineError::validation(offset, "empty payload"));
    }

    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start_matches('\u{feff}');

    if MARKUP_PATTERN.is_match(head) {
        return Err(PipelineError::validation(
            offset,
            "payload looks like an HTML/XML document, not media",
        ));
    }
    if ERROR_OBJECT_PATTERN.is_match(head) {
        return Err(PipelineError::validation(
            offset,
            "payload looks like a JSON error object, not media",
        ));
    }
    Ok(())
}

/// Require an `audio/*`, `video/*` or `application/ogg` content type.
///
/// Only applied to whole-file fetches; range responses are often served as
/// `application/octet-stream`.
pub fn validate_content_type(content_type: Option<&str>) -> PipelineResult<()> {
    let Some(raw) = content_type else {
        return Err(PipelineError::validation(0, "response has no Content-Type"));
    };

    let essence = raw.split(';').next().unwrap_or(raw).trim().to_ascii_lowercase();
    if essence.starts_with("audio/") || essence.starts_with("video/") || essence == "application/ogg"
    {
        Ok(())
    } else {
        Err(PipelineError::validation(
            0,
            format!("unexpected Content-Type '{raw}' for media"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_binary_media() {
        let mut mp3 = b"ID3\x04\x00".to_vec();
        mp3.extend_from_slice(&[0xff, 0xfb, 0x90, 0x64]);
        assert!(validate_payload(&mp3, 0).is_ok());
        assert!(validate_payload(&[0u8, 1, 2, 3], 8).is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        let err = validate_payload(&[], 16).unwrap_err();
        assert!(matches!(err, PipelineError::Validation { offset: 16, .. }));
    }

    #[test]
    fn test_rejects_markup() {
        for body in [
            "<!DOCTYPE html><html>",
            "  \n<html lang=\"en\">",
            "<?xml version=\"1.0\"?><Error>",
            "<HEAD><title>403</title>",
            "\u{feff}<body>denied</body>",
        ] {
            assert!(
                validate_payload(body.as_bytes(), 0).is_err(),
                "should reject {body:?}"
            );
        }
    }

    #[test]
    fn test_rejects_error_objects() {
        for body in [
            r#"{"error": "expired"}"#,
            r#"  { "message" : "Access denied" }"#,
            r#"{"status":403}"#,
        ] {
            assert!(validate_payload(body.as_bytes(), 0).is_err());
        }
        // Other JSON is not assumed to be an error
        assert!(validate_payload(br#"{"title": "x"}"#, 0).is_ok());
    }

    #[test]
    fn test_content_type_patterns() {
        assert!(validate_content_type(Some("audio/mpeg")).is_ok());
        assert!(validate_content_type(Some("video/mp4; codecs=avc1")).is_ok());
        assert!(validate_content_type(Some("Application/Ogg")).is_ok());
        assert!(validate_content_type(Some("text/html; charset=utf-8")).is_err());
        assert!(validate_content_type(Some("application/octet-stream")).is_err());
        assert!(validate_content_type(None).is_err());
    }
}
