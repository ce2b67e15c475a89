//! Configuration validation run after merging.

use std::collections::HashSet;

use super::{AuthApiSecret, ServerConfig, TlsConfig};
use crate::core::pipeline::PipelineConfig;

/// Run every check against a merged configuration.
pub(super) fn validate_server_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_port(config.port)?;
    validate_tls(&config.tls)?;
    validate_pipeline(&config.pipeline)?;
    validate_auth_api_secrets(&config.auth_api_secrets)?;
    validate_auth_required(config.auth_required, &config.auth_api_secrets)?;
    validate_rate_limit(
        config.rate_limit_requests_per_second,
        config.rate_limit_burst_size,
    )?;
    Ok(())
}

fn validate_port(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    if port == 0 {
        return Err("PORT must be between 1 and 65535".into());
    }
    Ok(())
}

fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(tls) = tls {
        if !tls.cert_path.exists() {
            return Err(format!(
                "TLS certificate file not found: {}",
                tls.cert_path.display()
            )
            .into());
        }
        if !tls.key_path.exists() {
            return Err(format!("TLS key file not found: {}", tls.key_path.display()).into());
        }
    }
    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    pipeline
        .strategy
        .validate()
        .map_err(|e| format!("Invalid pipeline configuration: {e}"))?;
    if pipeline.fetch_timeout_secs == 0 || pipeline.probe_timeout_secs == 0 {
        return Err("Pipeline fetch and probe timeouts must be positive".into());
    }
    Ok(())
}

fn validate_auth_api_secrets(secrets: &[AuthApiSecret]) -> Result<(), Box<dyn std::error::Error>> {
    let mut seen = HashSet::new();
    for entry in secrets {
        if entry.id.trim().is_empty() {
            return Err("Auth API secret entries must have a non-empty id".into());
        }
        if entry.secret.trim().is_empty() {
            return Err(format!("Auth API secret '{}' is empty", entry.id).into());
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(format!("Duplicate auth API secret id: {}", entry.id).into());
        }
    }
    Ok(())
}

fn validate_auth_required(
    auth_required: bool,
    secrets: &[AuthApiSecret],
) -> Result<(), Box<dyn std::error::Error>> {
    if auth_required && secrets.is_empty() {
        return Err(
            "AUTH_REQUIRED is set but no API secrets are configured \
             (AUTH_API_SECRETS_JSON, AUTH_API_SECRET or auth.api_secrets)"
                .into(),
        );
    }
    Ok(())
}

fn validate_rate_limit(rps: u32, burst: u32) -> Result<(), Box<dyn std::error::Error>> {
    if rps == 0 || burst == 0 {
        return Err("Rate limit requests per second and burst size must be positive".into());
    }
    Ok(())
}
