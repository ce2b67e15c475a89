//! Merge environment variables (base) with YAML overrides.
//!
//! | Setting | Environment variable | YAML key |
//! |---------|----------------------|----------|
//! | host / port | `HOST`, `PORT` | `server.host`, `server.port` |
//! | TLS | `TLS_ENABLED`, `TLS_CERT_PATH`, `TLS_KEY_PATH` | `server.tls.*` |
//! | resolver | `RESOLVER_URL`, `RESOLVER_API_KEY`, `RESOLVER_TIMEOUT_SECONDS` | `resolver.*` |
//! | engine | `STT_PROVIDER`, `GROQ_API_KEY`, `OPENAI_API_KEY`, `STT_MODEL`, `STT_LANGUAGE`, `STT_PROMPT`, `STT_BASE_URL`, `STT_TIMEOUT_SECONDS` | `transcription.*` |
//! | thresholds | `PIPELINE_*_MB`, `PIPELINE_*_PARALLELISM` | `pipeline.*` |
//! | plan limits | `PIPELINE_MIN_CHUNK_KB`, `PIPELINE_MAX_CHUNKS` | `pipeline.min_chunk_kb`, `pipeline.max_chunks` |
//! | timeouts | `FETCH_TIMEOUT_SECONDS`, `PROBE_TIMEOUT_SECONDS` | `pipeline.*_timeout_seconds` |
//! | SSRF | `ALLOW_PRIVATE_SOURCES` | `pipeline.allow_private_sources` |
//! | auth | `AUTH_REQUIRED`, `AUTH_API_SECRETS_JSON`, `AUTH_API_SECRET`, `AUTH_API_SECRET_ID` | `auth.*` |
//! | security | `CORS_ALLOWED_ORIGINS`, `RATE_LIMIT_REQUESTS_PER_SECOND`, `RATE_LIMIT_BURST_SIZE` | `security.*` |

use std::path::PathBuf;

use super::env::{get_env, parse_bool_env, parse_env};
use super::yaml::YamlConfig;
use super::{AuthApiSecret, ServerConfig, TlsConfig, parse_auth_api_secrets_json};
use crate::core::stt::STTProvider;
use crate::core::strategy::{KB, MB, StrategyConfig};

/// Id given to a secret supplied through `AUTH_API_SECRET` or `auth.api_secret`.
const DEFAULT_API_SECRET_ID: &str = "default";

/// Build the final configuration: defaults, then environment, then YAML.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();
    apply_env(&mut config)?;
    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml)?;
    }
    Ok(config)
}

fn apply_env(config: &mut ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = get_env("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_env::<u16>("PORT")? {
        config.port = port;
    }

    let tls_enabled = parse_bool_env("TLS_ENABLED")?;
    let cert = get_env("TLS_CERT_PATH");
    let key = get_env("TLS_KEY_PATH");
    config.tls = build_tls(tls_enabled, cert, key)?;

    config.resolver_url = get_env("RESOLVER_URL");
    config.resolver_api_key = get_env("RESOLVER_API_KEY");
    if let Some(timeout) = parse_env::<u64>("RESOLVER_TIMEOUT_SECONDS")? {
        config.resolver_timeout_seconds = timeout;
    }

    if let Some(provider) = get_env("STT_PROVIDER") {
        config.stt_provider = parse_provider(&provider)?;
    }
    config.groq_api_key = get_env("GROQ_API_KEY");
    config.openai_api_key = get_env("OPENAI_API_KEY");
    config.stt_model = get_env("STT_MODEL");
    config.stt_language = get_env("STT_LANGUAGE");
    config.stt_prompt = get_env("STT_PROMPT");
    config.stt_base_url = get_env("STT_BASE_URL");
    if let Some(timeout) = parse_env::<u64>("STT_TIMEOUT_SECONDS")? {
        config.stt_timeout_seconds = timeout;
    }

    let strategy = &mut config.pipeline.strategy;
    set_mb(
        &mut strategy.single_shot_max_bytes,
        parse_env("PIPELINE_SINGLE_SHOT_MAX_MB")?,
    );
    set_mb(&mut strategy.medium_max_bytes, parse_env("PIPELINE_MEDIUM_MAX_MB")?);
    set_mb(&mut strategy.medium_chunk_size, parse_env("PIPELINE_MEDIUM_CHUNK_MB")?);
    set_mb(
        &mut strategy.medium_large_threshold_bytes,
        parse_env("PIPELINE_MEDIUM_LARGE_THRESHOLD_MB")?,
    );
    set_mb(
        &mut strategy.medium_large_chunk_size,
        parse_env("PIPELINE_MEDIUM_LARGE_CHUNK_MB")?,
    );
    set(
        &mut strategy.medium_parallelism,
        parse_env("PIPELINE_MEDIUM_PARALLELISM")?,
    );
    set_mb(&mut strategy.safe_chunk_size, parse_env("PIPELINE_SAFE_CHUNK_MB")?);
    set(
        &mut strategy.safe_parallelism,
        parse_env("PIPELINE_SAFE_PARALLELISM")?,
    );
    set_kb(&mut strategy.min_chunk_size, parse_env("PIPELINE_MIN_CHUNK_KB")?);
    set(&mut strategy.max_chunk_count, parse_env("PIPELINE_MAX_CHUNKS")?);
    set(
        &mut config.pipeline.fetch_timeout_secs,
        parse_env("FETCH_TIMEOUT_SECONDS")?,
    );
    set(
        &mut config.pipeline.probe_timeout_secs,
        parse_env("PROBE_TIMEOUT_SECONDS")?,
    );
    set(
        &mut config.pipeline.allow_private_sources,
        parse_bool_env("ALLOW_PRIVATE_SOURCES")?,
    );

    set(&mut config.auth_required, parse_bool_env("AUTH_REQUIRED")?);
    config.auth_api_secrets = if let Some(json) = get_env("AUTH_API_SECRETS_JSON") {
        parse_auth_api_secrets_json(&json)?
    } else if let Some(secret) = get_env("AUTH_API_SECRET") {
        vec![AuthApiSecret {
            id: get_env("AUTH_API_SECRET_ID").unwrap_or_else(|| DEFAULT_API_SECRET_ID.to_string()),
            secret,
        }]
    } else {
        Vec::new()
    };

    config.cors_allowed_origins = get_env("CORS_ALLOWED_ORIGINS");
    set(
        &mut config.rate_limit_requests_per_second,
        parse_env("RATE_LIMIT_REQUESTS_PER_SECOND")?,
    );
    set(
        &mut config.rate_limit_burst_size,
        parse_env("RATE_LIMIT_BURST_SIZE")?,
    );

    Ok(())
}

fn apply_yaml(config: &mut ServerConfig, yaml: YamlConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(server) = yaml.server {
        set(&mut config.host, server.host);
        set(&mut config.port, server.port);
        if let Some(tls) = server.tls {
            let current = config.tls.take();
            let cert = tls
                .cert_path
                .or_else(|| current.as_ref().map(|t| t.cert_path.display().to_string()));
            let key = tls
                .key_path
                .or_else(|| current.as_ref().map(|t| t.key_path.display().to_string()));
            let enabled = tls.enabled.or(current.as_ref().map(|_| true));
            config.tls = build_tls(enabled, cert, key)?;
        }
    }

    if let Some(resolver) = yaml.resolver {
        set_some(&mut config.resolver_url, resolver.url);
        set_some(&mut config.resolver_api_key, resolver.api_key);
        set(&mut config.resolver_timeout_seconds, resolver.timeout_seconds);
    }

    if let Some(stt) = yaml.transcription {
        if let Some(provider) = stt.provider {
            config.stt_provider = parse_provider(&provider)?;
        }
        set_some(&mut config.groq_api_key, stt.groq_api_key);
        set_some(&mut config.openai_api_key, stt.openai_api_key);
        set_some(&mut config.stt_model, stt.model);
        set_some(&mut config.stt_language, stt.language);
        set_some(&mut config.stt_prompt, stt.prompt);
        set_some(&mut config.stt_base_url, stt.base_url);
        set(&mut config.stt_timeout_seconds, stt.timeout_seconds);
    }

    if let Some(pipeline) = yaml.pipeline {
        let strategy: &mut StrategyConfig = &mut config.pipeline.strategy;
        set_mb(&mut strategy.single_shot_max_bytes, pipeline.single_shot_max_mb);
        set_mb(&mut strategy.medium_max_bytes, pipeline.medium_max_mb);
        set_mb(&mut strategy.medium_chunk_size, pipeline.medium_chunk_mb);
        set_mb(
            &mut strategy.medium_large_threshold_bytes,
            pipeline.medium_large_threshold_mb,
        );
        set_mb(
            &mut strategy.medium_large_chunk_size,
            pipeline.medium_large_chunk_mb,
        );
        set(&mut strategy.medium_parallelism, pipeline.medium_parallelism);
        set_mb(&mut strategy.safe_chunk_size, pipeline.safe_chunk_mb);
        set(&mut strategy.safe_parallelism, pipeline.safe_parallelism);
        set_kb(&mut strategy.min_chunk_size, pipeline.min_chunk_kb);
        set(&mut strategy.max_chunk_count, pipeline.max_chunks);
        set(
            &mut config.pipeline.fetch_timeout_secs,
            pipeline.fetch_timeout_seconds,
        );
        set(
            &mut config.pipeline.probe_timeout_secs,
            pipeline.probe_timeout_seconds,
        );
        set(
            &mut config.pipeline.allow_private_sources,
            pipeline.allow_private_sources,
        );
    }

    if let Some(auth) = yaml.auth {
        set(&mut config.auth_required, auth.required);
        if !auth.api_secrets.is_empty() {
            config.auth_api_secrets = auth
                .api_secrets
                .into_iter()
                .map(|entry| AuthApiSecret {
                    id: entry.id,
                    secret: entry.secret,
                })
                .collect();
        } else if let Some(secret) = auth.api_secret {
            config.auth_api_secrets = vec![AuthApiSecret {
                id: DEFAULT_API_SECRET_ID.to_string(),
                secret,
            }];
        }
    }

    if let Some(security) = yaml.security {
        set_some(&mut config.cors_allowed_origins, security.cors_allowed_origins);
        set(
            &mut config.rate_limit_requests_per_second,
            security.rate_limit_requests_per_second,
        );
        set(&mut config.rate_limit_burst_size, security.rate_limit_burst_size);
    }

    Ok(())
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn set_some<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

fn set_mb(target: &mut u64, megabytes: Option<u64>) {
    if let Some(mb) = megabytes {
        *target = mb.saturating_mul(MB);
    }
}

fn set_kb(target: &mut u64, kilobytes: Option<u64>) {
    if let Some(kb) = kilobytes {
        *target = kb.saturating_mul(KB);
    }
}

fn parse_provider(raw: &str) -> Result<STTProvider, Box<dyn std::error::Error>> {
    raw.parse::<STTProvider>()
        .map_err(|e| Box::from(e.to_string()))
}

/// TLS is on when explicitly enabled, or when both paths are given and it is
/// not explicitly disabled.
fn build_tls(
    enabled: Option<bool>,
    cert: Option<String>,
    key: Option<String>,
) -> Result<Option<TlsConfig>, Box<dyn std::error::Error>> {
    if enabled == Some(false) {
        return Ok(None);
    }
    match (cert, key) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) if enabled != Some(true) => Ok(None),
        _ => Err("TLS requires both cert_path (TLS_CERT_PATH) and key_path (TLS_KEY_PATH)".into()),
    }
}
