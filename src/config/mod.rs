//! Configuration module for the transcription gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use transcribe_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use crate::core::pipeline::PipelineConfig;
use crate::core::resolver::{DEFAULT_RESOLVER_TIMEOUT_SECS, ResolverConfig};
use crate::core::stt::STTProvider;
use crate::core::stt::whisper::{DEFAULT_TIMEOUT_SECS, WhisperConfig};

mod env;
mod merge;
mod validation;
mod yaml;

/// Default requests per second per client IP.
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 60;

/// Default burst allowance for rate limiting.
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// API secret authentication entry with a client identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthApiSecret {
    pub id: String,
    pub secret: String,
}

/// Server configuration
///
/// Contains everything needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Media resolver service
/// - Transcription engine selection and credentials
/// - Retrieval pipeline thresholds
/// - Authentication and security settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Resolver service
    /// Endpoint turning page/share URLs into direct download URLs
    pub resolver_url: Option<String>,
    pub resolver_api_key: Option<String>,
    pub resolver_timeout_seconds: u64,

    // Transcription engine
    pub stt_provider: STTProvider,
    /// Groq API key for Whisper STT
    pub groq_api_key: Option<String>,
    /// OpenAI API key for Whisper STT
    pub openai_api_key: Option<String>,
    /// Model override; provider default when `None`
    pub stt_model: Option<String>,
    pub stt_language: Option<String>,
    pub stt_prompt: Option<String>,
    /// Endpoint override for OpenAI-compatible servers
    pub stt_base_url: Option<String>,
    pub stt_timeout_seconds: u64,

    // Retrieval pipeline
    pub pipeline: PipelineConfig,

    // Authentication configuration
    pub auth_api_secrets: Vec<AuthApiSecret>,
    pub auth_required: bool,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            resolver_url: None,
            resolver_api_key: None,
            resolver_timeout_seconds: DEFAULT_RESOLVER_TIMEOUT_SECS,
            stt_provider: STTProvider::default(),
            groq_api_key: None,
            openai_api_key: None,
            stt_model: None,
            stt_language: None,
            stt_prompt: None,
            stt_base_url: None,
            stt_timeout_seconds: DEFAULT_TIMEOUT_SECS,
            pipeline: PipelineConfig::default(),
            auth_api_secrets: Vec::new(),
            auth_required: false,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: DEFAULT_RATE_LIMIT_RPS,
            rate_limit_burst_size: DEFAULT_RATE_LIMIT_BURST,
        }
    }
}

/// Zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.resolver_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.groq_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        for secret in &mut self.auth_api_secrets {
            secret.secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded in main.rs before this is called, so actual
    /// environment variables override .env values.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_server_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_server_config(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Returns true if at least one API secret entry is configured
    pub fn has_api_secret_auth(&self) -> bool {
        !self.auth_api_secrets.is_empty()
    }

    /// API key for the configured transcription provider
    pub fn stt_api_key(&self) -> Result<String, String> {
        match self.stt_provider {
            STTProvider::Groq => self
                .groq_api_key
                .as_ref()
                .cloned()
                .ok_or_else(|| "Groq API key not configured in server environment".to_string()),
            STTProvider::OpenAI => self.openai_api_key.as_ref().cloned().ok_or_else(|| {
                "OpenAI API key not configured in server environment".to_string()
            }),
        }
    }

    /// Transcription client settings derived from this configuration
    pub fn whisper_config(&self) -> Result<WhisperConfig, String> {
        Ok(WhisperConfig {
            provider: self.stt_provider,
            api_key: self.stt_api_key()?,
            model: self.stt_model.clone().unwrap_or_default(),
            language: self.stt_language.clone(),
            prompt: self.stt_prompt.clone(),
            api_url: self.stt_base_url.clone(),
            timeout_secs: self.stt_timeout_seconds,
            ..Default::default()
        })
    }

    /// Resolver client settings derived from this configuration
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            endpoint: self.resolver_url.clone(),
            api_key: self.resolver_api_key.clone(),
            timeout_secs: self.resolver_timeout_seconds,
        }
    }
}

pub(crate) fn parse_auth_api_secrets_json(
    json_str: &str,
) -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    #[derive(serde::Deserialize)]
    struct AuthApiSecretJson {
        id: String,
        secret: String,
    }

    let secrets: Vec<AuthApiSecretJson> = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid AUTH_API_SECRETS_JSON format: {e}"))?;

    Ok(secrets
        .into_iter()
        .map(|entry| AuthApiSecret {
            id: entry.id,
            secret: entry.secret,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::strategy::MB;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_KEYS: &[&str] = &[
        "HOST",
        "PORT",
        "STT_PROVIDER",
        "GROQ_API_KEY",
        "OPENAI_API_KEY",
        "STT_MODEL",
        "RESOLVER_URL",
        "PIPELINE_MEDIUM_CHUNK_MB",
        "PIPELINE_SAFE_PARALLELISM",
        "PIPELINE_MIN_CHUNK_KB",
        "PIPELINE_MAX_CHUNKS",
        "ALLOW_PRIVATE_SOURCES",
        "AUTH_REQUIRED",
        "AUTH_API_SECRET",
        "AUTH_API_SECRETS_JSON",
        "RATE_LIMIT_REQUESTS_PER_SECOND",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "0.0.0.0:3001");
        assert!(!config.is_tls_enabled());
        assert!(!config.has_api_secret_auth());
        assert_eq!(config.stt_provider, STTProvider::Groq);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_stt_api_key_follows_provider() {
        let mut config = ServerConfig::default();
        config.groq_api_key = Some("gsk-test".to_string());
        assert_eq!(config.stt_api_key().unwrap(), "gsk-test");

        config.stt_provider = STTProvider::OpenAI;
        let err = config.stt_api_key().unwrap_err();
        assert!(err.contains("OpenAI"));
    }

    #[test]
    fn test_whisper_config_mapping() {
        let mut config = ServerConfig::default();
        config.stt_provider = STTProvider::OpenAI;
        config.openai_api_key = Some("sk-test".to_string());
        config.stt_language = Some("fr".to_string());
        config.stt_base_url = Some("http://localhost:9000/v1/audio/transcriptions".to_string());
        config.stt_timeout_seconds = 42;

        let whisper = config.whisper_config().unwrap();
        assert_eq!(whisper.provider, STTProvider::OpenAI);
        assert_eq!(whisper.api_key, "sk-test");
        assert_eq!(whisper.model(), "whisper-1");
        assert_eq!(whisper.language.as_deref(), Some("fr"));
        assert_eq!(whisper.api_url(), "http://localhost:9000/v1/audio/transcriptions");
        assert_eq!(whisper.timeout_secs, 42);
    }

    #[test]
    fn test_resolver_config_mapping() {
        let mut config = ServerConfig::default();
        config.resolver_url = Some("https://resolver.example.com".to_string());
        config.resolver_api_key = Some("rk".to_string());
        let resolver = config.resolver_config();
        assert_eq!(resolver.endpoint.as_deref(), Some("https://resolver.example.com"));
        assert_eq!(resolver.api_key.as_deref(), Some("rk"));
        assert_eq!(resolver.timeout_secs, DEFAULT_RESOLVER_TIMEOUT_SECS);
    }

    #[test]
    fn test_parse_auth_api_secrets_json() {
        let secrets =
            parse_auth_api_secrets_json(r#"[{"id":"a","secret":"s1"},{"id":"b","secret":"s2"}]"#)
                .unwrap();
        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets[1].id, "b");

        assert!(parse_auth_api_secrets_json("not json").is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        unsafe {
            env::set_var("PORT", "8088");
            env::set_var("STT_PROVIDER", "openai");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("PIPELINE_MEDIUM_CHUNK_MB", "6");
            env::set_var("PIPELINE_MIN_CHUNK_KB", "512");
            env::set_var("PIPELINE_MAX_CHUNKS", "400");
            env::set_var("ALLOW_PRIVATE_SOURCES", "true");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 8088);
        assert_eq!(config.stt_provider, STTProvider::OpenAI);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.pipeline.strategy.medium_chunk_size, 6 * MB);
        assert_eq!(config.pipeline.strategy.min_chunk_size, 512 * 1024);
        assert_eq!(config.pipeline.strategy.max_chunk_count, 400);
        assert!(config.pipeline.allow_private_sources);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_values() {
        clear_env();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }
        assert!(ServerConfig::from_env().is_err());

        clear_env();
        unsafe {
            env::set_var("STT_PROVIDER", "deepgram");
        }
        assert!(ServerConfig::from_env().is_err());

        clear_env();
        unsafe {
            env::set_var("AUTH_REQUIRED", "true");
        }
        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("AUTH_REQUIRED"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_single_auth_secret() {
        clear_env();
        unsafe {
            env::set_var("AUTH_REQUIRED", "true");
            env::set_var("AUTH_API_SECRET", "only-secret");
        }

        let config = ServerConfig::from_env().unwrap();
        assert!(config.auth_required);
        assert_eq!(config.auth_api_secrets.len(), 1);
        assert_eq!(config.auth_api_secrets[0].id, "default");
        assert_eq!(config.auth_api_secrets[0].secret, "only-secret");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        clear_env();
        unsafe {
            env::set_var("PORT", "7000");
            env::set_var("GROQ_API_KEY", "gsk-env");
            env::set_var("RATE_LIMIT_REQUESTS_PER_SECOND", "5");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
server:
  port: 9000
pipeline:
  safe_parallelism: 5
  medium_large_chunk_mb: 3
  max_chunks: 2000
auth:
  required: true
  api_secrets:
    - id: "client-a"
      secret: "yaml-secret"
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.groq_api_key.as_deref(), Some("gsk-env"));
        assert_eq!(config.rate_limit_requests_per_second, 5);
        assert_eq!(config.pipeline.strategy.safe_parallelism, 5);
        assert_eq!(config.pipeline.strategy.medium_large_chunk_size, 3 * MB);
        assert_eq!(config.pipeline.strategy.max_chunk_count, 2000);
        assert_eq!(config.auth_api_secrets[0].id, "client-a");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_inverted_thresholds() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "pipeline:\n  single_shot_max_mb: 60\n  medium_max_mb: 50\n",
        )
        .unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("medium_max_bytes"));
    }
}
