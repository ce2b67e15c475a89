use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///
/// resolver:
///   url: "https://resolver.internal/resolve"
///   api_key: "resolver-key"
///   timeout_seconds: 30
///
/// transcription:
///   provider: "groq"
///   groq_api_key: "gsk-..."
///   model: "whisper-large-v3-turbo"
///   language: "en"
///   timeout_seconds: 300
///
/// pipeline:
///   single_shot_max_mb: 20
///   medium_max_mb: 50
///   medium_chunk_mb: 8
///   medium_parallelism: 10
///   safe_chunk_mb: 2
///   safe_parallelism: 3
///   min_chunk_kb: 256
///   max_chunks: 10000
///   fetch_timeout_seconds: 120
///   allow_private_sources: false
///
/// auth:
///   required: true
///   api_secrets:
///     - id: "client-a"
///       secret: "your-api-secret"
///
/// security:
///   cors_allowed_origins: "*"
///   rate_limit_requests_per_second: 60
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub resolver: Option<ResolverYaml>,
    pub transcription: Option<TranscriptionYaml>,
    pub pipeline: Option<PipelineYaml>,
    pub auth: Option<AuthYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Media resolver service from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ResolverYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Transcription engine settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TranscriptionYaml {
    /// "groq" or "openai"
    pub provider: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub prompt: Option<String>,
    /// Endpoint override for self-hosted OpenAI-compatible servers
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Retrieval strategy thresholds and timeouts from YAML
///
/// Sizes are in MB (1024 * 1024 bytes).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PipelineYaml {
    pub single_shot_max_mb: Option<u64>,
    pub medium_max_mb: Option<u64>,
    pub medium_chunk_mb: Option<u64>,
    pub medium_large_threshold_mb: Option<u64>,
    pub medium_large_chunk_mb: Option<u64>,
    pub medium_parallelism: Option<usize>,
    pub safe_chunk_mb: Option<u64>,
    pub safe_parallelism: Option<usize>,
    /// Floor for caller chunk size overrides, in KB
    pub min_chunk_kb: Option<u64>,
    pub max_chunks: Option<usize>,
    pub fetch_timeout_seconds: Option<u64>,
    pub probe_timeout_seconds: Option<u64>,
    pub allow_private_sources: Option<bool>,
}

/// Authentication configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub required: Option<bool>,
    /// Preferred multi-secret form. If non-empty, it takes precedence over api_secret.
    #[serde(default)]
    pub api_secrets: Vec<AuthApiSecretYaml>,
    /// Single-secret alias. Ignored when api_secrets is non-empty.
    pub api_secret: Option<String>,
}

/// API secret authentication entry in YAML
#[derive(Debug, Clone, Deserialize)]
pub struct AuthApiSecretYaml {
    pub id: String,
    pub secret: String,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080

resolver:
  url: "https://resolver.example.com/resolve"
  api_key: "resolver-key"
  timeout_seconds: 15

transcription:
  provider: "openai"
  openai_api_key: "sk-test"
  model: "whisper-1"
  language: "de"

pipeline:
  single_shot_max_mb: 10
  medium_chunk_mb: 4
  medium_parallelism: 6
  allow_private_sources: true

auth:
  required: true
  api_secrets:
    - id: "client-a"
      secret: "auth-secret"

security:
  cors_allowed_origins: "https://app.example.com"
  rate_limit_burst_size: 20
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(server.port, Some(8080));

        let resolver = config.resolver.as_ref().unwrap();
        assert_eq!(
            resolver.url.as_deref(),
            Some("https://resolver.example.com/resolve")
        );
        assert_eq!(resolver.timeout_seconds, Some(15));

        let transcription = config.transcription.as_ref().unwrap();
        assert_eq!(transcription.provider.as_deref(), Some("openai"));
        assert_eq!(transcription.language.as_deref(), Some("de"));

        let pipeline = config.pipeline.as_ref().unwrap();
        assert_eq!(pipeline.single_shot_max_mb, Some(10));
        assert_eq!(pipeline.medium_chunk_mb, Some(4));
        assert_eq!(pipeline.medium_parallelism, Some(6));
        assert_eq!(pipeline.safe_chunk_mb, None);
        assert_eq!(pipeline.allow_private_sources, Some(true));

        let auth = config.auth.as_ref().unwrap();
        assert_eq!(auth.required, Some(true));
        assert_eq!(auth.api_secrets.len(), 1);
        assert_eq!(auth.api_secrets[0].id, "client-a");

        let security = config.security.as_ref().unwrap();
        assert_eq!(security.rate_limit_burst_size, Some(20));
        assert_eq!(security.rate_limit_requests_per_second, None);
    }

    #[test]
    fn test_yaml_config_auth_single_api_secret() {
        let yaml = r#"
auth:
  api_secret: "legacy-secret"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let auth = config.auth.as_ref().unwrap();
        assert!(auth.api_secrets.is_empty());
        assert_eq!(auth.api_secret.as_deref(), Some("legacy-secret"));
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("").unwrap_or_default();
        assert!(config.server.is_none());
        assert!(config.pipeline.is_none());
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "server:\n  port: 4000\ntranscription:\n  provider: groq\n",
        )
        .unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        assert_eq!(config.server.unwrap().port, Some(4000));
        assert_eq!(
            config.transcription.unwrap().provider.as_deref(),
            Some("groq")
        );
    }

    #[test]
    fn test_from_file_not_found() {
        let result = YamlConfig::from_file(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.yaml");
        fs::write(&config_path, "server:\n  port: [not, a, port]\n").unwrap();

        let result = YamlConfig::from_file(&config_path);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML config")
        );
    }
}
