use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::classifier::{default_sensitive_keywords, ClassifyOptions};
use crate::error::{GmailError, Result};
use crate::mutator::{BatchMutator, RetryPolicy, BATCH_SIZE};
use crate::scanner::{DEFAULT_SAMPLE_COUNT, PAGE_SIZE};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Headers requested for the destructive run
    #[serde(default = "default_metadata_headers")]
    pub metadata_headers: Vec<String>,
    /// Number of snippets shown in a dry run
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            metadata_headers: default_metadata_headers(),
            sample_count: default_sample_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_true")]
    pub skip_starred: bool,
    #[serde(default = "default_true")]
    pub skip_important: bool,
    #[serde(default = "default_true")]
    pub skip_sensitive: bool,
    /// Star important-but-unstarred messages before classification
    #[serde(default = "default_true")]
    pub mark_important_star: bool,
    #[serde(default = "default_sensitive_keywords")]
    pub sensitive_keywords: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            skip_starred: true,
            skip_important: true,
            skip_sensitive: true,
            mark_important_star: true,
            sensitive_keywords: default_sensitive_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_page_size() -> u32 {
    PAGE_SIZE
}

fn default_metadata_headers() -> Vec<String> {
    vec!["Subject".to_string(), "From".to_string()]
}

fn default_sample_count() -> usize {
    DEFAULT_SAMPLE_COUNT
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    BATCH_SIZE
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                GmailError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.search.page_size == 0 {
            return Err(GmailError::ConfigError(
                "search.page_size must be at least 1".to_string(),
            ));
        }
        if self.search.page_size > PAGE_SIZE {
            return Err(GmailError::ConfigError(format!(
                "search.page_size cannot exceed {} (Gmail API maximum)",
                PAGE_SIZE
            )));
        }

        if self.fetch.metadata_headers.is_empty() {
            return Err(GmailError::ConfigError(
                "fetch.metadata_headers cannot be empty".to_string(),
            ));
        }
        if self.fetch.metadata_headers.iter().any(|h| h.trim().is_empty()) {
            return Err(GmailError::ConfigError(
                "fetch.metadata_headers cannot contain empty strings".to_string(),
            ));
        }

        if self.batch.batch_size == 0 {
            return Err(GmailError::ConfigError(
                "batch.batch_size must be at least 1".to_string(),
            ));
        }
        if self.batch.batch_size > BATCH_SIZE {
            return Err(GmailError::ConfigError(format!(
                "batch.batch_size cannot exceed {} (Gmail batchModify limit)",
                BATCH_SIZE
            )));
        }
        if self.batch.max_attempts == 0 {
            return Err(GmailError::ConfigError(
                "batch.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.batch.initial_backoff_ms == 0 {
            return Err(GmailError::ConfigError(
                "batch.initial_backoff_ms must be greater than 0".to_string(),
            ));
        }
        if self.batch.max_backoff_ms < self.batch.initial_backoff_ms {
            return Err(GmailError::ConfigError(
                "batch.max_backoff_ms cannot be less than batch.initial_backoff_ms".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        Self::default().save(path).await
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.batch.max_attempts,
            initial_backoff: Duration::from_millis(self.batch.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.batch.max_backoff_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn batch_mutator(&self) -> BatchMutator {
        BatchMutator::new(self.retry_policy()).with_batch_size(self.batch.batch_size)
    }

    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            skip_starred: self.filters.skip_starred,
            skip_important: self.filters.skip_important,
            skip_sensitive: self.filters.skip_sensitive,
            sensitive_keywords: self.filters.sensitive_keywords.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.search.page_size, 500);
        assert_eq!(config.fetch.metadata_headers, vec!["Subject", "From"]);
        assert_eq!(config.fetch.sample_count, 3);

        assert!(config.filters.skip_starred);
        assert!(config.filters.skip_important);
        assert!(config.filters.skip_sensitive);
        assert!(config.filters.mark_important_star);
        assert!(config
            .filters
            .sensitive_keywords
            .contains(&"verification code".to_string()));
        assert!(config.filters.sensitive_keywords.contains(&"驗證碼".to_string()));

        assert_eq!(config.batch.batch_size, 1000);
        assert_eq!(config.batch.max_attempts, 5);
        assert_eq!(config.batch.initial_backoff_ms, 1000);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_page_size() {
        let mut config = Config::default();
        config.search.page_size = 0;
        assert!(config.validate().unwrap_err().to_string().contains("at least 1"));

        config.search.page_size = 501;
        assert!(config.validate().unwrap_err().to_string().contains("cannot exceed 500"));

        config.search.page_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_batch_size() {
        let mut config = Config::default();
        config.batch.batch_size = 0;
        assert!(config.validate().is_err());

        config.batch.batch_size = 1001;
        assert!(config.validate().unwrap_err().to_string().contains("cannot exceed 1000"));
    }

    #[test]
    fn test_config_validation_retry_settings() {
        let mut config = Config::default();
        config.batch.max_attempts = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_attempts"));

        let mut config = Config::default();
        config.batch.initial_backoff_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.batch.max_backoff_ms = 10;
        assert!(config.validate().unwrap_err().to_string().contains("max_backoff_ms"));
    }

    #[test]
    fn test_config_validation_headers() {
        let mut config = Config::default();
        config.fetch.metadata_headers.clear();
        assert!(config.validate().is_err());

        config.fetch.metadata_headers = vec!["Subject".to_string(), " ".to_string()];
        assert!(config.validate().unwrap_err().to_string().contains("empty strings"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = Config::default();
        config.batch.max_attempts = 3;
        config.batch.initial_backoff_ms = 250;

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(250));
        assert_eq!(policy.schedule(), vec![Duration::from_millis(250), Duration::from_millis(500)]);
        assert_eq!(config.batch_mutator().batch_size(), 1000);
    }

    #[tokio::test]
    async fn test_config_load_save_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let mut config = Config::default();
        config.filters.sensitive_keywords = vec!["secret".to_string()];
        config.save(path).await.unwrap();

        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.filters.sensitive_keywords, vec!["secret"]);
        assert_eq!(loaded.batch.batch_size, config.batch.batch_size);
    }

    #[tokio::test]
    async fn test_config_load_nonexistent_returns_default() {
        let path = Path::new("/tmp/nonexistent-gmail-trash-config-12345.toml");
        let config = Config::load(path).await.unwrap();
        assert_eq!(config.search.page_size, 500);
    }

    #[tokio::test]
    async fn test_config_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "this is not valid toml {[}]")
            .await
            .unwrap();

        let result = Config::load(temp_file.path()).await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[tokio::test]
    async fn test_config_partial_with_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let partial_config = r#"
[filters]
skip_sensitive = false

[batch]
batch_size = 250
"#;
        tokio::fs::write(temp_file.path(), partial_config).await.unwrap();

        let config = Config::load(temp_file.path()).await.unwrap();

        assert!(!config.filters.skip_sensitive);
        assert_eq!(config.batch.batch_size, 250);

        assert!(config.filters.skip_starred);
        assert_eq!(config.batch.max_attempts, 5);
        assert_eq!(config.fetch.sample_count, 3);
        assert!(!config.filters.sensitive_keywords.is_empty());
    }

    #[tokio::test]
    async fn test_config_create_example() {
        let temp_file = NamedTempFile::new().unwrap();
        Config::create_example(temp_file.path()).await.unwrap();

        let config = Config::load(temp_file.path()).await.unwrap();
        assert_eq!(config.batch.batch_size, 1000);
    }
}
