use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Bearer token for the completion API. Without it every classification
    /// falls back to the default intent.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_classifier_timeout_secs")]
    pub classifier_timeout_secs: u64,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_dispatch_queue_capacity")]
    pub dispatch_queue_capacity: usize,

    /// Seconds between duplicate-tag reconciliation passes. 0 disables the task.
    #[serde(default = "default_tag_reconcile_interval_secs")]
    pub tag_reconcile_interval_secs: u64,

    /// Seconds between store snapshots. 0 disables the task.
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    openai_base_url: Option<String>,
    openai_api_key: Option<String>,
    openai_model: Option<String>,
    classifier_timeout_secs: Option<u64>,
    data_dir: Option<String>,
    log_dir: Option<String>,
    dispatch_queue_capacity: Option<usize>,
    tag_reconcile_interval_secs: Option<u64>,
    snapshot_interval_secs: Option<u64>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_classifier_timeout_secs() -> u64 {
    20
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_dispatch_queue_capacity() -> usize {
    256
}

fn default_tag_reconcile_interval_secs() -> u64 {
    6 * 60 * 60
}

fn default_snapshot_interval_secs() -> u64 {
    60
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = if let Some(path_str) = config_path {
            let path = Path::new(path_str);
            if path.exists() {
                let contents = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                toml::from_str(&contents)
                    .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))?
            } else {
                PartialServerConfig::default()
            }
        } else {
            PartialServerConfig::default()
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Ok(Self::merge(env_config, file_config))
    }

    fn merge(env_config: PartialServerConfig, file_config: PartialServerConfig) -> Self {
        ServerConfig {
            listen_addr: env_config.listen_addr.or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            openai_base_url: env_config.openai_base_url.or(file_config.openai_base_url)
                .unwrap_or_else(default_openai_base_url),
            openai_api_key: env_config.openai_api_key.or(file_config.openai_api_key)
                .filter(|key| !key.trim().is_empty()),
            openai_model: env_config.openai_model.or(file_config.openai_model)
                .unwrap_or_else(default_openai_model),
            classifier_timeout_secs: env_config.classifier_timeout_secs.or(file_config.classifier_timeout_secs)
                .unwrap_or_else(default_classifier_timeout_secs),
            data_dir: env_config.data_dir.or(file_config.data_dir)
                .unwrap_or_else(default_data_dir),
            log_dir: env_config.log_dir.or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            dispatch_queue_capacity: env_config.dispatch_queue_capacity.or(file_config.dispatch_queue_capacity)
                .unwrap_or_else(default_dispatch_queue_capacity)
                .max(1),
            tag_reconcile_interval_secs: env_config.tag_reconcile_interval_secs.or(file_config.tag_reconcile_interval_secs)
                .unwrap_or_else(default_tag_reconcile_interval_secs),
            snapshot_interval_secs: env_config.snapshot_interval_secs.or(file_config.snapshot_interval_secs)
                .unwrap_or_else(default_snapshot_interval_secs),
        }
    }

    /// Built-in defaults only; no file or environment is read.
    pub fn defaults() -> Self {
        Self::merge(PartialServerConfig::default(), PartialServerConfig::default())
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("store.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_file() {
        let file_config: PartialServerConfig = toml::from_str(
            r#"
            listen_addr = "127.0.0.1:9000"
            openai_model = "file-model"
            dispatch_queue_capacity = 8
            "#,
        )
        .unwrap();
        let env_config = PartialServerConfig {
            openai_model: Some("env-model".to_string()),
            ..Default::default()
        };

        let config = ServerConfig::merge(env_config, file_config);

        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.openai_model, "env-model");
        assert_eq!(config.dispatch_queue_capacity, 8);
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ServerConfig::defaults();

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.openai_base_url, "https://api.openai.com");
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.classifier_timeout(), Duration::from_secs(20));
        assert_eq!(config.snapshot_path(), Path::new("data").join("store.json"));
    }

    #[test]
    fn test_blank_api_key_is_treated_as_missing() {
        let env_config = PartialServerConfig {
            openai_api_key: Some("   ".to_string()),
            ..Default::default()
        };
        let config = ServerConfig::merge(env_config, PartialServerConfig::default());
        assert!(config.openai_api_key.is_none());
    }
}
