//! Relay configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.relaydesk/` in production)
//! and deserializes it into [`RelayConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::Path;

use relaydesk_types::config::RelayConfig;

/// Load relay configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`RelayConfig::default()`].
/// - Unreadable or malformed file: logs a warning and returns the default.
pub async fn load_relay_config(data_dir: &Path) -> RelayConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return RelayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return RelayConfig::default();
        }
    };

    match toml::from_str::<RelayConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            RelayConfig::default()
        }
    }
}

/// Directory URL from `RELAYDESK_DIRECTORY_URL`, else from the config file.
pub fn resolve_directory_url(config: &RelayConfig, env_value: Option<String>) -> Option<String> {
    env_value
        .or_else(|| config.directory_url.clone())
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_relay_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_relay_config(tmp.path()).await;
        assert_eq!(config.heartbeat_interval_secs, 30);
        assert!(config.reply_webhook_url.is_none());
    }

    #[tokio::test]
    async fn load_relay_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
bot_reply_delay_ms = 1500
reply_webhook_url = "http://localhost:9000/reply"

[platforms]
telegram_api_base = "http://localhost:8081"
"#,
        )
        .await
        .unwrap();

        let config = load_relay_config(tmp.path()).await;
        assert_eq!(config.bot_reply_delay_ms, 1500);
        assert_eq!(config.reply_webhook_url.as_deref(), Some("http://localhost:9000/reply"));
        assert_eq!(config.platforms.telegram_api_base, "http://localhost:8081");
    }

    #[tokio::test]
    async fn load_relay_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_relay_config(tmp.path()).await;
        assert_eq!(config.bot_reply_delay_ms, 1000);
    }

    #[test]
    fn resolve_directory_url_prefers_env() {
        let config = RelayConfig {
            directory_url: Some("http://from-file".into()),
            ..Default::default()
        };
        assert_eq!(
            resolve_directory_url(&config, Some("http://from-env".into())).as_deref(),
            Some("http://from-env")
        );
        assert_eq!(resolve_directory_url(&config, None).as_deref(), Some("http://from-file"));
        assert_eq!(resolve_directory_url(&RelayConfig::default(), Some("  ".into())), None);
    }
}
