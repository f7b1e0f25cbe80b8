//! Configuration loader for Tinker.
//!
//! Reads `config.toml` from the data directory (`~/.tinker/` in production)
//! and deserializes it into [`AppConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use tinker_types::config::{AppConfig, ProviderSettings};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TINKER_DATA_DIR";

/// Resolve the data directory: `TINKER_DATA_DIR`, else `~/.tinker`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tinker")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`AppConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Read the provider API key from the environment variable named in settings.
///
/// Returns `None` when the variable is unset or blank.
pub fn resolve_api_key(settings: &ProviderSettings) -> Option<SecretString> {
    std::env::var(&settings.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.context.max_turns, None);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[server]
port = 8080

[provider]
model = "gpt-4o-mini"
timeout_secs = 10

[context]
max_turns = 20
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.timeout_secs, 10);
        assert_eq!(config.provider.max_tokens, 1024);
        assert_eq!(config.context.max_turns, Some(20));
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn resolve_api_key_reads_named_variable() {
        use secrecy::ExposeSecret;

        let settings = ProviderSettings {
            api_key_env: "TINKER_TEST_KEY_PRESENT".to_string(),
            ..ProviderSettings::default()
        };
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("TINKER_TEST_KEY_PRESENT", "sk-test") };
        let key = resolve_api_key(&settings).unwrap();
        assert_eq!(key.expose_secret(), "sk-test");

        let missing = ProviderSettings {
            api_key_env: "TINKER_TEST_KEY_MISSING".to_string(),
            ..ProviderSettings::default()
        };
        assert!(resolve_api_key(&missing).is_none());
    }
}
