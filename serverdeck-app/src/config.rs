//! 设置文件加载
//!
//! Reads `ShellSettings` from a JSON file in the platform configuration directory.

use std::path::{Path, PathBuf};

use serverdeck_core::types::ShellSettings;
use serverdeck_core::{CoreError, CoreResult};
use tokio::fs;

/// 获取配置目录路径
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("serverdeck")
}

/// 获取设置文件路径
pub fn default_settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Load settings from `path`, or from the default location when `None`.
///
/// A missing file yields the defaults. Malformed or invalid settings are a
/// `CoreError::ConfigError`.
pub async fn load_settings(path: Option<&Path>) -> CoreResult<ShellSettings> {
    let path = path.map_or_else(default_settings_path, Path::to_path_buf);

    if !fs::try_exists(&path).await.unwrap_or(false) {
        log::info!("No settings at {}, using defaults", path.display());
        return Ok(ShellSettings::default());
    }

    let content = fs::read_to_string(&path)
        .await
        .map_err(|e| CoreError::ConfigError(format!("{}: {e}", path.display())))?;

    let settings: ShellSettings = serde_json::from_str(&content)
        .map_err(|e| CoreError::ConfigError(format!("{}: {e}", path.display())))?;

    settings
        .validate()
        .map_err(|e| CoreError::ConfigError(format!("{}: {e}", path.display())))?;

    log::info!("Loaded settings from {}", path.display());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serverdeck_core::types::BaselineReadPolicy;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(Some(&dir.path().join("nope.json")))
            .await
            .unwrap();
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.deep_link_scheme, "mattermost");
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"maxRetries": 5, "baselineRead": "everySuccess", "managedResources": ["trusted"]}"#,
        )
        .unwrap();

        let settings = load_settings(Some(&path)).await.unwrap();
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.baseline_read, BaselineReadPolicy::EverySuccess);
        assert_eq!(settings.managed_resources, vec!["trusted".to_string()]);
        assert_eq!(settings.retry_interval_secs, 10);
    }

    #[tokio::test]
    async fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_settings(Some(&path)).await,
            Err(CoreError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"deepLinkScheme": "https"}"#).unwrap();
        assert!(matches!(
            load_settings(Some(&path)).await,
            Err(CoreError::ConfigError(_))
        ));
    }
}
