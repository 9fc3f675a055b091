//! 外壳运行参数

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// When the title/unread baseline is read after a successful load.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum BaselineReadPolicy {
    /// Only on the first success after the view was constructed
    #[default]
    FirstSuccessOnly,
    /// On every successful load
    EverySuccess,
}

/// Tunables of the view lifecycle and navigation policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ShellSettings {
    /// Fixed delay between retries, foreground and background
    pub retry_interval_secs: u64,
    /// Foreground retries before a view enters `ERROR`
    pub max_retries: u32,
    /// Upper bound on `WAITING_FOR_APP_READY`
    pub app_ready_timeout_secs: u64,
    /// The app's own deep-link scheme, without `:`
    pub deep_link_scheme: String,
    /// Lowest server version that accepts in-app history pushes for deep links
    pub history_push_min_version: String,
    /// Extra top-level path segments treated like plugin URLs
    pub managed_resources: Vec<String>,
    pub baseline_read: BaselineReadPolicy,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            retry_interval_secs: 10,
            max_retries: 3,
            app_ready_timeout_secs: 4,
            deep_link_scheme: "mattermost".to_string(),
            history_push_min_version: "6.0.0".to_string(),
            managed_resources: Vec::new(),
            baseline_read: BaselineReadPolicy::FirstSuccessOnly,
        }
    }
}

impl ShellSettings {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn app_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.app_ready_timeout_secs)
    }

    /// Parsed minimum version for history-push deep links.
    ///
    /// Falls back to 6.0.0 when the configured value does not parse; `validate` rejects that case up front.
    pub fn history_push_min_version(&self) -> semver::Version {
        crate::utils::version::parse_server_version(&self.history_push_min_version)
            .unwrap_or_else(|| semver::Version::new(6, 0, 0))
    }

    /// Checks value ranges after deserialization.
    pub fn validate(&self) -> CoreResult<()> {
        if self.retry_interval_secs == 0 {
            return Err(CoreError::ValidationError(
                "retryIntervalSecs must be greater than zero".to_string(),
            ));
        }
        if self.app_ready_timeout_secs == 0 {
            return Err(CoreError::ValidationError(
                "appReadyTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        let scheme = self.deep_link_scheme.trim();
        if scheme.is_empty() || matches!(scheme, "http" | "https") || scheme.contains(':') {
            return Err(CoreError::ValidationError(format!(
                "Invalid deep link scheme: {:?}",
                self.deep_link_scheme
            )));
        }
        if crate::utils::version::parse_server_version(&self.history_push_min_version).is_none() {
            return Err(CoreError::ValidationError(format!(
                "Invalid historyPushMinVersion: {}",
                self.history_push_min_version
            )));
        }
        if let Some(bad) = self
            .managed_resources
            .iter()
            .find(|r| r.is_empty() || r.contains('/'))
        {
            return Err(CoreError::ValidationError(format!(
                "Managed resource must be a single path segment: {bad:?}"
            )));
        }
        Ok(())
    }
}
