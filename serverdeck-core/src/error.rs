//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// View not found (neither open nor closed)
    #[error("View not found: {0}")]
    ViewNotFound(String),

    /// URL could not be parsed or is not usable
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The rendering surface reported a failure outside of navigation
    #[error("Surface error: {view_id} - {message}")]
    SurfaceError { view_id: String, message: String },

    /// History navigation (back/forward) failed on the surface
    #[error("History navigation failed: {0}")]
    HistoryNavigation(String),

    /// Secondary window could not be created or driven
    #[error("Popup error: {0}")]
    PopupError(String),

    /// Modal key not present in the queue
    #[error("Modal not found: {0}")]
    ModalNotFound(String),

    /// Settings file could not be read or is malformed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The shell runtime is no longer accepting commands
    #[error("Shell runtime closed")]
    RuntimeClosed,
}

impl CoreError {
    /// Whether it is expected behavior (user input, resource does not exist, etc.) is used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::ViewNotFound(_)
            | Self::InvalidUrl(_)
            | Self::ModalNotFound(_)
            | Self::ValidationError(_) => true,
            Self::SurfaceError { .. }
            | Self::HistoryNavigation(_)
            | Self::PopupError(_)
            | Self::ConfigError(_)
            | Self::RuntimeClosed => false,
        }
    }

    /// Log at the level `is_expected` picks, prefixed with `context`.
    pub fn log(&self, context: &str) {
        if self.is_expected() {
            log::warn!("{context}: {self}");
        } else {
            log::error!("{context}: {self}");
        }
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
