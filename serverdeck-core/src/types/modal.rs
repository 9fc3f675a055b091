//! 模态框类型

use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use thiserror::Error;

/// Why a modal did not produce a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModalError {
    /// The user (or caller) rejected the modal with the given data
    #[error("Modal rejected: {0}")]
    Rejected(Value),
    /// The queue was torn down before the modal completed
    #[error("Modal dropped before completion")]
    Dropped,
}

/// Final result of a modal request.
pub type ModalResult = Result<Value, ModalError>;

/// Cloneable outcome shared by every caller that requested the same modal key.
pub type ModalOutcome = Shared<BoxFuture<'static, ModalResult>>;
