//! Error types for the dispatcher.

use crate::action::ActionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The dispatcher was built outside of a tokio runtime, so there is
    /// nothing to drive its drain loop.
    #[error("dispatcher `{0}` must be built inside a tokio runtime")]
    NoRuntime(String),

    /// A queued action was dropped by `clear()` (or by the dispatcher being
    /// torn down) before it ever ran.
    #[error("action {0} was discarded before it ran")]
    Discarded(ActionId),

    #[error("invalid dispatcher config: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
