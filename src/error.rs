//! Error type shared by every coordinator.

use thiserror::Error;

use crate::ids::{ControlId, WindowId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unknown window {0}")]
    UnknownWindow(WindowId),
    #[error("unknown control {0}")]
    UnknownControl(ControlId),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("{0} has been disposed")]
    Disposed(&'static str),
    #[error("window {0} is already being dragged or resized")]
    InteractionInProgress(WindowId),
}

pub type CoreResult<T> = Result<T, CoreError>;
