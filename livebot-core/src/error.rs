//! Host-level error types

use thiserror::Error;

use crate::store::OptionsError;

/// Errors surfaced while starting or driving the plugin host
#[derive(Error, Debug)]
pub enum HostError {
    /// Configuration bootstrap failed; the host cannot start
    #[error(transparent)]
    Options(#[from] OptionsError),

    /// An external collaborator failed to start
    #[error("collaborator failed to start: {0}")]
    Collaborator(String),
}
