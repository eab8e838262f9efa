//! Forwarding of named input triggers to the host.

use thiserror::Error;
use tracing::info;

/// Host capability to fire a named input, as if a bound button was pressed.
pub trait InputTrigger: Send + Sync {
    fn trigger_input(&self, input: &str) -> Result<(), TriggerError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("Input {input} is not known")]
    UnknownInput { input: String },

    #[error("Host is not available")]
    Unavailable,
}

/// Accepts every input and only logs it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInputTrigger;

impl InputTrigger for LogInputTrigger {
    fn trigger_input(&self, input: &str) -> Result<(), TriggerError> {
        info!(input = %input, "Sending trigger input");
        Ok(())
    }
}
