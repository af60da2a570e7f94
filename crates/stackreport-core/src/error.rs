//! Crate-level error type.

use crate::config::ConfigError;
use crate::delivery::{DeliveryError, ReportError};
use crate::event::EventError;
use crate::payload::AssembleError;
use crate::readiness::PollError;

pub type Result<T> = std::result::Result<T, Error>;

/// Anything that ends an invocation early.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("failed to send status report: {0}")]
    Report(#[from] ReportError),
}
