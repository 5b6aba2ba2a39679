//! Error taxonomy for the capture pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CaptureError>;

/// Failure from the connection while dispatching a command or raw packet
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("coordinate {0} is not a finite number")]
    InvalidCoordinate(f64),

    #[error("invalid {kind} mode `{value}`, expected one of: {allowed}")]
    InvalidMode {
        kind: &'static str,
        value: String,
        allowed: &'static str,
    },

    #[error("no blocks recorded yet, nothing to capture")]
    NoGeometryCaptured,

    #[error("invalid save request: {0}")]
    InvalidSaveRequest(&'static str),

    #[error("structure name is {len} bytes, limit is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("command dispatch failed: {0}")]
    Transport(#[from] TransportError),

    #[error("command queue shut down before dispatch")]
    QueueClosed,
}
