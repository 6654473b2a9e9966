//! Error types for the scanning pipeline.
//!
//! Failure categories map to how they are handled:
//! - `ScanError::Configuration`: invalid parameters or an unavailable
//!   backend/codec, detected eagerly before any frame is read. Fatal.
//! - `ScanError::Input`: unopenable file, mismatched frame rate/resolution
//!   across concatenated inputs, or a wholly undecodable file. Fatal.
//! - `ScanError::Output`: export-phase encode failure. Aborts the export
//!   step only; the computed event list remains valid.
//! - `DecodeError`: a single undecodable frame. Recovered in-place by
//!   frame-repeat and never surfaced past the frame source unless it
//!   escalates to a whole-file failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("output error: {0}")]
    Output(String),
}

impl ScanError {
    pub fn config(msg: impl Into<String>) -> Self {
        ScanError::Configuration(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        ScanError::Input(msg.into())
    }

    pub fn output(msg: impl Into<String>) -> Self {
        ScanError::Output(msg.into())
    }
}

/// A single frame failed to decode. Carries the global frame number so the
/// recovery path can log where the repeat happened.
#[derive(Debug, Error)]
#[error("failed to decode frame {frame_num}: {reason}")]
pub struct DecodeError {
    pub frame_num: u64,
    pub reason: String,
}

impl DecodeError {
    pub fn new(frame_num: u64, reason: impl Into<String>) -> Self {
        Self {
            frame_num,
            reason: reason.into(),
        }
    }
}
