use alloc::string::String;
use thiserror::Error;

use crate::frame::FrameHeaderError;

#[derive(Debug, Error)]
pub enum SharedError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("device stopped responding while waiting for {0}")]
    Eof(String),
    #[error("no reply to {command} before the read timed out")]
    NoReply { command: &'static str },
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameHeaderError),
    #[error("{command}: expected a {expected} byte frame body, got {actual}")]
    FrameLengthMismatch {
        command: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("expected {expected}, got response code 0x{found:02X}")]
    UnexpectedResponse { expected: &'static str, found: u8 },
    #[error("frame belongs to session {found}, expected session {expected}")]
    SessionMismatch { expected: u8, found: u8 },
    #[error("device refused {command}")]
    StatusNotOk { command: &'static str },
    #[error("device rejected {command} during transfer")]
    TransferRejected { command: &'static str },
    #[error("{command} carried no payload")]
    EmptyChunk { command: &'static str },
    #[error("transfer cursor at {sent} bytes of a {expected} byte payload")]
    TransferOverrun { sent: usize, expected: usize },
    #[error("device could not calculate the code")]
    CalculateFailed,
    #[error("device runs {name:?} instead of the OATH application")]
    UnexpectedAppIdentity { name: String },
    #[error("secret is not valid unpadded base32")]
    InvalidSecretEncoding,
    #[error("secret is {actual} bytes, at most {max} are supported")]
    SecretTooLong { actual: usize, max: usize },
    #[error("name is {actual} bytes, at most {max} are supported")]
    NameTooLong { actual: usize, max: usize },
    #[error("digits must be between 6 and 8, got {0}")]
    UnsupportedDigits(u8),
    #[error("time step must be greater than zero")]
    InvalidTimeStep,
    #[error("time {0} does not fit the calculate request")]
    TimeOutOfRange(u64),
    #[error("encrypted record is {actual} bytes, expected {expected}")]
    RecordSizeMismatch { expected: usize, actual: usize },
    #[error("table of contents is {actual} bytes, expected {expected}")]
    TocSizeMismatch { expected: usize, actual: usize },
    #[error("bundle error: {0}")]
    Bundle(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("operation cancelled")]
    Cancelled,
}

impl SharedError {
    /// The device is absent, silent or running another application.
    /// Callers usually ask for a replug instead of failing hard.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            SharedError::Eof(_) | SharedError::UnexpectedAppIdentity { .. }
        )
    }

    /// Process exit status reported for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            SharedError::Transport(_) | SharedError::NoReply { .. } => 3,
            SharedError::Eof(_) | SharedError::UnexpectedAppIdentity { .. } => 7,
            SharedError::MalformedFrame(_)
            | SharedError::FrameLengthMismatch { .. }
            | SharedError::UnexpectedResponse { .. }
            | SharedError::SessionMismatch { .. }
            | SharedError::EmptyChunk { .. } => 4,
            SharedError::StatusNotOk { .. }
            | SharedError::TransferRejected { .. }
            | SharedError::CalculateFailed => 5,
            SharedError::InvalidSecretEncoding
            | SharedError::SecretTooLong { .. }
            | SharedError::NameTooLong { .. }
            | SharedError::UnsupportedDigits(_)
            | SharedError::InvalidTimeStep
            | SharedError::TimeOutOfRange(_)
            | SharedError::RecordSizeMismatch { .. } => 6,
            SharedError::TocSizeMismatch { .. } | SharedError::Bundle(_) => 8,
            SharedError::Config(_) => 9,
            SharedError::TransferOverrun { .. } => 70,
            SharedError::Cancelled => 130,
        }
    }
}
