//! Fixed-size frames exchanged with the token over the serial link.
//!
//! Every frame starts with a one byte header followed by a body whose length
//! is one of four classes. The first body byte carries the command or
//! response code.

use alloc::vec::Vec;
use core::fmt;

mod codec;

pub use codec::{build_frame, parse_frame};

/// Session id used for every exchange. Only one request is in flight at a time.
pub const SESSION_ID: u8 = 2;

/// Size of the header byte that precedes each frame body on the wire.
pub const FRAME_HEADER_SIZE: usize = 1;

/// Status reported in the second body byte of an accepted request.
pub const STATUS_OK: u8 = 0;
/// Status reported in the second body byte of a refused request.
pub const STATUS_BAD: u8 = 1;

const RESERVED_BIT: u8 = 0x80;
const NOT_OK_BIT: u8 = 0x04;
const SESSION_SHIFT: u8 = 5;
const ENDPOINT_SHIFT: u8 = 3;

/// Frame body length class encoded in the two lowest header bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CmdLen {
    Len1 = 0,
    Len4 = 1,
    Len32 = 2,
    Len128 = 3,
}

impl CmdLen {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => CmdLen::Len1,
            1 => CmdLen::Len4,
            2 => CmdLen::Len32,
            _ => CmdLen::Len128,
        }
    }

    /// Number of body bytes following the header.
    pub const fn byte_len(self) -> usize {
        match self {
            CmdLen::Len1 => 1,
            CmdLen::Len4 => 4,
            CmdLen::Len32 => 32,
            CmdLen::Len128 => 128,
        }
    }

    /// Body bytes left after the command code.
    pub const fn capacity(self) -> usize {
        self.byte_len() - 1
    }
}

/// Destination of a frame inside the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Endpoint {
    Fpga = 1,
    Firmware = 2,
    App = 3,
}

impl Endpoint {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            1 => Some(Endpoint::Fpga),
            2 => Some(Endpoint::Firmware),
            3 => Some(Endpoint::App),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub session_id: u8,
    pub endpoint: Endpoint,
    pub response_not_ok: bool,
    pub cmd_len: CmdLen,
}

impl FrameHeader {
    pub fn new(session_id: u8, endpoint: Endpoint, cmd_len: CmdLen) -> Self {
        Self {
            session_id,
            endpoint,
            response_not_ok: false,
            cmd_len,
        }
    }

    pub fn encode(&self) -> u8 {
        let mut byte = (self.session_id & 0x03) << SESSION_SHIFT;
        byte |= (self.endpoint as u8) << ENDPOINT_SHIFT;
        if self.response_not_ok {
            byte |= NOT_OK_BIT;
        }
        byte | self.cmd_len as u8
    }

    pub fn decode(byte: u8) -> Result<Self, FrameHeaderError> {
        if byte & RESERVED_BIT != 0 {
            return Err(FrameHeaderError::ReservedBitSet(byte));
        }

        let endpoint_bits = (byte >> ENDPOINT_SHIFT) & 0x03;
        let endpoint =
            Endpoint::from_wire(endpoint_bits).ok_or(FrameHeaderError::UnknownEndpoint(byte))?;

        Ok(Self {
            session_id: (byte >> SESSION_SHIFT) & 0x03,
            endpoint,
            response_not_ok: byte & NOT_OK_BIT != 0,
            cmd_len: CmdLen::from_bits(byte),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeaderError {
    ReservedBitSet(u8),
    UnknownEndpoint(u8),
}

impl fmt::Display for FrameHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameHeaderError::ReservedBitSet(byte) => {
                write!(f, "reserved bit set in frame header 0x{byte:02X}")
            }
            FrameHeaderError::UnknownEndpoint(byte) => {
                write!(f, "unknown endpoint in frame header 0x{byte:02X}")
            }
        }
    }
}

impl core::error::Error for FrameHeaderError {}

/// A header plus a body of exactly the length its class declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    body: Vec<u8>,
}

impl Frame {
    pub fn header(&self) -> FrameHeader {
        self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn code(&self) -> u8 {
        self.body[0]
    }

    /// Bytes available after the command code.
    pub fn capacity(&self) -> usize {
        self.body.len() - 1
    }

    pub fn payload(&self) -> &[u8] {
        &self.body[1..]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.body[1..]
    }

    /// Copies as much of `data` as fits into the payload and returns the count.
    /// Unused payload bytes stay zero.
    pub fn fill_payload(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.capacity());
        self.payload_mut()[..count].copy_from_slice(&data[..count]);
        count
    }

    /// Status byte of an application response. Single byte bodies carry none
    /// and read as [`STATUS_BAD`].
    pub fn status(&self) -> u8 {
        self.body.get(1).copied().unwrap_or(STATUS_BAD)
    }

    pub fn is_ok(&self) -> bool {
        self.status() == STATUS_OK
    }

    /// Response bytes following the status byte.
    pub fn response_data(&self) -> &[u8] {
        self.body.get(2..).unwrap_or(&[])
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(FRAME_HEADER_SIZE + self.body.len());
        wire.push(self.header.encode());
        wire.extend_from_slice(&self.body);
        wire
    }
}
