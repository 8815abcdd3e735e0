use alloc::vec;

use super::{FRAME_HEADER_SIZE, Frame, FrameHeader};
use crate::command::AppCommand;
use crate::error::SharedError;

/// Builds a zeroed request frame for `command` with the code in the first body byte.
pub fn build_frame(command: &AppCommand, session_id: u8) -> Frame {
    let header = FrameHeader::new(session_id, command.endpoint(), command.cmd_len());
    let mut body = vec![0u8; command.cmd_len().byte_len()];
    body[0] = command.code();
    Frame { header, body }
}

/// Validates a raw frame (header byte plus body) against the expected response.
pub fn parse_frame(raw: &[u8], expected: &AppCommand, session_id: u8) -> Result<Frame, SharedError> {
    let Some((&header_byte, body)) = raw.split_first() else {
        return Err(SharedError::FrameLengthMismatch {
            command: expected.name(),
            expected: FRAME_HEADER_SIZE + expected.cmd_len().byte_len(),
            actual: 0,
        });
    };

    let header = FrameHeader::decode(header_byte)?;
    if header.response_not_ok {
        return Err(SharedError::StatusNotOk {
            command: expected.name(),
        });
    }

    let declared = header.cmd_len.byte_len();
    if body.len() != declared || header.cmd_len != expected.cmd_len() {
        return Err(SharedError::FrameLengthMismatch {
            command: expected.name(),
            expected: expected.cmd_len().byte_len(),
            actual: body.len(),
        });
    }

    if header.session_id != session_id {
        return Err(SharedError::SessionMismatch {
            expected: session_id,
            found: header.session_id,
        });
    }

    if body[0] != expected.code() {
        return Err(SharedError::UnexpectedResponse {
            expected: expected.name(),
            found: body[0],
        });
    }

    Ok(Frame {
        header,
        body: body.to_vec(),
    })
}
