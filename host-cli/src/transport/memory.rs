use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

use shared::command::AppCommand;
use shared::frame::{CmdLen, Endpoint, FRAME_HEADER_SIZE, FrameHeader, SESSION_ID};

use super::FramePort;

/// In-memory port that records written bytes and replays scripted replies.
/// Reads past the script time out the way a silent device does.
#[derive(Default)]
pub struct MemoryDeviceTransport {
    queued: VecDeque<u8>,
    pub written: Vec<u8>,
    pub timeouts: Vec<Duration>,
    pub flushes: usize,
}

impl MemoryDeviceTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes, header included, for subsequent reads.
    pub fn queue_raw(&mut self, bytes: &[u8]) {
        self.queued.extend(bytes);
    }

    /// Queue a well-formed reply whose body starts with the response code
    /// followed by `data`.
    pub fn queue_response(&mut self, response: &AppCommand, data: &[u8]) {
        let header = FrameHeader::new(SESSION_ID, Endpoint::App, response.cmd_len());
        let mut body = vec![0u8; response.cmd_len().byte_len()];
        body[0] = response.code();
        body[1..1 + data.len()].copy_from_slice(data);
        self.queued.push_back(header.encode());
        self.queued.extend(body);
    }

    /// Queue the short reply the firmware sends for a refused request.
    pub fn queue_not_ok(&mut self) {
        let mut header = FrameHeader::new(SESSION_ID, Endpoint::App, CmdLen::Len1);
        header.response_not_ok = true;
        self.queued.extend([header.encode(), 0]);
    }

    /// Split everything written so far into frames using each header byte.
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut rest = self.written.as_slice();
        while let Some(&header) = rest.first() {
            let len = FRAME_HEADER_SIZE + CmdLen::from_bits(header).byte_len();
            let end = len.min(rest.len());
            frames.push(rest[..end].to_vec());
            rest = &rest[end..];
        }
        frames
    }

    pub fn pending_reply_bytes(&self) -> usize {
        self.queued.len()
    }
}

impl Read for MemoryDeviceTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.queued.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no scripted reply left",
            ));
        }
        let count = buf.len().min(self.queued.len());
        for (slot, byte) in buf.iter_mut().zip(self.queued.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

impl Write for MemoryDeviceTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

impl FramePort for MemoryDeviceTransport {
    fn set_port_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeouts.push(timeout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DeviceTransport;
    use shared::command::{GET_LIST, LOAD_TOC};
    use shared::error::SharedError;
    use shared::frame::{STATUS_OK, build_frame};

    #[test]
    fn records_written_frames() {
        let mut transport = MemoryDeviceTransport::new();
        let frame = build_frame(&GET_LIST.request, SESSION_ID);
        transport.write_frame(&frame).expect("write frame");
        transport.write_frame(&frame).expect("write frame");

        let frames = transport.written_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![0x58, 0x05]);
    }

    #[test]
    fn replays_queued_responses() {
        let mut transport = MemoryDeviceTransport::new();
        transport.queue_response(&LOAD_TOC.response, &[STATUS_OK]);

        let frame = transport
            .read_frame(&LOAD_TOC.response, SESSION_ID)
            .expect("frame");
        assert!(frame.is_ok());
        assert_eq!(transport.pending_reply_bytes(), 0);
    }

    #[test]
    fn exhausted_script_reads_as_no_reply() {
        let mut transport = MemoryDeviceTransport::new();
        let err = transport
            .read_frame(&LOAD_TOC.response, SESSION_ID)
            .unwrap_err();
        assert!(!err.is_not_ready());
        assert!(matches!(
            err,
            SharedError::NoReply {
                command: "LoadToCResponse"
            }
        ));
    }

    #[test]
    fn half_sent_frame_reads_as_no_reply() {
        let mut transport = MemoryDeviceTransport::new();
        transport.queue_raw(&[0x5B, 0x06, 0x01]);
        let err = transport
            .read_frame(&GET_LIST.response, SESSION_ID)
            .unwrap_err();
        assert!(matches!(err, SharedError::NoReply { .. }));
    }
}
