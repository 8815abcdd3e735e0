//! Request/response exchange and chunked transfers on top of a frame transport.

use shared::command::{AppCommand, CommandPair};
use shared::error::SharedError;
use shared::frame::{Frame, build_frame};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::transport::DeviceTransport;

/// Sent in place of an empty payload so the device still sees one request.
const EMPTY_PAYLOAD: [u8; 1] = [0];

/// How the total length of a download is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectSize {
    /// Known before the first request.
    Fixed(usize),
    /// The first response data byte counts descriptors and belongs to the object.
    CountedWithHeader {
        descriptor_size: usize,
        header_size: usize,
    },
    /// The first response reports a descriptor count in place of its status.
    /// A zero count means there is nothing to download.
    CountInStatus { descriptor_size: usize },
}

impl ObjectSize {
    /// Total size announced by the first response, or `None` for an empty result.
    fn discover(self, pair: &CommandPair, first: &Frame) -> Result<Option<usize>, SharedError> {
        match self {
            ObjectSize::Fixed(len) => {
                ensure_accepted(pair, first)?;
                Ok(Some(len))
            }
            ObjectSize::CountedWithHeader {
                descriptor_size,
                header_size,
            } => {
                ensure_accepted(pair, first)?;
                let count = first.response_data().first().copied().unwrap_or(0);
                Ok(Some(usize::from(count) * descriptor_size + header_size))
            }
            ObjectSize::CountInStatus { descriptor_size } => match first.status() {
                0 => Ok(None),
                count => Ok(Some(usize::from(count) * descriptor_size)),
            },
        }
    }
}

/// Drives request/response exchanges for one session over a borrowed transport.
pub struct FrameChannel<'a, T>
where
    T: DeviceTransport + ?Sized,
{
    transport: &'a mut T,
    cancel: CancellationToken,
    session_id: u8,
}

impl<'a, T> FrameChannel<'a, T>
where
    T: DeviceTransport + ?Sized,
{
    pub fn new(transport: &'a mut T, session_id: u8, cancel: CancellationToken) -> Self {
        Self {
            transport,
            cancel,
            session_id,
        }
    }

    pub fn session_id(&self) -> u8 {
        self.session_id
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut *self.transport
    }

    /// Sends one request frame and reads the validated reply.
    pub fn exchange(&mut self, request: &Frame, response: &AppCommand) -> Result<Frame, SharedError> {
        self.cancel.check()?;
        self.transport.write_frame(request)?;
        self.transport.read_frame(response, self.session_id)
    }

    /// Splits `payload` into request frames and returns how many were sent.
    /// Every frame must be acknowledged before the next one goes out.
    pub fn upload(&mut self, pair: &CommandPair, payload: &[u8]) -> Result<usize, SharedError> {
        let data = if payload.is_empty() {
            &EMPTY_PAYLOAD[..]
        } else {
            payload
        };

        let mut offset = 0;
        let mut frames = 0;
        while offset < data.len() {
            let mut request = build_frame(&pair.request, self.session_id);
            let copied = request.fill_payload(&data[offset..]);
            if copied == 0 {
                return Err(SharedError::TransferOverrun {
                    sent: offset,
                    expected: data.len(),
                });
            }

            let response = self.exchange(&request, &pair.response)?;
            ensure_accepted(pair, &response)?;
            offset += copied;
            frames += 1;
        }

        if offset != data.len() {
            return Err(SharedError::TransferOverrun {
                sent: offset,
                expected: data.len(),
            });
        }

        debug!(command = pair.request.name(), bytes = data.len(), frames, "upload complete");
        Ok(frames)
    }

    /// Repeats the request until the object announced by `size` is complete.
    pub fn download(&mut self, pair: &CommandPair, size: ObjectSize) -> Result<Vec<u8>, SharedError> {
        let mut expected = match size {
            ObjectSize::Fixed(len) => Some(len),
            _ => None,
        };
        let mut buffer = Vec::new();
        let mut first = true;

        while expected.is_none_or(|len| buffer.len() < len) {
            let request = build_frame(&pair.request, self.session_id);
            let response = self.exchange(&request, &pair.response)?;

            let total = match expected {
                Some(len) if !first => {
                    ensure_accepted(pair, &response)?;
                    len
                }
                _ => match size.discover(pair, &response)? {
                    Some(len) => {
                        buffer.reserve_exact(len);
                        len
                    }
                    None => {
                        debug!(command = pair.request.name(), "device reported an empty result");
                        return Ok(Vec::new());
                    }
                },
            };
            expected = Some(total);
            first = false;

            let chunk = response.response_data();
            let take = chunk.len().min(total - buffer.len());
            if take == 0 && total > buffer.len() {
                return Err(SharedError::EmptyChunk {
                    command: pair.response.name(),
                });
            }
            buffer.extend_from_slice(&chunk[..take]);
        }

        debug!(command = pair.request.name(), bytes = buffer.len(), "download complete");
        Ok(buffer)
    }
}

fn ensure_accepted(pair: &CommandPair, response: &Frame) -> Result<(), SharedError> {
    if response.is_ok() {
        Ok(())
    } else {
        Err(SharedError::TransferRejected {
            command: pair.request.name(),
        })
    }
}
