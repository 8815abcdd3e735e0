use std::time::Duration;

use shared::command::{
    CALCULATE, GET_ENCRYPTED_TOC, GET_LIST, GET_NAME_VERSION, LOAD_TOC, PUT, PUT_GET_RECORD,
};
use shared::error::SharedError;
use shared::frame::{Frame, SESSION_ID, build_frame};
use shared::oath::{EncryptedRecord, PackedLayout, RecordList, TableOfContents};
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::constants::{APP_NAME0, APP_NAME1, IDENTIFY_TIMEOUT_SECS};
use crate::transfer::{FrameChannel, ObjectSize};
use crate::transport::DeviceTransport;

/// Name and version reported by the application loaded on the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppIdentity {
    pub name0: [u8; 4],
    pub name1: [u8; 4],
    pub version: u32,
}

impl AppIdentity {
    fn parse(payload: &[u8]) -> Option<Self> {
        Some(Self {
            name0: payload.get(0..4)?.try_into().ok()?,
            name1: payload.get(4..8)?.try_into().ok()?,
            version: u32::from_le_bytes(payload.get(8..12)?.try_into().ok()?),
        })
    }

    pub fn is_oath_app(&self) -> bool {
        &self.name0 == APP_NAME0 && &self.name1 == APP_NAME1
    }

    pub fn name(&self) -> String {
        let mut raw = self.name0.to_vec();
        raw.extend_from_slice(&self.name1);
        String::from_utf8_lossy(&raw).into_owned()
    }
}

/// Protocol operations of the OATH application for one connected token.
pub struct OathSession<'a, T>
where
    T: DeviceTransport + ?Sized,
{
    channel: FrameChannel<'a, T>,
    layout: PackedLayout,
    identify_timeout: Duration,
}

impl<'a, T> OathSession<'a, T>
where
    T: DeviceTransport + ?Sized,
{
    pub fn new(transport: &'a mut T, layout: PackedLayout, cancel: CancellationToken) -> Self {
        Self {
            channel: FrameChannel::new(transport, SESSION_ID, cancel),
            layout,
            identify_timeout: Duration::from_secs(IDENTIFY_TIMEOUT_SECS),
        }
    }

    pub fn with_identify_timeout(mut self, timeout: Duration) -> Self {
        self.identify_timeout = timeout;
        self
    }

    pub fn layout(&self) -> &PackedLayout {
        &self.layout
    }

    /// Asks the token which application it runs. Silence and foreign
    /// applications come back as errors for which `is_not_ready` holds.
    pub fn identify_app(&mut self) -> Result<AppIdentity, SharedError> {
        let request = build_frame(&GET_NAME_VERSION.request, self.channel.session_id());

        self.channel
            .transport_mut()
            .set_read_timeout(Some(self.identify_timeout))?;
        let reply = self.channel.exchange(&request, &GET_NAME_VERSION.response);
        let restored = self.channel.transport_mut().set_read_timeout(None);
        // Silence while identifying means the app is not loaded yet.
        let reply = reply.map_err(|err| match err {
            SharedError::NoReply { command } => SharedError::Eof(command.to_string()),
            other => other,
        })?;
        restored?;

        let identity =
            AppIdentity::parse(reply.payload()).ok_or(SharedError::FrameLengthMismatch {
                command: GET_NAME_VERSION.response.name(),
                expected: GET_NAME_VERSION.response.cmd_len().byte_len(),
                actual: reply.body().len(),
            })?;
        if !identity.is_oath_app() {
            return Err(SharedError::UnexpectedAppIdentity {
                name: identity.name(),
            });
        }

        info!(name = %identity.name(), version = identity.version, "OATH application ready");
        Ok(identity)
    }

    /// Loads an encrypted table of contents. An empty table makes the device
    /// start a fresh one.
    pub fn load_table_of_contents(&mut self, toc: &TableOfContents) -> Result<(), SharedError> {
        let frames = self.channel.upload(&LOAD_TOC, toc.as_bytes())?;
        debug!(descriptors = toc.descriptor_count(), frames, "table of contents loaded");
        Ok(())
    }

    pub fn put_record(&mut self, packed: &[u8]) -> Result<(), SharedError> {
        if packed.len() != self.layout.put_record_size {
            return Err(SharedError::RecordSizeMismatch {
                expected: self.layout.put_record_size,
                actual: packed.len(),
            });
        }
        self.channel.upload(&PUT, packed)?;
        Ok(())
    }

    /// Fetches the record the device sealed after the last put.
    pub fn get_encrypted_put_result(&mut self, expected_size: usize) -> Result<Vec<u8>, SharedError> {
        self.channel
            .download(&PUT_GET_RECORD, ObjectSize::Fixed(expected_size))
    }

    pub fn get_encrypted_table_of_contents(&mut self) -> Result<TableOfContents, SharedError> {
        let bytes = self.channel.download(
            &GET_ENCRYPTED_TOC,
            ObjectSize::CountedWithHeader {
                descriptor_size: self.layout.toc_descriptor_size,
                header_size: self.layout.toc_header_size,
            },
        )?;
        TableOfContents::from_bytes(&self.layout, bytes)
    }

    pub fn get_record_list(&mut self) -> Result<RecordList, SharedError> {
        let bytes = self.channel.download(
            &GET_LIST,
            ObjectSize::CountInStatus {
                descriptor_size: self.layout.toc_descriptor_size,
            },
        )?;
        Ok(RecordList::parse(&self.layout, &bytes))
    }

    /// Returns the code for a packed calculate request.
    pub fn calculate(&mut self, request: &[u8]) -> Result<u32, SharedError> {
        let reply = self.request_calculation(request)?;
        read_code(&reply)
    }

    /// Calculates a counter based code and returns the record the device
    /// re-sealed with the advanced counter.
    pub fn calculate_counter(
        &mut self,
        request: &[u8],
    ) -> Result<(u32, EncryptedRecord), SharedError> {
        let reply = self.request_calculation(request)?;
        let code = read_code(&reply)?;
        let sealed = reply
            .response_data()
            .get(4..4 + self.layout.secure_record_size)
            .ok_or(SharedError::CalculateFailed)?;
        let refreshed = EncryptedRecord::from_bytes(&self.layout, sealed.to_vec())?;
        Ok((code, refreshed))
    }

    fn request_calculation(&mut self, request: &[u8]) -> Result<Frame, SharedError> {
        if request.len() != self.layout.calculate_request_size {
            return Err(SharedError::RecordSizeMismatch {
                expected: self.layout.calculate_request_size,
                actual: request.len(),
            });
        }

        let mut frame = build_frame(&CALCULATE.request, self.channel.session_id());
        let copied = frame.fill_payload(request);
        if copied != request.len() {
            return Err(SharedError::TransferOverrun {
                sent: copied,
                expected: request.len(),
            });
        }

        let reply = self.channel.exchange(&frame, &CALCULATE.response)?;
        if !reply.is_ok() {
            return Err(SharedError::CalculateFailed);
        }
        Ok(reply)
    }
}

fn read_code(reply: &Frame) -> Result<u32, SharedError> {
    reply
        .response_data()
        .get(..4)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(SharedError::CalculateFailed)
}
