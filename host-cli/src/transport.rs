use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};
use shared::command::AppCommand;
use shared::error::SharedError;
use shared::frame::{FRAME_HEADER_SIZE, Frame, FrameHeader, parse_frame};
use tracing::trace;

use crate::constants::{BLOCKING_READ_TIMEOUT, TKEY_IDENTITY_KEYWORDS, TKEY_USB_PID, TKEY_USB_VID};

#[cfg(test)]
pub mod memory;

/// Abstraction over links able to exchange fixed-size frames with the token.
pub trait DeviceTransport {
    /// Write a complete frame, header byte included.
    fn write_frame(&mut self, frame: &Frame) -> Result<(), SharedError>;

    /// Read the next frame and validate it against the expected response.
    fn read_frame(&mut self, expected: &AppCommand, session_id: u8) -> Result<Frame, SharedError>;

    /// Bound how long a read may block. `None` restores blocking reads.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), SharedError>;

    /// Flush and release the link. Safe to call more than once.
    fn close(&mut self) -> Result<(), SharedError>;
}

/// Byte stream with an adjustable read timeout, such as a serial port.
pub trait FramePort: Read + Write {
    fn set_port_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl FramePort for dyn SerialPort {
    fn set_port_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}

impl<T> DeviceTransport for T
where
    T: FramePort + ?Sized,
{
    fn write_frame(&mut self, frame: &Frame) -> Result<(), SharedError> {
        write_raw_frame(self, frame)
    }

    fn read_frame(&mut self, expected: &AppCommand, session_id: u8) -> Result<Frame, SharedError> {
        let raw = read_raw_frame(self, expected)?;
        parse_frame(&raw, expected, session_id)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), SharedError> {
        self.set_port_timeout(timeout.unwrap_or(BLOCKING_READ_TIMEOUT))
            .map_err(map_io_error("configure read timeout"))
    }

    fn close(&mut self) -> Result<(), SharedError> {
        self.flush().map_err(map_io_error("flush on close"))
    }
}

pub fn open_serial_port(path: &str, speed: u32) -> Result<Box<dyn SerialPort>, SharedError> {
    serialport::new(path, speed)
        .timeout(BLOCKING_READ_TIMEOUT)
        .open()
        .map_err(|err| {
            SharedError::Transport(format!("failed to open serial port {path}: {err}"))
        })
}

pub fn detect_first_serial_port(allow_any_port: bool) -> Result<String, SharedError> {
    let ports = serialport::available_ports().map_err(|err| {
        SharedError::Transport(format!("failed to enumerate serial ports: {err}"))
    })?;

    select_serial_port(&ports, allow_any_port)
        .map(|info| info.port_name.clone())
        .ok_or_else(|| missing_tkey_error(allow_any_port))
}

pub fn select_serial_port(
    ports: &[serialport::SerialPortInfo],
    allow_any_port: bool,
) -> Option<&serialport::SerialPortInfo> {
    if allow_any_port {
        return ports
            .iter()
            .find(|info| matches!(info.port_type, SerialPortType::UsbPort(_)));
    }

    let mut matches = ports.iter().filter(|info| matches_tkey_vid_pid(info)).peekable();

    let first = matches.next()?;
    if matches.peek().is_none() {
        return Some(first);
    }

    std::iter::once(first)
        .chain(matches)
        .find(|info| matches_tkey_identity(info))
        .or(Some(first))
}

pub fn matches_tkey_vid_pid(info: &serialport::SerialPortInfo) -> bool {
    matches!(
        &info.port_type,
        SerialPortType::UsbPort(usb) if usb.vid == TKEY_USB_VID && usb.pid == TKEY_USB_PID
    )
}

pub fn matches_tkey_identity(info: &serialport::SerialPortInfo) -> bool {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => [
            usb.product.as_deref(),
            usb.manufacturer.as_deref(),
            usb.serial_number.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(contains_keyword),
        _ => false,
    }
}

fn contains_keyword(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    TKEY_IDENTITY_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

pub fn missing_tkey_error(allow_any_port: bool) -> SharedError {
    let mut message = format!(
        "TKey not found (expected VID 0x{TKEY_USB_VID:04X}, PID 0x{TKEY_USB_PID:04X})."
    );

    if !allow_any_port {
        message.push_str(" Pass --any-port to connect to the first available USB serial device.");
    }

    SharedError::Transport(message)
}

fn write_raw_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), SharedError>
where
    W: Write + ?Sized,
{
    let wire = frame.to_wire();
    trace!(target: "runoath::frames", "tx {}", hex_encode(&wire));
    writer
        .write_all(&wire)
        .map_err(map_io_error("write frame"))?;
    writer.flush().map_err(map_io_error("flush frame"))
}

/// Reads one frame whose body length is taken from its header byte.
fn read_raw_frame<R>(reader: &mut R, expected: &AppCommand) -> Result<Vec<u8>, SharedError>
where
    R: Read + ?Sized,
{
    let mut raw = vec![0u8; FRAME_HEADER_SIZE];
    read_or_timeout(reader, &mut raw, expected)?;
    let header = FrameHeader::decode(raw[0])?;

    raw.resize(FRAME_HEADER_SIZE + header.cmd_len.byte_len(), 0);
    read_or_timeout(reader, &mut raw[FRAME_HEADER_SIZE..], expected)?;
    trace!(target: "runoath::frames", "rx {}", hex_encode(&raw));
    Ok(raw)
}

fn read_or_timeout<R>(reader: &mut R, buf: &mut [u8], expected: &AppCommand) -> Result<(), SharedError>
where
    R: Read + ?Sized,
{
    reader.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            SharedError::NoReply {
                command: expected.name(),
            }
        }
        _ => map_io_error("read frame")(err),
    })
}

fn map_io_error(context: &'static str) -> impl Fn(io::Error) -> SharedError {
    move |err| {
        let mut message = format!("{context} failed: {err}");
        if err.kind() == io::ErrorKind::TimedOut {
            message.push_str(" (operation timed out)");
        }
        SharedError::Transport(message)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02X}")).collect()
}
