use std::cell::RefCell;

use serialport::SerialPortType;
use shared::error::SharedError;
use shared::oath::{NativePacker, OtpKind, RecordPacker};
use zeroize::Zeroizing;

use crate::cancel::CancellationToken;
use crate::commands::{RecordRequest, TransportProvider};
use crate::session::OathSession;
use crate::transport::DeviceTransport;


pub(crate) use token::SimulatedToken;

/// The secret used throughout the documentation of the OATH app.
pub(crate) const DEMO_SECRET: &str = "JBSWY3DPEHPK3PXP";
pub(crate) const DEMO_KEY: &[u8] = b"Hello!\xde\xad\xbe\xef";
pub(crate) const DEMO_NAME: &str = "totp.danhersam.com";
pub(crate) const DEMO_TIME: u64 = 1_700_000_000;

pub(crate) fn usb_port(
    name: &str,
    vid: u16,
    pid: u16,
    product: Option<&str>,
) -> serialport::SerialPortInfo {
    serialport::SerialPortInfo {
        port_name: name.to_string(),
        port_type: SerialPortType::UsbPort(serialport::UsbPortInfo {
            vid,
            pid,
            serial_number: None,
            manufacturer: None,
            product: product.map(|value| value.to_string()),
            interface: None,
        }),
    }
}

pub(crate) fn non_usb_port(name: &str) -> serialport::SerialPortInfo {
    serialport::SerialPortInfo {
        port_name: name.to_string(),
        port_type: SerialPortType::PciPort,
    }
}

pub(crate) fn session<T>(transport: &mut T) -> OathSession<'_, T>
where
    T: DeviceTransport + ?Sized,
{
    OathSession::new(transport, *NativePacker.layout(), CancellationToken::new())
}

pub(crate) fn totp_request(name: &str, secret: &str) -> RecordRequest {
    RecordRequest {
        secret: Zeroizing::new(secret.to_string()),
        name: name.to_string(),
        kind: OtpKind::Totp,
        moving_factor: 30,
        needs_touch: false,
        digits: 6,
    }
}

pub(crate) fn hotp_request(name: &str, secret: &str, counter: u64) -> RecordRequest {
    RecordRequest {
        kind: OtpKind::Hotp,
        moving_factor: counter,
        digits: 8,
        ..totp_request(name, secret)
    }
}

/// Hands out pre-built simulated tokens and remembers the ports asked for.
pub(crate) struct SimulatedTokenProvider {
    tokens: RefCell<Vec<SimulatedToken>>,
    pub(crate) requested_ports: RefCell<Vec<(String, u32)>>,
}

impl SimulatedTokenProvider {
    pub(crate) fn new(token: SimulatedToken) -> Self {
        Self {
            tokens: RefCell::new(vec![token]),
            requested_ports: RefCell::new(Vec::new()),
        }
    }
}

impl TransportProvider for SimulatedTokenProvider {
    type Transport = SimulatedToken;

    fn connect(&self, port_path: &str, speed: u32) -> Result<Box<Self::Transport>, SharedError> {
        self.requested_ports
            .borrow_mut()
            .push((port_path.to_string(), speed));
        self.tokens
            .borrow_mut()
            .pop()
            .map(Box::new)
            .ok_or_else(|| SharedError::Transport(format!("no token attached to {port_path}")))
    }
}
