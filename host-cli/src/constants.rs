use std::time::Duration;

pub const SERIAL_BAUD_RATE: u32 = 62_500;
pub const IDENTIFY_TIMEOUT_SECS: u64 = 2;
/// Read timeout used once identification is over. Calculations on records
/// that require a touch block until the user presses the token.
pub const BLOCKING_READ_TIMEOUT: Duration = Duration::from_secs(60 * 60);

pub const TKEY_USB_VID: u16 = 0x1207;
pub const TKEY_USB_PID: u16 = 0x8887;
pub const TKEY_IDENTITY_KEYWORDS: &[&str] = &["tillitis", "tkey", "mta1"];

/// Name halves the OATH device application reports.
pub const APP_NAME0: &[u8; 4] = b"tk1 ";
pub const APP_NAME1: &[u8; 4] = b"oath";
