//! OATH record model: plaintext records before sealing, sealed records and
//! the table of contents kept in a bundle, and the device's record list.

use alloc::borrow::Cow;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use data_encoding::BASE32_NOPAD;
use zeroize::Zeroizing;

use crate::error::SharedError;

pub mod layout;
mod packer;

pub use layout::PackedLayout;
pub use packer::{NativePacker, RecordPacker, build_calculate_request, build_put_record};

use layout::{COUNTER_OFFSET, DIGITS_OFFSET, PROP_TOUCH_YES, PROP_TYPE_HOTP, PROPERTIES_OFFSET};

pub const MIN_DIGITS: u8 = 6;
pub const MAX_DIGITS: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpKind {
    /// Time based; the moving factor is the time step in seconds.
    Totp,
    /// Counter based; the moving factor is the next counter value.
    Hotp,
}

/// A record as entered by the user, before the device seals it.
#[derive(Clone)]
pub struct PlaintextRecord {
    key: Zeroizing<Vec<u8>>,
    name: String,
    kind: OtpKind,
    moving_factor: u64,
    needs_touch: bool,
    digits: u8,
}

impl PlaintextRecord {
    pub fn new(
        secret: &str,
        name: &str,
        moving_factor: u64,
        kind: OtpKind,
        needs_touch: bool,
        digits: u8,
    ) -> Result<Self, SharedError> {
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
            return Err(SharedError::UnsupportedDigits(digits));
        }
        if kind == OtpKind::Totp && moving_factor == 0 {
            return Err(SharedError::InvalidTimeStep);
        }

        let key = decode_secret(secret).ok_or(SharedError::InvalidSecretEncoding)?;
        Ok(Self {
            key,
            name: String::from(name),
            kind,
            moving_factor,
            needs_touch,
            digits,
        })
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OtpKind {
        self.kind
    }

    pub fn moving_factor(&self) -> u64 {
        self.moving_factor
    }

    pub fn needs_touch(&self) -> bool {
        self.needs_touch
    }

    pub fn digits(&self) -> u8 {
        self.digits
    }

    pub fn properties(&self) -> u8 {
        let mut properties = 0;
        if self.kind == OtpKind::Hotp {
            properties |= PROP_TYPE_HOTP;
        }
        if self.needs_touch {
            properties |= PROP_TOUCH_YES;
        }
        properties
    }
}

impl fmt::Debug for PlaintextRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaintextRecord")
            .field("key", &"<redacted>")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("moving_factor", &self.moving_factor)
            .field("needs_touch", &self.needs_touch)
            .field("digits", &self.digits)
            .finish()
    }
}

/// Decodes an unpadded base32 secret, ignoring whitespace and case.
pub fn decode_secret(secret: &str) -> Option<Zeroizing<Vec<u8>>> {
    let normalized: Zeroizing<String> = Zeroizing::new(
        secret
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect(),
    );
    if normalized.is_empty() {
        return None;
    }
    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .ok()
        .map(Zeroizing::new)
}

/// Unencrypted metadata travelling alongside a sealed secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMetadata {
    pub kind: OtpKind,
    pub needs_touch: bool,
    pub digits: u8,
    pub moving_factor: u64,
}

/// A record sealed by the device. Only the device can open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    bytes: Vec<u8>,
}

impl EncryptedRecord {
    pub fn from_bytes(layout: &PackedLayout, bytes: Vec<u8>) -> Result<Self, SharedError> {
        if bytes.len() != layout.secure_record_size {
            return Err(SharedError::RecordSizeMismatch {
                expected: layout.secure_record_size,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn metadata(&self) -> Option<RecordMetadata> {
        let counter = self.bytes.get(COUNTER_OFFSET..COUNTER_OFFSET + 8)?;
        let properties = *self.bytes.get(PROPERTIES_OFFSET)?;
        let digits = *self.bytes.get(DIGITS_OFFSET)?;
        Some(RecordMetadata {
            kind: if properties & PROP_TYPE_HOTP != 0 {
                OtpKind::Hotp
            } else {
                OtpKind::Totp
            },
            needs_touch: properties & PROP_TOUCH_YES != 0,
            digits,
            moving_factor: u64::from_le_bytes(counter.try_into().ok()?),
        })
    }

    pub fn is_counter_based(&self) -> bool {
        self.metadata()
            .is_some_and(|metadata| metadata.kind == OtpKind::Hotp)
    }
}

/// Encrypted table of contents. The leading byte counts the descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOfContents {
    bytes: Vec<u8>,
}

impl TableOfContents {
    /// A table the device initialises from scratch when loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bytes(layout: &PackedLayout, bytes: Vec<u8>) -> Result<Self, SharedError> {
        let Some(&count) = bytes.first() else {
            return Ok(Self::empty());
        };
        let expected = layout.toc_size(usize::from(count));
        if bytes.len() != expected {
            return Err(SharedError::TocSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn descriptor_count(&self) -> usize {
        self.bytes.first().copied().map_or(0, usize::from)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Name of one record as reported by the device list operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDescriptor {
    name: Vec<u8>,
}

impl RecordDescriptor {
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn display_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordList {
    descriptors: Vec<RecordDescriptor>,
}

impl RecordList {
    /// Splits a list payload into fixed-size descriptors. A trailing partial
    /// descriptor is ignored.
    pub fn parse(layout: &PackedLayout, bytes: &[u8]) -> Self {
        let descriptors = bytes
            .chunks_exact(layout.toc_descriptor_size)
            .map(|chunk| {
                let len = usize::from(chunk[0]).min(chunk.len() - 1);
                RecordDescriptor {
                    name: chunk[1..1 + len].to_vec(),
                }
            })
            .collect();
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[RecordDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Renders a code zero padded to the configured number of digits.
pub fn format_code(code: u32, digits: u8) -> String {
    format!("{:0width$}", code, width = usize::from(digits))
}
