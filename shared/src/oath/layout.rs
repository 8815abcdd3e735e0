//! Sizes of the packed structures shared with the device application.

pub const RECORD_KEY_MAXLEN: usize = 66;
pub const RECORD_NAME_MAXLEN: usize = 64;
pub const NONCE_LEN: usize = 24;
pub const MAC_LEN: usize = 16;
pub const TOC_DESCRIPTORS_MAXCOUNT: usize = 32;

/// Properties bit selecting counter based codes; cleared means time based.
pub const PROP_TYPE_HOTP: u8 = 0x80;
/// Properties bit requiring a touch before the code is released.
pub const PROP_TOUCH_YES: u8 = 0x10;

// key_len + key
pub(crate) const SECRET_SIZE: usize = 1 + RECORD_KEY_MAXLEN;
// u64 counter or time step, properties, digits
pub(crate) const PROTECTED_SIZE: usize = 8 + 1 + 1;

pub(crate) const COUNTER_OFFSET: usize = SECRET_SIZE;
pub(crate) const PROPERTIES_OFFSET: usize = COUNTER_OFFSET + 8;
pub(crate) const DIGITS_OFFSET: usize = PROPERTIES_OFFSET + 1;

pub const RECORD_SIZE: usize = SECRET_SIZE + PROTECTED_SIZE;
pub const SECURE_RECORD_SIZE: usize = RECORD_SIZE + NONCE_LEN + MAC_LEN;

pub const PUT_NAME_LEN_OFFSET: usize = RECORD_SIZE;
pub const PUT_NAME_OFFSET: usize = PUT_NAME_LEN_OFFSET + 1;
pub const PUT_RECORD_SIZE: usize = PUT_NAME_OFFSET + RECORD_NAME_MAXLEN;

pub const CALCULATE_TIME_OFFSET: usize = SECURE_RECORD_SIZE;
pub const CALCULATE_REQUEST_SIZE: usize = CALCULATE_TIME_OFFSET + 4;

// descriptor_count + nonce + mac + settings
pub const TOC_HEADER_SIZE: usize = 1 + NONCE_LEN + MAC_LEN + 1;
// name_len + name
pub const TOC_DESCRIPTOR_SIZE: usize = 1 + RECORD_NAME_MAXLEN;

/// Structure sizes the protocol logic consumes. Nothing outside this module
/// should assume the native values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedLayout {
    pub max_key_len: usize,
    pub max_name_len: usize,
    pub secure_record_size: usize,
    pub toc_header_size: usize,
    pub toc_descriptor_size: usize,
    pub put_record_size: usize,
    pub calculate_request_size: usize,
    pub max_descriptors: usize,
}

impl PackedLayout {
    pub const NATIVE: PackedLayout = PackedLayout {
        max_key_len: RECORD_KEY_MAXLEN,
        max_name_len: RECORD_NAME_MAXLEN,
        secure_record_size: SECURE_RECORD_SIZE,
        toc_header_size: TOC_HEADER_SIZE,
        toc_descriptor_size: TOC_DESCRIPTOR_SIZE,
        put_record_size: PUT_RECORD_SIZE,
        calculate_request_size: CALCULATE_REQUEST_SIZE,
        max_descriptors: TOC_DESCRIPTORS_MAXCOUNT,
    };

    /// Encrypted table of contents length for `count` descriptors.
    pub fn toc_size(&self, count: usize) -> usize {
        self.toc_header_size + count * self.toc_descriptor_size
    }
}

impl Default for PackedLayout {
    fn default() -> Self {
        Self::NATIVE
    }
}
