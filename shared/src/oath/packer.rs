use alloc::vec;
use alloc::vec::Vec;

use zeroize::Zeroizing;

use super::layout::{
    CALCULATE_TIME_OFFSET, COUNTER_OFFSET, DIGITS_OFFSET, PROPERTIES_OFFSET, PUT_NAME_LEN_OFFSET,
    PUT_NAME_OFFSET,
};
use super::{EncryptedRecord, OtpKind, PackedLayout, PlaintextRecord};
use crate::error::SharedError;

/// Produces the byte images the device application expects for put and
/// calculate requests.
pub trait RecordPacker {
    fn layout(&self) -> &PackedLayout;

    fn pack_put_record(&self, record: &PlaintextRecord) -> Result<Zeroizing<Vec<u8>>, SharedError>;

    fn pack_calculate(&self, record: &EncryptedRecord, time: u64) -> Result<Vec<u8>, SharedError>;
}

/// Packer for the layout the device firmware is built with.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePacker;

impl RecordPacker for NativePacker {
    fn layout(&self) -> &PackedLayout {
        &PackedLayout::NATIVE
    }

    fn pack_put_record(&self, record: &PlaintextRecord) -> Result<Zeroizing<Vec<u8>>, SharedError> {
        let layout = self.layout();
        let key = record.key();
        if key.len() > layout.max_key_len {
            return Err(SharedError::SecretTooLong {
                actual: key.len(),
                max: layout.max_key_len,
            });
        }
        let name = record.name().as_bytes();
        if name.len() > layout.max_name_len {
            return Err(SharedError::NameTooLong {
                actual: name.len(),
                max: layout.max_name_len,
            });
        }

        let mut packed = Zeroizing::new(vec![0u8; layout.put_record_size]);
        // Both lengths fit a byte once checked against the layout maximums.
        packed[0] = key.len() as u8;
        packed[1..1 + key.len()].copy_from_slice(key);
        packed[COUNTER_OFFSET..COUNTER_OFFSET + 8]
            .copy_from_slice(&record.moving_factor().to_le_bytes());
        packed[PROPERTIES_OFFSET] = record.properties();
        packed[DIGITS_OFFSET] = record.digits();
        packed[PUT_NAME_LEN_OFFSET] = name.len() as u8;
        packed[PUT_NAME_OFFSET..PUT_NAME_OFFSET + name.len()].copy_from_slice(name);
        Ok(packed)
    }

    fn pack_calculate(&self, record: &EncryptedRecord, time: u64) -> Result<Vec<u8>, SharedError> {
        let layout = self.layout();
        let time = u32::try_from(time).map_err(|_| SharedError::TimeOutOfRange(time))?;

        let mut packed = vec![0u8; layout.calculate_request_size];
        packed[..layout.secure_record_size].copy_from_slice(record.as_bytes());
        packed[CALCULATE_TIME_OFFSET..CALCULATE_TIME_OFFSET + 4].copy_from_slice(&time.to_le_bytes());
        Ok(packed)
    }
}

/// Validates user input and packs it into a put request image.
pub fn build_put_record<P: RecordPacker + ?Sized>(
    packer: &P,
    secret: &str,
    name: &str,
    moving_factor: u64,
    kind: OtpKind,
    needs_touch: bool,
    digits: u8,
) -> Result<Zeroizing<Vec<u8>>, SharedError> {
    let record = PlaintextRecord::new(secret, name, moving_factor, kind, needs_touch, digits)?;
    packer.pack_put_record(&record)
}

/// Packs a sealed record with the current unix time into a calculate request.
pub fn build_calculate_request<P: RecordPacker + ?Sized>(
    packer: &P,
    sealed: &[u8],
    time: u64,
) -> Result<Vec<u8>, SharedError> {
    let record = EncryptedRecord::from_bytes(packer.layout(), sealed.to_vec())?;
    packer.pack_calculate(&record, time)
}
