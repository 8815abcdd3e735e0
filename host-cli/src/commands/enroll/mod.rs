use shared::error::SharedError;
use shared::oath::{EncryptedRecord, RecordPacker, build_calculate_request, format_code};
use tracing::info;

use crate::bundle::Bundle;
use crate::commands::{DeviceTransport, PreparedRecord};
use crate::session::OathSession;

/// Seals `record` on the device and appends it to `bundle` together with the
/// re-encrypted table of contents that now lists it.
pub fn run<T>(
    session: &mut OathSession<'_, T>,
    packer: &dyn RecordPacker,
    bundle: &mut Bundle,
    record: &PreparedRecord,
    now: u64,
) -> Result<(), SharedError>
where
    T: DeviceTransport + ?Sized,
{
    let layout = *session.layout();
    session.load_table_of_contents(bundle.toc())?;

    session.put_record(record.packed())?;
    let sealed = session.get_encrypted_put_result(layout.secure_record_size)?;
    let mut sealed = EncryptedRecord::from_bytes(&layout, sealed)?;
    info!(name = record.name(), "record sealed by the device");

    let request = build_calculate_request(packer, sealed.as_bytes(), now)?;
    if record.needs_touch() {
        println!("Touch the TKey to confirm the new record.");
    }
    let code = if sealed.is_counter_based() {
        let (code, refreshed) = session.calculate_counter(&request)?;
        sealed = refreshed;
        code
    } else {
        session.calculate(&request)?
    };
    println!("{}: {}", record.name(), format_code(code, record.digits()));

    let toc = session.get_encrypted_table_of_contents()?;
    session.load_table_of_contents(&toc)?;
    let list = session.get_record_list()?;
    match list.descriptors().last() {
        Some(last) if last.name() == record.name().as_bytes() => {}
        last => {
            return Err(SharedError::Bundle(format!(
                "device list ends with {:?} instead of the new record {:?}",
                last.map(|descriptor| descriptor.display_name()),
                record.name()
            )));
        }
    }

    bundle.append(toc, sealed)
}
