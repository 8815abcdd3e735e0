use shared::error::SharedError;
use shared::oath::{MIN_DIGITS, RecordPacker, build_calculate_request, format_code};
use tracing::debug;

use crate::bundle::Bundle;
use crate::commands::DeviceTransport;
use crate::session::OathSession;

/// Prints the current code of every record in `bundle`. Counter based
/// records come back re-sealed; returns whether any were replaced.
pub fn run<T>(
    session: &mut OathSession<'_, T>,
    packer: &dyn RecordPacker,
    bundle: &mut Bundle,
    now: u64,
) -> Result<bool, SharedError>
where
    T: DeviceTransport + ?Sized,
{
    session.load_table_of_contents(bundle.toc())?;
    let list = session.get_record_list()?;
    if list.is_empty() {
        println!("The bundle holds no records.");
        return Ok(false);
    }
    if list.len() != bundle.records().len() {
        return Err(SharedError::Bundle(format!(
            "device lists {listed} records but the bundle holds {held}",
            listed = list.len(),
            held = bundle.records().len()
        )));
    }

    let mut modified = false;
    for (index, descriptor) in list.descriptors().iter().enumerate() {
        let name = descriptor.display_name();
        let record = &bundle.records()[index];
        let metadata = record.metadata();
        let digits = metadata.map_or(MIN_DIGITS, |metadata| metadata.digits);
        let counter_based = record.is_counter_based();
        let request = build_calculate_request(packer, record.as_bytes(), now)?;

        if metadata.is_some_and(|metadata| metadata.needs_touch) {
            println!("Touch the TKey to reveal {name}.");
        }
        let code = if counter_based {
            let (code, refreshed) = session.calculate_counter(&request)?;
            bundle.replace_record(index, refreshed)?;
            modified = true;
            code
        } else {
            session.calculate(&request)?
        };
        debug!(index, counter_based, "code calculated");
        println!("{name}: {}", format_code(code, digits));
    }

    Ok(modified)
}
