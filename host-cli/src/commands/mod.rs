use std::time::{SystemTime, UNIX_EPOCH};

use shared::error::SharedError;
use shared::oath::{OtpKind, RecordPacker, build_put_record};
use zeroize::Zeroizing;

use crate::bundle::BundleFile;
use crate::session::OathSession;

pub use crate::transport::DeviceTransport;

pub mod codes;
pub mod enroll;

pub trait TransportProvider {
    type Transport: DeviceTransport + ?Sized;

    fn connect(&self, port_path: &str, speed: u32) -> Result<Box<Self::Transport>, SharedError>;
}

/// Record details collected from the command line.
#[derive(Clone)]
pub struct RecordRequest {
    pub secret: Zeroizing<String>,
    pub name: String,
    pub kind: OtpKind,
    pub moving_factor: u64,
    pub needs_touch: bool,
    pub digits: u8,
}

impl RecordRequest {
    /// Validates the request and packs it for the device. Touches nothing
    /// but memory, so bad input is reported before a port is opened.
    pub fn prepare<P>(&self, packer: &P) -> Result<PreparedRecord, SharedError>
    where
        P: RecordPacker + ?Sized,
    {
        let packed = build_put_record(
            packer,
            &self.secret,
            &self.name,
            self.moving_factor,
            self.kind,
            self.needs_touch,
            self.digits,
        )?;
        Ok(PreparedRecord {
            name: self.name.clone(),
            needs_touch: self.needs_touch,
            digits: self.digits,
            packed,
        })
    }
}

/// A validated record packed into the put request image.
pub struct PreparedRecord {
    name: String,
    needs_touch: bool,
    digits: u8,
    packed: Zeroizing<Vec<u8>>,
}

impl PreparedRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn needs_touch(&self) -> bool {
        self.needs_touch
    }

    pub fn digits(&self) -> u8 {
        self.digits
    }

    pub fn packed(&self) -> &[u8] {
        &self.packed
    }
}

/// Runs one bundle session: adds `record` when given, otherwise prints the
/// code of every record in the bundle.
pub fn run<T>(
    session: &mut OathSession<'_, T>,
    bundle_file: &mut BundleFile,
    packer: &dyn RecordPacker,
    record: Option<&PreparedRecord>,
    now: u64,
) -> Result<(), SharedError>
where
    T: DeviceTransport + ?Sized,
{
    ensure_oath_app(session)?;
    let mut bundle = bundle_file.load(session.layout())?;

    let modified = match record {
        Some(record) => {
            enroll::run(session, packer, &mut bundle, record, now)?;
            true
        }
        None => codes::run(session, packer, &mut bundle, now)?,
    };

    if modified {
        bundle_file.store(&bundle)?;
        println!(
            "Saved {count} record(s) to {path}.",
            count = bundle.records().len(),
            path = bundle_file.path().display()
        );
    }
    Ok(())
}

fn ensure_oath_app<T>(session: &mut OathSession<'_, T>) -> Result<(), SharedError>
where
    T: DeviceTransport + ?Sized,
{
    session.identify_app().inspect_err(|err| {
        if err.is_not_ready() {
            eprintln!(
                "The TKey is not running the OATH app. If it already runs another app, \
                 unplug it, plug it back in and load the OATH app."
            );
        }
    })?;
    Ok(())
}

pub fn current_unix_time() -> Result<u64, SharedError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|err| SharedError::Config(format!("system clock is before 1970: {err}")))
}
