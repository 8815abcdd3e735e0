use serialport::SerialPort;
use shared::error::SharedError;
use shared::oath::{NativePacker, RecordPacker};
use tracing::{info, warn};

use crate::bundle::BundleFile;
use crate::cancel::CancellationToken;
use crate::commands::{self, DeviceTransport, PreparedRecord, TransportProvider};
use crate::config::{BundleTarget, RunSettings};
use crate::session::OathSession;
use crate::transport::detect_first_serial_port;

pub struct SerialTransportProvider;

impl TransportProvider for SerialTransportProvider {
    type Transport = dyn SerialPort;

    fn connect(&self, port_path: &str, speed: u32) -> Result<Box<Self::Transport>, SharedError> {
        crate::transport::open_serial_port(port_path, speed)
    }
}

pub fn select_port(settings: &RunSettings) -> Result<String, SharedError> {
    match &settings.port {
        Some(port) => Ok(port.clone()),
        None => detect_first_serial_port(settings.any_port),
    }
}

pub fn connect_transport<P>(
    settings: &RunSettings,
    transport_provider: &P,
) -> Result<Box<P::Transport>, SharedError>
where
    P: TransportProvider,
{
    let port_path = select_port(settings)?;
    info!(port = %port_path, speed = settings.speed, "connecting to TKey");
    transport_provider.connect(&port_path, settings.speed)
}

/// Validates input, opens the bundle, then runs the session. The transport
/// is closed whether or not the session succeeds, and a bundle created by a
/// failed run is removed again.
pub fn execute<P>(
    settings: RunSettings,
    transport_provider: &P,
    cancel: CancellationToken,
) -> Result<(), SharedError>
where
    P: TransportProvider,
{
    let packer = NativePacker;
    let prepared = settings
        .record
        .as_ref()
        .map(|record| record.prepare(&packer))
        .transpose()?;

    let mut bundle_file = match &settings.target {
        BundleTarget::Create(path) => BundleFile::create(path)?,
        BundleTarget::Open(path) => BundleFile::open(path)?,
    };

    let result = run_session(
        &settings,
        transport_provider,
        &mut bundle_file,
        &packer,
        prepared.as_ref(),
        cancel,
    );

    if result.is_err() && matches!(settings.target, BundleTarget::Create(_)) {
        if let Err(err) = bundle_file.discard() {
            warn!(error = %err, "failed to remove the unfinished bundle");
        }
    }
    result
}

fn run_session<P>(
    settings: &RunSettings,
    transport_provider: &P,
    bundle_file: &mut BundleFile,
    packer: &NativePacker,
    prepared: Option<&PreparedRecord>,
    cancel: CancellationToken,
) -> Result<(), SharedError>
where
    P: TransportProvider,
{
    let mut transport = connect_transport(settings, transport_provider)?;
    let result = commands::current_unix_time().and_then(|now| {
        let mut session = OathSession::new(&mut *transport, *packer.layout(), cancel)
            .with_identify_timeout(settings.identify_timeout);
        commands::run(&mut session, bundle_file, packer, prepared, now)
    });

    if let Err(err) = close_transport(&mut *transport) {
        warn!(error = %err, "failed to close the transport cleanly");
    }
    result
}

fn close_transport<T>(transport: &mut T) -> Result<(), SharedError>
where
    T: DeviceTransport + ?Sized,
{
    transport.close()
}
