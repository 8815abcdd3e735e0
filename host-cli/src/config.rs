use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use shared::error::SharedError;
use shared::oath::OtpKind;
use zeroize::Zeroizing;

use crate::commands::RecordRequest;
use crate::constants::{IDENTIFY_TIMEOUT_SECS, SERIAL_BAUD_RATE};
use crate::{Cli, RecordArgs};

pub const DEFAULT_PERIOD_SECS: u64 = 30;

/// Optional JSON file with connection defaults. Command line flags win.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub speed: Option<u32>,
    #[serde(default)]
    pub any_port: Option<bool>,
    #[serde(default)]
    pub identify_timeout_secs: Option<u64>,
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self, SharedError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            SharedError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            SharedError::Config(format!("failed to parse {}: {err}", path.display()))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleTarget {
    Create(PathBuf),
    Open(PathBuf),
}

/// Everything one run needs, merged from flags and the config file.
pub struct RunSettings {
    pub port: Option<String>,
    pub any_port: bool,
    pub speed: u32,
    pub identify_timeout: Duration,
    pub target: BundleTarget,
    pub record: Option<RecordRequest>,
}

impl RunSettings {
    pub fn resolve(cli: &Cli) -> Result<Self, SharedError> {
        let config = match &cli.config {
            Some(path) => HostConfig::load(path)?,
            None => HostConfig::default(),
        };
        Self::from_parts(cli, config)
    }

    pub fn from_parts(cli: &Cli, config: HostConfig) -> Result<Self, SharedError> {
        let target = match (&cli.bundle, &cli.create) {
            (Some(path), None) => BundleTarget::Open(path.clone()),
            (None, Some(path)) => BundleTarget::Create(path.clone()),
            _ => {
                return Err(SharedError::Config(
                    "pass exactly one of --bundle or --create".into(),
                ));
            }
        };

        let record = record_request(&cli.record);
        if matches!(target, BundleTarget::Create(_)) && record.is_none() {
            return Err(SharedError::Config(
                "--create needs --secret and --name for the first record".into(),
            ));
        }

        Ok(Self {
            port: cli.port.clone().or(config.port),
            any_port: cli.any_port || config.any_port.unwrap_or(false),
            speed: cli.speed.or(config.speed).unwrap_or(SERIAL_BAUD_RATE),
            identify_timeout: Duration::from_secs(
                config.identify_timeout_secs.unwrap_or(IDENTIFY_TIMEOUT_SECS),
            ),
            target,
            record,
        })
    }
}

fn record_request(args: &RecordArgs) -> Option<RecordRequest> {
    let (secret, name) = (args.secret.as_ref()?, args.name.as_ref()?);
    let (kind, moving_factor) = if args.hotp {
        (OtpKind::Hotp, args.counter.unwrap_or(0))
    } else {
        (OtpKind::Totp, args.period.unwrap_or(DEFAULT_PERIOD_SECS))
    };
    Some(RecordRequest {
        secret: Zeroizing::new(secret.clone()),
        name: name.clone(),
        kind,
        moving_factor,
        needs_touch: args.touch,
        digits: args.digits,
    })
}
