use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset, Local};
use clap::Args;

use tensio::{
    config::load_or_default,
    store::{Reading, RecordStore},
};

#[derive(Args)]
pub struct AddArgs {
    /// Systolic pressure in mmHg
    #[arg(long, short = 's')]
    pub systolic: u8,

    /// Diastolic pressure in mmHg
    #[arg(long, short = 'd')]
    pub diastolic: u8,

    /// Pulse in beats per minute; omit if not measured
    #[arg(long, short = 'p')]
    pub pulse: Option<u8>,

    /// Timestamp of the measurement (RFC 3339); defaults to now
    #[arg(long)]
    pub at: Option<DateTime<FixedOffset>>,
}

pub fn execute(config_path: Option<PathBuf>, args: AddArgs) -> Result<()> {
    validate_range("systolic", args.systolic, 90, 200)?;
    validate_range("diastolic", args.diastolic, 50, 160)?;
    if let Some(pulse) = args.pulse {
        validate_range("pulse", pulse, 40, 120)?;
    }

    let (config, _) = load_or_default(config_path)?;
    let mut store = RecordStore::connect(config.record_store_path())?;

    let reading = Reading {
        taken_at: args.at.unwrap_or_else(|| Local::now().fixed_offset()),
        systolic: args.systolic,
        diastolic: args.diastolic,
        pulse: args.pulse.unwrap_or(0),
    };
    store.save(reading.clone())?;
    store.close()?;

    println!("recorded {reading}");
    Ok(())
}

fn validate_range(field: &str, value: u8, start: u8, end: u8) -> Result<()> {
    if value < start || value > end {
        bail!("{field} value {value} is out of range ({start}-{end})");
    }
    Ok(())
}
