use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use tensio::{config::load_or_default, store::RecordStore};

#[derive(Args)]
pub struct ListArgs {
    /// Emit the readings as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn execute(config_path: Option<PathBuf>, args: ListArgs) -> Result<()> {
    let (config, _) = load_or_default(config_path)?;
    let mut store = RecordStore::connect(config.record_store_path())?;
    let readings = store.read_all()?;
    store.close()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&readings)?);
        return Ok(());
    }

    if readings.is_empty() {
        println!("no readings recorded");
        return Ok(());
    }

    for reading in &readings {
        println!("{reading}");
    }
    Ok(())
}
