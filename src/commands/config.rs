use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use tensio::config::{ConfigUpdate, load_or_default};

#[derive(Args)]
pub struct ConfigArgs {
    /// Move the journal data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

pub fn execute(config_path: Option<PathBuf>, args: ConfigArgs) -> Result<()> {
    let (mut config, path) = load_or_default(config_path)?;

    if args.data_dir.is_none() {
        println!("config file: {}", path.display());
        println!("data dir: {}", config.data_dir.display());
        return Ok(());
    }

    config.apply_update(ConfigUpdate {
        data_dir: args.data_dir,
    });
    config.ensure_data_dir()?;
    config.save(&path)?;
    println!("configuration updated");
    Ok(())
}
