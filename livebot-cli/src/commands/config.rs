//! `livebot config` - validate and inspect the option documents.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use livebot_core::{ConfigPaths, ConfigStore};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,

    /// Directory holding options.default.json and options.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Validate the user option document
    Check,
    /// Print the merged configuration as it would be persisted
    Show,
}

pub async fn run(args: ConfigArgs) -> Result<()> {
    let base = super::config_base(args.config_dir);
    let paths = ConfigPaths::under(&base);

    match args.command {
        ConfigCommands::Check => {
            let text = std::fs::read_to_string(&paths.user)?;
            if ConfigStore::validate(&text) {
                println!("{} is valid", paths.user.display());
                Ok(())
            } else {
                bail!("{} does not parse as an option document", paths.user.display());
            }
        }
        ConfigCommands::Show => {
            let store = ConfigStore::new(paths);
            store.load().await?;
            store.merge().await;
            let snapshot = store.persisted_snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}
