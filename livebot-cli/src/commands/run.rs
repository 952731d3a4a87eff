//! `livebot run` - start the daemon and block until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use livebot_core::{ConfigPaths, ConfigStore, HostBuilder};

#[derive(Args)]
pub struct RunArgs {
    /// Directory holding options.default.json and options.json
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let base = super::config_base(args.config_dir);
    let store = Arc::new(ConfigStore::new(ConfigPaths::under(&base)));

    // Collaborators (listener, admin API, sessions) and plugins are wired
    // here by embedders; the bare binary runs the host alone.
    let host = HostBuilder::new(store.clone()).start().await?;
    tracing::info!(
        config_dir = %base.display(),
        plugins = host.plugin_count(),
        "livebot running"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down, flushing options");
    store.save().await;
    Ok(())
}
