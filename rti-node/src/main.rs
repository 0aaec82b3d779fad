//! `rtinode`: parses its CLI flags and/or server config (spec §6), resolves the listen URLs to
//! bind, and runs each as a server node until killed.

use anyhow::Context;
use clap::Parser;
use rti_node::{cli::Args, config, launch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if args.daemonize {
        tracing::warn!("-b (daemonize) was requested, but this build runs in the foreground only");
    }

    let mut listen = args.listen_urls();
    let mut parent = args.parent.clone();

    if let Some(file_or_literal) = &args.config {
        let loaded = config::load(file_or_literal).context("loading server config")?;
        if !loaded.listen.is_empty() {
            listen = loaded.listen;
        }
        if parent.is_none() {
            parent = loaded.parent_server;
        }
        tracing::info!(
            zlib = loaded.enable_zlib_compression,
            permit_time_regulation = loaded.permit_time_regulation,
            "applied server config"
        );
    }

    let handles = launch::launch(&listen, parent.as_deref())
        .await
        .context("launching server node")?;

    if handles.is_empty() {
        tracing::warn!("no network listeners were started; only in-process leaves (if any) are reachable");
    }

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
