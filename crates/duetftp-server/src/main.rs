//! # ftpserver
//!
//! The duetftp server daemon: loads `ftpserver.config`, rotates the transfer
//! logs, and serves concurrent FTP sessions on the given port.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use env_logger::Env;
use log::info;
use tokio::net::TcpListener;

use duetftp::config::{self, ServerConfig, DEFAULT_CONFIG_PATH};
use duetftp::server;
use duetftp::TransferLog;

#[derive(FromArgs)]
#[argh(description = "duetftp server daemon")]
struct Args {
    #[argh(positional, description = "port to listen on")]
    port: u16,
    #[argh(
        option,
        default = "String::from(DEFAULT_CONFIG_PATH)",
        description = "path to the server configuration file"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args: Args = argh::from_env();

    let config = ServerConfig::load(Path::new(&args.config))
        .with_context(|| format!("loading configuration from {}", args.config))?;

    let log = Arc::new(
        TransferLog::rolling(&config.log_dir, config.num_log_files)
            .with_context(|| format!("opening transfer log in {}", config.log_dir.display()))?,
    );

    if let Err(e) = config.ensure_transfer_mode() {
        log.error(&e);
        return Err(e.into());
    }

    let users = match config::load_users(&config.users_file) {
        Ok(users) => Arc::new(users),
        Err(e) => {
            log.error(&e);
            return Err(e.into());
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", args.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            log.error(&e);
            return Err(e).with_context(|| format!("binding port {}", args.port));
        }
    };

    tokio::select! {
        result = server::serve(listener, Arc::new(config), users, Arc::clone(&log)) => {
            result.context("accept loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            log.message("Server shut down");
        }
    }

    Ok(())
}
