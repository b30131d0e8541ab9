//! # Server
//!
//! The async half of the engine: an accept loop spawning one independent
//! session task per control connection. Sessions share nothing mutable but
//! the transfer log; configuration and the user map are read-only.

mod data;
mod list;
mod session;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::logger::TransferLog;

pub use session::IDLE_TIMEOUT;

/// Accept control connections forever, one session task each.
///
/// Returns only when accepting fails; the caller decides whether that is
/// fatal. Individual session errors are logged and do not stop the loop.
pub async fn serve(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    users: Arc<HashMap<String, String>>,
    log: Arc<TransferLog>,
) -> std::io::Result<()> {
    info!("Server listening on {}", listener.local_addr()?);
    log.message(&format!(
        "Server listening on {}",
        listener.local_addr()?
    ));

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log.error(&e);
                return Err(e);
            }
        };
        debug!("New connection from {addr}");

        let config = Arc::clone(&config);
        let users = Arc::clone(&users);
        let log = Arc::clone(&log);
        tokio::spawn(async move {
            if let Err(e) = session::Session::run(socket, config, users, Arc::clone(&log)).await {
                log.error(&e);
            }
        });
    }
}
