//! # Config
//!
//! Loader for the `ftpserver.config` key=value file and the users file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::types::{FtpError, FtpResult};

/// Default location of the server configuration, relative to the working
/// directory the server was started in.
pub const DEFAULT_CONFIG_PATH: &str = "ftpserver.config";

/// Server configuration.
///
/// One `key=value` pair per line; lines opening with `#` are comments.
/// Unknown keys and unparseable values are warned about and skipped so an
/// operator typo does not take the server down.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory the rolling transfer logs are placed in
    pub log_dir: PathBuf,
    /// Maximum number of retained prior logs
    pub num_log_files: usize,
    /// Path to the users file
    pub users_file: PathBuf,
    /// Whether PORT/EPRT (active mode) is available
    pub port_mode: bool,
    /// Whether PASV/EPSV (passive mode) is available
    pub pasv_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("/var/spool/logfiles"),
            num_log_files: 5,
            users_file: PathBuf::new(),
            port_mode: false,
            pasv_mode: true,
        }
    }
}

impl ServerConfig {
    /// Load the configuration from `path`, applying defaults for absent keys.
    pub fn load(path: &Path) -> FtpResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            FtpError::InvalidConfig(format!("reading {}: {e}", path.display()))
        })?;

        let mut config = Self::default();
        for line in text.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!("skipping configuration line without '=': {line}");
                continue;
            };

            match key {
                "logdirectory" => config.log_dir = PathBuf::from(value),
                "numlogfiles" => match value.parse() {
                    Ok(n) => config.num_log_files = n,
                    Err(e) => warn!("numlogfiles: {e}, keeping {}", config.num_log_files),
                },
                "usernamefile" => config.users_file = PathBuf::from(value),
                "port_mode" => match parse_yes_no(value) {
                    Some(b) => config.port_mode = b,
                    None => warn!("port_mode: unrecognized boolean value {value}"),
                },
                "pasv_mode" => match parse_yes_no(value) {
                    Some(b) => config.pasv_mode = b,
                    None => warn!("pasv_mode: unrecognized boolean value {value}"),
                },
                _ => warn!("unrecognized setting {line}"),
            }
        }

        Ok(config)
    }

    /// A server with neither active nor passive mode cannot transfer
    /// anything; refuse to start.
    pub fn ensure_transfer_mode(&self) -> FtpResult<()> {
        if !self.port_mode && !self.pasv_mode {
            return Err(FtpError::InvalidConfig(String::from(
                "port_mode and pasv_mode cannot both be NO",
            )));
        }
        Ok(())
    }
}

fn parse_yes_no(value: &str) -> Option<bool> {
    match value.to_ascii_uppercase().as_str() {
        "YES" => Some(true),
        "NO" => Some(false),
        _ => None,
    }
}

/// Load the users file: one `username password` pair per line, separated by a
/// single space. Lines with any other shape are skipped.
pub fn load_users(path: &Path) -> FtpResult<HashMap<String, String>> {
    let text = fs::read_to_string(path).map_err(|e| {
        FtpError::InvalidConfig(format!("reading users file {}: {e}", path.display()))
    })?;

    let mut users = HashMap::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split(' ').collect();
        let &[username, password] = fields.as_slice() else {
            continue;
        };
        users.insert(username.to_string(), password.to_string());
    }

    Ok(users)
}
