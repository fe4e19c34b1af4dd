//! Server-side command handlers.
//!
//! Each handler answers on the control connection and, when there is a
//! payload to move, owns one data session for its own duration. Failures
//! writing to the control connection end the session; everything else only
//! aborts the command.

use std::fs;
use std::io::ErrorKind;
use std::net::{Shutdown, TcpStream};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::broker::{self, DataListener};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::frame;
use crate::protocol::Status;

/// Separator between names in a directory listing.
pub const LISTING_SEPARATOR: &str = ", ";

/// What a handler moved over its data connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    /// Bytes sent to the client
    Sent(usize),
    /// Bytes received from the client
    Received(usize),
    /// Requested file was absent; no data connection was opened
    NotFound,
}

/// Send a status reply on the control connection.
pub fn reply(control: &mut TcpStream, status: Status) -> Result<()> {
    frame::send_text(control, status.as_str()).map_err(Error::control)
}

/// Open a data listener and announce it: `200`, then the advertisement.
fn open_data_session(control: &mut TcpStream, config: &ServerConfig) -> Result<DataListener> {
    let listener = match broker::offer(config.host) {
        Ok(listener) => listener,
        Err(e) => {
            reply(control, Status::CantOpenData)?;
            return Err(e);
        }
    };

    reply(control, Status::Ok)?;
    frame::send_text(control, &listener.advertisement().to_string()).map_err(Error::control)?;
    Ok(listener)
}

/// Receive a file from the client and store it under the served root,
/// replacing any existing file of that name.
pub fn put(control: &mut TcpStream, config: &ServerConfig, filename: &str) -> Result<Transfer> {
    let listener = open_data_session(control, config)?;
    let payload = listener.accept()?.receive(config.buffer_size)?;

    let path = config.root.join(filename);
    fs::write(&path, &payload).map_err(|source| Error::LocalIo {
        path: path.clone(),
        source,
    })?;

    info!(filename, bytes = payload.len(), "Stored upload");
    Ok(Transfer::Received(payload.len()))
}

/// Send a file from the served root to the client, or `550` if it is absent.
pub fn get(control: &mut TcpStream, config: &ServerConfig, filename: &str) -> Result<Transfer> {
    let path = config.root.join(filename);

    // read before replying: a 200 commits both sides to a data phase
    let content = match fs::read(&path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Cannot read requested file");
            }
            reply(control, Status::NotFound)?;
            debug!(filename, "Requested file not found");
            return Ok(Transfer::NotFound);
        }
    };

    let listener = open_data_session(control, config)?;
    listener.accept()?.send(&content)?;

    info!(filename, bytes = content.len(), "Sent download");
    Ok(Transfer::Sent(content.len()))
}

/// Send the served root's entry names, minus the server's own program file.
pub fn ls(control: &mut TcpStream, config: &ServerConfig) -> Result<Transfer> {
    let listener = open_data_session(control, config)?;
    let conn = listener.accept()?;

    let listing = match list_directory(&config.root, &config.program_name) {
        Ok(names) => names.join(LISTING_SEPARATOR),
        Err(e) => {
            warn!(root = %config.root.display(), error = %e, "Cannot list directory");
            String::new()
        }
    };
    conn.send(listing.as_bytes())?;

    Ok(Transfer::Sent(listing.len()))
}

/// Acknowledge `quit` with `211` and close the control connection.
pub fn quit(control: &mut TcpStream) -> Result<()> {
    reply(control, Status::Closing)?;
    if let Err(e) = control.shutdown(Shutdown::Both) {
        debug!(error = %e, "Control connection shutdown");
    }
    info!("Control connection closed");
    Ok(())
}

/// Sorted entry names of `dir`, without `exclude`.
pub fn list_directory(dir: &Path, exclude: &str) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name != exclude {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
