//! ftplite client.
//!
//! [`Client`] owns the control connection and runs one command at a time:
//! send the request, read the status, and when the server advertises a data
//! endpoint, dial it for exactly one payload. The interactive front end lives
//! in [`shell`].

pub mod shell;

use std::fs;
use std::net::{Shutdown, SocketAddr, SocketAddrV4, TcpStream};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::broker::{self, Advertisement};
use crate::config::ClientConfig;
use crate::error::{Error, ProtocolError, Result};
use crate::frame;
use crate::protocol::{Command, Status};

/// Outcome of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
    /// File written locally
    Saved { path: PathBuf, bytes: usize },
    /// Server answered `550`; no data connection was opened
    NotFound,
}

/// Client side of one control session.
pub struct Client {
    control: Option<TcpStream>,
    server: SocketAddr,
    config: ClientConfig,
}

impl Client {
    /// Connect the control channel to the configured server.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let server = SocketAddr::V4(SocketAddrV4::new(config.host, config.port));
        let control = TcpStream::connect(server).map_err(|source| Error::Connect {
            addr: server,
            source,
        })?;
        info!(server = %server, "Connected");

        Ok(Client {
            control: Some(control),
            server,
            config,
        })
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// False once `quit` succeeded or the control connection failed.
    pub fn is_open(&self) -> bool {
        self.control.is_some()
    }

    /// Upload `filename` from the local directory. Returns the bytes sent.
    pub fn put(&mut self, filename: &str) -> Result<usize> {
        refuse_protected(
            filename,
            &self.config.program_name,
            "Cannot send client program",
        )?;

        let path = self.config.local_dir.join(filename);
        let content = fs::read(&path).map_err(|source| Error::LocalIo { path, source })?;

        let result = self.put_content(filename, &content);
        self.settle(result)
    }

    fn put_content(&mut self, filename: &str, content: &[u8]) -> Result<usize> {
        let command = Command::Put {
            filename: filename.to_string(),
        };
        let endpoint = self.request_data_endpoint(&command)?;
        broker::dial(&endpoint)?.send(content)?;

        info!(filename, bytes = content.len(), "Uploaded");
        Ok(content.len())
    }

    /// Download `filename` into the local directory under the same name.
    pub fn get(&mut self, filename: &str) -> Result<Download> {
        let dest = self.config.local_dir.join(filename);
        self.get_as(filename, &dest)
    }

    /// Download `filename` and write it to `dest`, replacing any existing file.
    pub fn get_as(&mut self, filename: &str, dest: &Path) -> Result<Download> {
        refuse_protected(
            filename,
            &self.config.server_program,
            "Cannot download server program",
        )?;

        let result = self.get_content(filename);
        let content = match self.settle(result)? {
            Some(content) => content,
            None => return Ok(Download::NotFound),
        };

        fs::write(dest, &content).map_err(|source| Error::LocalIo {
            path: dest.to_path_buf(),
            source,
        })?;

        info!(filename, dest = %dest.display(), bytes = content.len(), "Downloaded");
        Ok(Download::Saved {
            path: dest.to_path_buf(),
            bytes: content.len(),
        })
    }

    fn get_content(&mut self, filename: &str) -> Result<Option<bytes::Bytes>> {
        let command = Command::Get {
            filename: filename.to_string(),
        };
        self.send_request(&command)?;

        match self.read_status()? {
            Status::Ok => {}
            Status::NotFound => {
                debug!(filename, "Server reported file not found");
                return Ok(None);
            }
            other => return Err(unexpected(Status::Ok, other.as_str())),
        }

        let endpoint = self.read_advertisement()?;
        let content = broker::dial(&endpoint)?.receive(self.config.buffer_size)?;
        Ok(Some(content))
    }

    /// Fetch the server's directory listing.
    pub fn ls(&mut self) -> Result<String> {
        let result = self.ls_content();
        self.settle(result)
    }

    fn ls_content(&mut self) -> Result<String> {
        let endpoint = self.request_data_endpoint(&Command::Ls)?;
        let listing = broker::dial(&endpoint)?.receive(self.config.buffer_size)?;
        String::from_utf8(listing.to_vec()).map_err(|_| Error::data(ProtocolError::InvalidUtf8))
    }

    /// Ask the server to close the session.
    ///
    /// On `211` the control connection is closed and the client is done.
    /// Any other reply leaves the session open so `quit` can be retried.
    pub fn quit(&mut self) -> Result<()> {
        let result = self.quit_handshake();
        let result = self.settle(result);
        if result.is_ok() {
            if let Some(control) = self.control.take() {
                if let Err(e) = control.shutdown(Shutdown::Both) {
                    debug!(error = %e, "Control connection shutdown");
                }
            }
            info!(server = %self.server, "Connection closed");
        }
        result
    }

    fn quit_handshake(&mut self) -> Result<()> {
        self.send_request(&Command::Quit)?;
        let reply = self.read_reply()?;
        match Status::parse(&reply) {
            Some(Status::Closing) => Ok(()),
            _ => Err(unexpected(Status::Closing, &reply)),
        }
    }

    /// Send `command`, expect `200`, and read the advertised data endpoint.
    fn request_data_endpoint(&mut self, command: &Command) -> Result<Advertisement> {
        self.send_request(command)?;
        let reply = self.read_reply()?;
        if Status::parse(&reply) != Some(Status::Ok) {
            return Err(unexpected(Status::Ok, &reply));
        }
        self.read_advertisement()
    }

    fn send_request(&mut self, command: &Command) -> Result<()> {
        let control = self.control.as_mut().ok_or(Error::Closed)?;
        debug!(request = %command.encode(), "Sending request");
        frame::send_text(control, &command.encode()).map_err(Error::control)
    }

    fn read_reply(&mut self) -> Result<String> {
        let buffer_size = self.config.buffer_size;
        let control = self.control.as_mut().ok_or(Error::Closed)?;
        frame::receive_text(control, buffer_size).map_err(Error::control)
    }

    fn read_status(&mut self) -> Result<Status> {
        let reply = self.read_reply()?;
        Status::parse(&reply).ok_or_else(|| unexpected(Status::Ok, &reply))
    }

    fn read_advertisement(&mut self) -> Result<Advertisement> {
        let text = self.read_reply()?;
        Ok(text.parse::<Advertisement>()?)
    }

    /// Drop the control connection if `result` says it is gone.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.ends_session() && self.control.take().is_some() {
                debug!(error = %e, "Control connection dropped");
            }
        }
        result
    }
}

fn unexpected(expected: Status, got: &str) -> Error {
    Error::Protocol(ProtocolError::UnexpectedReply {
        expected: expected.as_str(),
        got: got.to_string(),
    })
}

/// Refuse `filename` if its final component is `protected`.
fn refuse_protected(filename: &str, protected: &str, message: &str) -> Result<()> {
    let name = Path::new(filename).file_name().and_then(|n| n.to_str());
    if name == Some(protected) {
        Err(Error::Rejected(message.to_string()))
    } else {
        Ok(())
    }
}
