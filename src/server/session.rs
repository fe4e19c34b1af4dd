//! Control session state machine.
//!
//! ```text
//! AwaitingCommand --frame--> Dispatching --handler done--> AwaitingCommand
//!                                        --quit---------> Closed
//! ```
//!
//! One request is handled to completion, data phase included, before the
//! next frame is read from the control connection.

use std::net::{SocketAddr, TcpStream};
use tracing::{debug, info, warn};

use super::handler;
use crate::config::ServerConfig;
use crate::error::{ChannelError, Error, ProtocolError, Result};
use crate::frame;
use crate::protocol::{Command, Status};

/// Where the session is in its request loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingCommand,
    Dispatching,
    Closed,
}

/// Owns the control connection for one client.
pub struct ControlSession {
    control: TcpStream,
    peer: SocketAddr,
    config: ServerConfig,
    state: SessionState,
    commands: u64,
}

impl ControlSession {
    pub fn new(control: TcpStream, peer: SocketAddr, config: ServerConfig) -> Self {
        Self {
            control,
            peer,
            config,
            state: SessionState::AwaitingCommand,
            commands: 0,
        }
    }

    /// Requests handled so far, including rejected ones.
    pub fn commands_served(&self) -> u64 {
        self.commands
    }

    /// Serve requests until `quit`, a client hang-up, or a control failure.
    pub fn run(&mut self) -> Result<()> {
        while self.state != SessionState::Closed {
            let line = match frame::receive_text(&mut self.control, self.config.buffer_size) {
                Ok(line) => line,
                Err(ChannelError::Protocol(e)) if e.is_clean_close() => {
                    info!(peer = %self.peer, "Client disconnected without quit");
                    self.state = SessionState::Closed;
                    return Ok(());
                }
                Err(ChannelError::Protocol(ProtocolError::InvalidUtf8)) => {
                    warn!(peer = %self.peer, "Request is not valid UTF-8");
                    self.commands += 1;
                    if let Err(e) = handler::reply(&mut self.control, Status::Unrecognized) {
                        self.state = SessionState::Closed;
                        return Err(e);
                    }
                    continue;
                }
                Err(e) => {
                    self.state = SessionState::Closed;
                    return Err(Error::Control(e));
                }
            };

            self.state = SessionState::Dispatching;
            self.commands += 1;

            match self.dispatch(&line) {
                Ok(()) => {}
                Err(e) if e.ends_session() => {
                    self.state = SessionState::Closed;
                    return Err(e);
                }
                Err(e) => warn!(request = %line, error = %e, "Command failed"),
            }

            if self.state == SessionState::Dispatching {
                self.state = SessionState::AwaitingCommand;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, line: &str) -> Result<()> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                let status = Status::for_error(&e);
                warn!(request = %line, error = %e, %status, "Rejected request");
                return handler::reply(&mut self.control, status);
            }
        };

        info!(command = command.verb(), "Dispatching");

        match command {
            Command::Put { filename } => {
                let transfer = handler::put(&mut self.control, &self.config, &filename)?;
                debug!(?transfer, "put finished");
            }
            Command::Get { filename } => {
                let transfer = handler::get(&mut self.control, &self.config, &filename)?;
                debug!(?transfer, "get finished");
            }
            Command::Ls => {
                let transfer = handler::ls(&mut self.control, &self.config)?;
                debug!(?transfer, "ls finished");
            }
            Command::Quit => {
                handler::quit(&mut self.control)?;
                self.state = SessionState::Closed;
            }
        }
        Ok(())
    }
}
