//! ftplite server.
//!
//! Binds the control listener, accepts a single client, and runs one
//! control session for it. The process serves exactly one session per
//! lifetime; [`Server::run`] returns when that session ends.

mod handler;
mod session;

pub use handler::Transfer;
pub use session::{ControlSession, SessionState};

use std::io;
use std::net::{SocketAddr, SocketAddrV4, TcpListener};
use tracing::info;

use crate::broker::create_listener_with_backlog;
use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Pending control connections allowed while the session is being set up.
const CONTROL_BACKLOG: i32 = 1;

/// Server instance
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
}

impl Server {
    /// Bind the control listener.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let addr = SocketAddr::V4(SocketAddrV4::new(config.host, config.port));
        let listener = create_listener_with_backlog(addr, CONTROL_BACKLOG)
            .map_err(|source| Error::Bind { addr, source })?;

        Ok(Server { config, listener })
    }

    /// Address the control listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one client and serve it until it quits or the control
    /// connection fails.
    pub fn run(self) -> Result<()> {
        let local = self.local_addr().map_err(Error::control)?;
        info!(address = %local, root = %self.config.root.display(), "Waiting for a client");

        let (stream, peer) = self.listener.accept().map_err(Error::control)?;
        info!(peer = %peer, "Client connected");

        // one session per process; nobody else gets in
        drop(self.listener);

        let mut session = ControlSession::new(stream, peer, self.config);
        let result = session.run();
        info!(peer = %peer, commands = session.commands_served(), "Session ended");
        result
    }
}
