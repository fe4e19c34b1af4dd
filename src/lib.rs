//! ftplite: a minimal two-connection file transfer protocol.
//!
//! A long-lived control connection carries requests and status replies.
//! Every command that moves a payload (`put`, `get`, `ls`) opens a fresh
//! data connection for exactly one frame and closes it before the next
//! request is read.
//!
//! - [`frame`]: length-prefixed framing for both connections
//! - [`broker`]: ephemeral data endpoint offer/accept/dial
//! - [`protocol`]: control request and reply grammar
//! - [`server`]: control session state machine and command handlers
//! - [`client`]: client-side commands and the interactive shell

pub mod broker;
pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod server;

pub use client::{Client, Download};
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use error::{Error, Result};
pub use server::Server;
