//! Configuration for the ftplite server and client.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use crate::frame::DEFAULT_BUFFER_SIZE;

/// Default control port.
pub const DEFAULT_PORT: u16 = 2121;

/// Program name assumed for the server when the executable name is unknown.
pub const SERVER_PROGRAM: &str = "ftplite-server";

/// Program name assumed for the client when the executable name is unknown.
pub const CLIENT_PROGRAM: &str = "ftplite-client";

/// Command-line arguments for the server
#[derive(Parser, Debug, Default)]
#[command(name = "ftplite-server")]
#[command(version)]
#[command(about = "Serve a directory over the ftplite protocol", long_about = None)]
pub struct ServerArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// IPv4 address to bind the control and data listeners to
    #[arg(long)]
    pub host: Option<Ipv4Addr>,

    /// Control port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory to serve
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Maximum bytes pulled per socket read
    #[arg(short, long)]
    pub buffer_size: Option<usize>,

    /// File name hidden from directory listings (defaults to this executable)
    #[arg(long)]
    pub program_name: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Command-line arguments for the client
#[derive(Parser, Debug, Default)]
#[command(name = "ftplite-client")]
#[command(version)]
#[command(about = "Interactive ftplite client", long_about = None)]
pub struct ClientArgs {
    /// Server IPv4 address
    pub host: Option<Ipv4Addr>,

    /// Server control port
    pub port: Option<u16>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Local directory for uploads and downloads
    #[arg(short, long)]
    pub local_dir: Option<PathBuf>,

    /// Maximum bytes pulled per socket read
    #[arg(short, long)]
    pub buffer_size: Option<usize>,

    /// This client's own program file, which may not be uploaded
    #[arg(long)]
    pub program_name: Option<String>,

    /// The server's program file, which may not be downloaded
    #[arg(long)]
    pub server_program: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    pub program_name: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            root: default_root(),
            buffer_size: default_buffer_size(),
            program_name: None,
        }
    }
}

/// Client-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default = "default_root")]
    pub local_dir: PathBuf,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    pub program_name: Option<String>,
    #[serde(default = "default_server_program")]
    pub server_program: String,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            local_dir: default_root(),
            buffer_size: default_buffer_size(),
            program_name: None,
            server_program: default_server_program(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub level: Option<String>,
}

fn default_host() -> String {
    Ipv4Addr::LOCALHOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_server_program() -> String {
    SERVER_PROGRAM.to_string()
}

/// Final resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
    pub root: PathBuf,
    pub buffer_size: usize,
    pub program_name: String,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::LOCALHOST,
            port: DEFAULT_PORT,
            root: default_root(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            program_name: SERVER_PROGRAM.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process arguments and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(ServerArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point at.
    pub fn from_args(cli: ServerArgs) -> Result<Self, ConfigError> {
        let toml_config = read_toml(cli.config.as_deref())?;
        let section = toml_config.server;

        let host = match cli.host {
            Some(host) => host,
            None => parse_host(&section.host)?,
        };
        let buffer_size = check_buffer_size(cli.buffer_size.unwrap_or(section.buffer_size))?;

        Ok(ServerConfig {
            host,
            port: cli.port.unwrap_or(section.port),
            root: cli.root.unwrap_or(section.root),
            buffer_size,
            program_name: cli
                .program_name
                .or(section.program_name)
                .unwrap_or_else(|| own_program_name(SERVER_PROGRAM)),
            log_level: cli
                .log_level
                .or(toml_config.logging.level)
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// Final resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: Ipv4Addr,
    pub port: u16,
    pub local_dir: PathBuf,
    pub buffer_size: usize,
    pub program_name: String,
    pub server_program: String,
    pub log_level: String,
}

impl ClientConfig {
    /// Config for talking to `host:port` with every other setting defaulted.
    pub fn new(host: Ipv4Addr, port: u16) -> Self {
        Self {
            host,
            port,
            local_dir: default_root(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            program_name: CLIENT_PROGRAM.to_string(),
            server_program: SERVER_PROGRAM.to_string(),
            log_level: "warn".to_string(),
        }
    }

    /// Load configuration from the process arguments and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(ClientArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point at.
    pub fn from_args(cli: ClientArgs) -> Result<Self, ConfigError> {
        let toml_config = read_toml(cli.config.as_deref())?;
        let section = toml_config.client;

        let host = match (cli.host, section.host) {
            (Some(host), _) => host,
            (None, Some(host)) => parse_host(&host)?,
            (None, None) => return Err(ConfigError::MissingEndpoint("host")),
        };
        let port = cli
            .port
            .or(section.port)
            .ok_or(ConfigError::MissingEndpoint("port"))?;
        let buffer_size = check_buffer_size(cli.buffer_size.unwrap_or(section.buffer_size))?;

        Ok(ClientConfig {
            host,
            port,
            local_dir: cli.local_dir.unwrap_or(section.local_dir),
            buffer_size,
            program_name: cli
                .program_name
                .or(section.program_name)
                .unwrap_or_else(|| own_program_name(CLIENT_PROGRAM)),
            server_program: cli.server_program.unwrap_or(section.server_program),
            log_level: cli
                .log_level
                .or(toml_config.logging.level)
                .unwrap_or_else(|| "warn".to_string()),
        })
    }
}

fn read_toml(path: Option<&Path>) -> Result<TomlConfig, ConfigError> {
    match path {
        Some(config_path) => {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.to_path_buf(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.to_path_buf(), e))
        }
        None => Ok(TomlConfig::default()),
    }
}

fn parse_host(host: &str) -> Result<Ipv4Addr, ConfigError> {
    host.parse()
        .map_err(|_| ConfigError::InvalidAddress(host.to_string()))
}

fn check_buffer_size(size: usize) -> Result<usize, ConfigError> {
    if size == 0 {
        Err(ConfigError::InvalidBufferSize)
    } else {
        Ok(size)
    }
}

/// File name of the running executable, or `fallback`.
fn own_program_name(fallback: &str) -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| fallback.to_string())
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidAddress(String),
    InvalidBufferSize,
    MissingEndpoint(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidAddress(addr) => {
                write!(f, "Invalid IPv4 address '{}'", addr)
            }
            ConfigError::InvalidBufferSize => write!(f, "Buffer size must be at least 1 byte"),
            ConfigError::MissingEndpoint(what) => write!(f, "No server {} given", what),
        }
    }
}

impl std::error::Error for ConfigError {}
