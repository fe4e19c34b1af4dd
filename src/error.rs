//! Error types shared by the client and the server.
//!
//! Errors are split by where they happened: the control channel, a data
//! channel, the local filesystem, or the protocol grammar. That split decides
//! whether a failure ends the session or only aborts the current command.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Violations of the wire format or the control grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Peer closed before the 4-byte length prefix was complete
    ShortHeader { received: usize },
    /// Peer closed before the declared payload length arrived
    Truncated { expected: usize, received: usize },
    /// Text payload was not valid UTF-8
    InvalidUtf8,
    /// Control request with no verb
    EmptyRequest,
    /// Verb outside `put`, `get`, `ls`, `quit`
    UnknownVerb(String),
    /// Wrong number of arguments for a known verb
    Arity {
        verb: &'static str,
        expected: usize,
        given: usize,
    },
    /// Endpoint advertisement that is not `<ipv4>,<port>`
    BadAdvertisement(String),
    /// Reply token other than the one the exchange calls for
    UnexpectedReply { expected: &'static str, got: String },
}

impl ProtocolError {
    /// True when the peer hung up cleanly between frames.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, ProtocolError::ShortHeader { received: 0 })
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::ShortHeader { received } => {
                write!(f, "connection closed after {} of 4 length bytes", received)
            }
            ProtocolError::Truncated { expected, received } => write!(
                f,
                "connection closed after {} of {} payload bytes",
                received, expected
            ),
            ProtocolError::InvalidUtf8 => write!(f, "payload is not valid UTF-8"),
            ProtocolError::EmptyRequest => write!(f, "empty request"),
            ProtocolError::UnknownVerb(verb) => write!(f, "'{}' is not a recognized command", verb),
            ProtocolError::Arity {
                verb,
                expected,
                given,
            } => write!(
                f,
                "'{}' expected {} argument{} ({} given)",
                verb,
                expected,
                if *expected == 1 { "" } else { "s" },
                given
            ),
            ProtocolError::BadAdvertisement(msg) => {
                write!(f, "bad data endpoint advertisement: {}", msg)
            }
            ProtocolError::UnexpectedReply { expected, got } => {
                write!(f, "expected reply {}, got '{}'", expected, got)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Failure of a single framed read or write.
#[derive(Debug)]
pub enum ChannelError {
    Io(io::Error),
    Protocol(ProtocolError),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Io(e) => write!(f, "{}", e),
            ChannelError::Protocol(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChannelError::Io(e) => Some(e),
            ChannelError::Protocol(e) => Some(e),
        }
    }
}

impl From<io::Error> for ChannelError {
    fn from(e: io::Error) -> Self {
        ChannelError::Io(e)
    }
}

impl From<ProtocolError> for ChannelError {
    fn from(e: ProtocolError) -> Self {
        ChannelError::Protocol(e)
    }
}

/// Crate-level error.
#[derive(Debug)]
pub enum Error {
    /// Could not bind a listening socket
    Bind { addr: SocketAddr, source: io::Error },
    /// Could not connect to the control endpoint or dial a data endpoint
    Connect { addr: SocketAddr, source: io::Error },
    /// The control channel failed; the session is over
    Control(ChannelError),
    /// A data channel failed; only the current command is lost
    Data(ChannelError),
    /// The peer spoke out of turn or sent something unparseable
    Protocol(ProtocolError),
    /// Local file could not be read or written
    LocalIo { path: PathBuf, source: io::Error },
    /// Refused before any network I/O
    Rejected(String),
    /// The session already completed its quit handshake
    Closed,
}

impl Error {
    /// Wrap a control channel failure.
    pub fn control(e: impl Into<ChannelError>) -> Self {
        Error::Control(e.into())
    }

    /// Wrap a data channel failure.
    pub fn data(e: impl Into<ChannelError>) -> Self {
        Error::Data(e.into())
    }

    /// Whether the session can no longer carry commands after this error.
    pub fn ends_session(&self) -> bool {
        matches!(self, Error::Control(_) | Error::Closed)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Bind { addr, source } => write!(f, "cannot bind {}: {}", addr, source),
            Error::Connect { addr, source } => {
                write!(f, "connection to {} failed: {}", addr, source)
            }
            Error::Control(e) => write!(f, "control connection lost: {}", e),
            Error::Data(e) => write!(f, "data transfer failed: {}", e),
            Error::Protocol(e) => write!(f, "protocol error: {}", e),
            Error::LocalIo { path, source } => write!(f, "{}: {}", path.display(), source),
            Error::Rejected(msg) => write!(f, "{}", msg),
            Error::Closed => write!(f, "connection already closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind { source, .. }
            | Error::Connect { source, .. }
            | Error::LocalIo { source, .. } => Some(source),
            Error::Control(e) | Error::Data(e) => Some(e),
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
