//! Control request and reply parser.

use crate::error::ProtocolError;

/// Field separator inside a control request.
pub const SEPARATOR: char = ',';

/// Parsed control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Upload a file to the server.
    Put { filename: String },
    /// Download a file from the server.
    Get { filename: String },
    /// List the server's directory.
    Ls,
    /// Close the session.
    Quit,
}

impl Command {
    /// Parse a request line such as `get,notes.txt`.
    pub fn parse(line: &str) -> Result<Command, ProtocolError> {
        if line.is_empty() {
            return Err(ProtocolError::EmptyRequest);
        }

        let mut parts = line.split(SEPARATOR);
        let verb = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match verb {
            "put" => Ok(Command::Put {
                filename: single_arg("put", &args)?,
            }),
            "get" => Ok(Command::Get {
                filename: single_arg("get", &args)?,
            }),
            "ls" => no_args("ls", &args).map(|_| Command::Ls),
            "quit" => no_args("quit", &args).map(|_| Command::Quit),
            _ => Err(ProtocolError::UnknownVerb(verb.to_string())),
        }
    }

    /// Render the request line sent over the control channel.
    pub fn encode(&self) -> String {
        match self {
            Command::Put { filename } => format!("put{}{}", SEPARATOR, filename),
            Command::Get { filename } => format!("get{}{}", SEPARATOR, filename),
            Command::Ls => "ls".to_string(),
            Command::Quit => "quit".to_string(),
        }
    }

    /// Verb name, for logging.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Put { .. } => "put",
            Command::Get { .. } => "get",
            Command::Ls => "ls",
            Command::Quit => "quit",
        }
    }
}

fn single_arg(verb: &'static str, args: &[&str]) -> Result<String, ProtocolError> {
    match args {
        [filename] if !filename.is_empty() => Ok(filename.to_string()),
        _ => Err(ProtocolError::Arity {
            verb,
            expected: 1,
            given: args.iter().filter(|a| !a.is_empty()).count(),
        }),
    }
}

fn no_args(verb: &'static str, args: &[&str]) -> Result<(), ProtocolError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::Arity {
            verb,
            expected: 0,
            given: args.len(),
        })
    }
}

/// Status reply tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 200: proceed
    Ok,
    /// 211: connection will close
    Closing,
    /// 425: data endpoint could not be opened
    CantOpenData,
    /// 500: verb not recognized
    Unrecognized,
    /// 501: wrong number of arguments
    BadArguments,
    /// 550: file not found
    NotFound,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "200",
            Status::Closing => "211",
            Status::CantOpenData => "425",
            Status::Unrecognized => "500",
            Status::BadArguments => "501",
            Status::NotFound => "550",
        }
    }

    /// Parse a reply token; `None` for anything this protocol never sends.
    pub fn parse(token: &str) -> Option<Status> {
        match token {
            "200" => Some(Status::Ok),
            "211" => Some(Status::Closing),
            "425" => Some(Status::CantOpenData),
            "500" => Some(Status::Unrecognized),
            "501" => Some(Status::BadArguments),
            "550" => Some(Status::NotFound),
            _ => None,
        }
    }

    /// Status the server answers a malformed request with.
    pub fn for_error(e: &ProtocolError) -> Status {
        match e {
            ProtocolError::Arity { .. } => Status::BadArguments,
            _ => Status::Unrecognized,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
