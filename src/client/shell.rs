//! Interactive front end for the client.
//!
//! Reads `ftp>` lines, checks verb and arity locally, and calls into
//! [`Client`]. Input errors never reach the server.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Client, Download};
use crate::error::{Error, ProtocolError};

pub const PROMPT: &str = "ftp> ";

/// Set while [`run`] is blocked reading a line at the prompt.
static AT_PROMPT: AtomicBool = AtomicBool::new(false);

/// Whether the shell is idle at the prompt, as opposed to running a command.
pub fn at_prompt() -> bool {
    AT_PROMPT.load(Ordering::SeqCst)
}

/// A command typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Get(String),
    Put(String),
    Ls,
    Quit,
    Help,
}

/// Problems with a typed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    Arity {
        verb: String,
        expected: usize,
        given: usize,
    },
    Unrecognized(String),
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::Arity {
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
            InputError::Unrecognized(verb) => write!(f, "'{}' is not a recognized command", verb),
        }
    }
}

impl std::error::Error for InputError {}

/// Parse one typed line. `None` for a blank line.
pub fn parse_input(line: &str) -> Option<Result<Input, InputError>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (verb, args) = tokens.split_first()?;

    let arity = |expected: usize| -> Result<(), InputError> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(InputError::Arity {
                verb: verb.to_string(),
                expected,
                given: args.len(),
            })
        }
    };

    let parsed = match *verb {
        "get" => arity(1).map(|_| Input::Get(args[0].to_string())),
        "put" => arity(1).map(|_| Input::Put(args[0].to_string())),
        "ls" => arity(0).map(|_| Input::Ls),
        "quit" => arity(0).map(|_| Input::Quit),
        "help" => Ok(Input::Help),
        other => Err(InputError::Unrecognized(other.to_string())),
    };
    Some(parsed)
}

/// Usage text, headed by the local directory.
pub fn help_text(local_dir: &Path) -> String {
    let dir = std::fs::canonicalize(local_dir).unwrap_or_else(|_| local_dir.to_path_buf());
    format!(
        "Current Directory: {}\n\n\
         GET - Download a file from the server\n\tUsage: get <filename>\n\n\
         PUT - Upload a file to the server\n\tUsage: put <filename>\n\n\
         LS - List files in server directory\n\tUsage: ls\n\n\
         QUIT - Close connection with server\n\tUsage: quit\n\n\
         HELP - Display help information\n\tUsage: help\n",
        dir.display()
    )
}

/// One-line message for a failed command.
pub fn describe(err: &Error) -> String {
    match err {
        Error::LocalIo { path, .. } => format!(
            "Couldn't open {}. Make sure the file name was entered correctly.",
            path.display()
        ),
        Error::Protocol(ProtocolError::UnexpectedReply { .. }) => "Bad Request.".to_string(),
        Error::Rejected(msg) => format!("{}.", msg),
        Error::Control(_) => format!("{}. Closing session.", err),
        other => other.to_string(),
    }
}

/// Run the prompt loop until the session closes or input ends.
///
/// At end of input a `quit` handshake is attempted before returning.
pub fn run<R: BufRead, W: Write>(
    client: &mut Client,
    input: &mut R,
    output: &mut W,
) -> io::Result<()> {
    let mut line = String::new();

    while client.is_open() {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        line.clear();
        AT_PROMPT.store(true, Ordering::SeqCst);
        let read = input.read_line(&mut line);
        AT_PROMPT.store(false, Ordering::SeqCst);
        if read? == 0 {
            writeln!(output)?;
            if let Err(e) = client.quit() {
                writeln!(output, "{}", describe(&e))?;
            }
            break;
        }

        let command = match parse_input(&line) {
            None => continue,
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                writeln!(output, "{}\n", e)?;
                continue;
            }
        };

        execute(client, command, output)?;
    }
    Ok(())
}

fn execute<W: Write>(client: &mut Client, command: Input, output: &mut W) -> io::Result<()> {
    match command {
        Input::Help => {
            writeln!(output, "{}", help_text(&client.config().local_dir))?;
        }
        Input::Put(filename) => {
            writeln!(output, "Uploading {}...", filename)?;
            match client.put(&filename) {
                Ok(bytes) => writeln!(output, "Uploaded {} ({} bytes)\n", filename, bytes)?,
                Err(e) => writeln!(output, "{}\n", describe(&e))?,
            }
        }
        Input::Get(filename) => {
            writeln!(output, "Downloading {}...", filename)?;
            match client.get(&filename) {
                Ok(Download::Saved { path, bytes }) => {
                    writeln!(output, "Saved {} ({} bytes)\n", path.display(), bytes)?
                }
                Ok(Download::NotFound) => writeln!(output, "File not found.\n")?,
                Err(e) => writeln!(output, "{}\n", describe(&e))?,
            }
        }
        Input::Ls => match client.ls() {
            Ok(listing) => writeln!(output, "{}\n", listing)?,
            Err(e) => writeln!(output, "{}\n", describe(&e))?,
        },
        Input::Quit => match client.quit() {
            Ok(()) => writeln!(output, "Thanks for using ftp!")?,
            Err(e) if e.ends_session() => writeln!(output, "{}", describe(&e))?,
            Err(e) => {
                writeln!(output, "{}", describe(&e))?;
                writeln!(output, "Could not close connection... Please try again.\n")?;
            }
        },
    }
    Ok(())
}
