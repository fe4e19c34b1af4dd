//! Control channel grammar.
//!
//! Every message travels as one frame (see [`crate::frame`]).
//!
//! ## Requests
//!
//! ```text
//! put,<filename>    upload a file to the server
//! get,<filename>    download a file from the server
//! ls                list the server's directory
//! quit              end the session
//! ```
//!
//! ## Replies
//!
//! ```text
//! 200   proceed; an endpoint advertisement frame follows
//! 211   closing the control connection
//! 425   data endpoint could not be opened
//! 500   verb not recognized
//! 501   wrong number of arguments
//! 550   file not found
//! ```
//!
//! ## Data phase
//!
//! After `200` the server sends `<ip>,<port>`. The client dials it, exactly
//! one payload frame crosses the data connection, and both sides close it
//! before the next request is read.
//!
//! ```text
//! C: put,notes.txt          S: 200
//!                           S: 127.0.0.1,40211
//! C --data--> [file bytes]  (data connection closed)
//! ```

pub mod parser;

pub use parser::{Command, Status};
