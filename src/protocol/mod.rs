//! Protocol client subsystem
//!
//! Speaks RESP over a single blocking TCP socket.
//!
//! # Exchange (strict order)
//!
//! 1. Open the socket if none is held (AUTH and SELECT on connect)
//! 2. Serialize the command as an array of bulk strings
//! 3. Write the request
//! 4. Decode exactly one reply
//!
//! # Failure rules
//!
//! - Socket cannot be opened: connection error, connection stays closed
//! - Malformed frame or I/O error: protocol error, socket discarded
//! - Error reply: command error, socket stays usable
//! - No retries, no pipelining

mod command;
mod config;
mod connection;
mod errors;
mod reply;

pub use command::{Command, CommandExecutor, Commands};
pub use config::ConnectionConfig;
pub use connection::Connection;
pub use errors::{ClientError, ClientErrorCode, ClientResult, Severity};
pub use reply::{decode_reply, encode_request, Reply};
