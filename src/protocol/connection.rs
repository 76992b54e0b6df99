//! Blocking connection to a Redis server
//!
//! One socket, strictly request/reply ordered. The connection is opened
//! lazily by the first command and reopened by the next command after a
//! protocol failure. There is no retry and no internal locking: callers
//! that share a connection across threads wrap it in their own lock.

use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use tracing::{debug, trace};

use crate::observability::Event;

use super::command::{Command, CommandExecutor};
use super::config::ConnectionConfig;
use super::errors::{ClientError, ClientResult};
use super::reply::{decode_reply, encode_request, Reply};

struct Socket {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// A connection to one Redis server
pub struct Connection {
    config: ConnectionConfig,
    socket: Option<Socket>,
}

impl Connection {
    /// Creates a closed connection
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            socket: None,
        }
    }

    /// Returns the configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns true while a socket is held
    pub fn is_active(&self) -> bool {
        self.socket.is_some()
    }

    /// Establishes the socket if there is none, then authenticates and
    /// selects the configured database.
    ///
    /// Calling this on an open connection does nothing.
    pub fn open(&mut self) -> ClientResult<()> {
        if self.socket.is_some() {
            return Ok(());
        }

        debug!(
            event = Event::ConnectionOpen.as_str(),
            host = %self.config.hostname,
            port = self.config.port,
            database = ?self.config.database,
            "opening connection"
        );

        let stream = self.connect()?;
        let reader = stream
            .try_clone()
            .map_err(|e| self.connection_error(e))?;
        self.socket = Some(Socket {
            reader: BufReader::new(reader),
            writer: stream,
        });

        if let Err(e) = self.initialize() {
            self.discard();
            return Err(e);
        }
        Ok(())
    }

    fn connect(&self) -> ClientResult<TcpStream> {
        let host = self.config.hostname.as_str();
        let port = self.config.port;

        let stream = match self.config.connect_timeout() {
            None => TcpStream::connect((host, port)).map_err(|e| self.connection_error(e))?,
            Some(timeout) => {
                let addrs = (host, port)
                    .to_socket_addrs()
                    .map_err(|e| self.connection_error(e))?;
                let mut last_error = None;
                let mut connected = None;
                for addr in addrs {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(stream) => {
                            connected = Some(stream);
                            break;
                        }
                        Err(e) => last_error = Some(e),
                    }
                }
                match connected {
                    Some(stream) => stream,
                    None => {
                        let error = last_error.unwrap_or_else(|| {
                            std::io::Error::new(
                                std::io::ErrorKind::NotFound,
                                "host resolved to no addresses",
                            )
                        });
                        return Err(self.connection_error(error));
                    }
                }
            }
        };

        let timeout = self.config.read_timeout();
        stream
            .set_read_timeout(timeout)
            .and_then(|_| stream.set_write_timeout(timeout))
            .and_then(|_| stream.set_nodelay(true))
            .map_err(|e| self.connection_error(e))?;
        Ok(stream)
    }

    fn initialize(&mut self) -> ClientResult<()> {
        if let Some(password) = self.config.password.clone() {
            self.round_trip(Command::Auth, &[&password])?;
        }
        if let Some(database) = self.config.database {
            let index = database.to_string();
            self.round_trip(Command::Select, &[&index])?;
        }
        Ok(())
    }

    fn connection_error(&self, error: std::io::Error) -> ClientError {
        ClientError::connection(&self.config.hostname, self.config.port, error)
    }

    /// Sends QUIT and shuts the socket down.
    ///
    /// Safe to call on a closed connection. The socket is released even if
    /// QUIT fails; that failure is returned.
    pub fn close(&mut self) -> ClientResult<()> {
        if self.socket.is_none() {
            return Ok(());
        }
        debug!(
            event = Event::ConnectionClose.as_str(),
            host = %self.config.hostname,
            port = self.config.port,
            "closing connection"
        );
        let result = self.round_trip(Command::Quit, &[]).map(|_| ());
        self.discard();
        result
    }

    fn discard(&mut self) {
        if let Some(socket) = self.socket.take() {
            let _ = socket.writer.shutdown(Shutdown::Both);
        }
    }

    /// Writes one request and reads one reply on the open socket.
    fn round_trip(&mut self, command: Command, args: &[&str]) -> ClientResult<Reply> {
        let socket = match self.socket.as_mut() {
            Some(socket) => socket,
            None => return Err(ClientError::protocol("Connection is not open")),
        };

        trace!(
            event = Event::CommandExecute.as_str(),
            command = command.name(),
            argc = args.len(),
            "executing command"
        );

        let request = encode_request(command.name(), args);
        let outcome = socket
            .writer
            .write_all(&request)
            .and_then(|_| socket.writer.flush())
            .map_err(|e| ClientError::io("Failed to write request", e))
            .and_then(|_| decode_reply(&mut socket.reader));

        match outcome {
            Ok(Reply::Error(message)) => Err(ClientError::command(
                message,
                describe_command(command, args),
            )),
            Ok(reply) => Ok(reply),
            Err(e) => {
                // the byte stream is out of sync, the socket cannot be reused
                self.discard();
                Err(e)
            }
        }
    }
}

impl CommandExecutor for Connection {
    /// Opens the connection if necessary, then sends the command.
    fn execute(&mut self, command: Command, args: &[&str]) -> ClientResult<Reply> {
        self.open()?;
        self.round_trip(command, args)
    }
}

/// Releases the socket without QUIT; a stalled server must not block the
/// drop. Call [`Connection::close`] for an orderly shutdown.
impl Drop for Connection {
    fn drop(&mut self) {
        self.discard();
    }
}

/// Renders a command for error messages. Credentials are masked.
fn describe_command(command: Command, args: &[&str]) -> String {
    if command == Command::Auth {
        return "AUTH ****".to_string();
    }
    let mut text = command.name().to_string();
    for arg in args {
        text.push(' ');
        text.push_str(arg);
    }
    text
}
