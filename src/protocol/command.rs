//! Command table
//!
//! Every command the client may send is a variant of [`Command`]. The name
//! table is the single source of truth for the wire names, and lookups by
//! name are case-insensitive. Typed helpers live on the [`Commands`]
//! extension trait so any [`CommandExecutor`] gets them.

use std::fmt;

use super::errors::{ClientError, ClientResult};
use super::reply::Reply;

/// The enumerated command set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // connection
    Auth,
    Select,
    Ping,
    Echo,
    Quit,
    // scripting
    Eval,
    Evalsha,
    // keys
    Del,
    Exists,
    Expire,
    Keys,
    // strings
    Get,
    Set,
    Setex,
    Mget,
    Incr,
    Incrby,
    // hashes
    Hget,
    Hgetall,
    Hset,
    Hmset,
    Hdel,
    Hexists,
    Hincrby,
    // lists
    Lrange,
    Llen,
    Lpush,
    Rpush,
    Lpop,
    Rpop,
    Lrem,
    // sorted sets
    Zadd,
    Zrem,
    Zrangebyscore,
    // transactions
    Multi,
    Exec,
    Discard,
    // server
    Dbsize,
    Flushdb,
    Info,
}

/// Wire names, one entry per variant
const COMMAND_TABLE: &[(&str, Command)] = &[
    ("AUTH", Command::Auth),
    ("SELECT", Command::Select),
    ("PING", Command::Ping),
    ("ECHO", Command::Echo),
    ("QUIT", Command::Quit),
    ("EVAL", Command::Eval),
    ("EVALSHA", Command::Evalsha),
    ("DEL", Command::Del),
    ("EXISTS", Command::Exists),
    ("EXPIRE", Command::Expire),
    ("KEYS", Command::Keys),
    ("GET", Command::Get),
    ("SET", Command::Set),
    ("SETEX", Command::Setex),
    ("MGET", Command::Mget),
    ("INCR", Command::Incr),
    ("INCRBY", Command::Incrby),
    ("HGET", Command::Hget),
    ("HGETALL", Command::Hgetall),
    ("HSET", Command::Hset),
    ("HMSET", Command::Hmset),
    ("HDEL", Command::Hdel),
    ("HEXISTS", Command::Hexists),
    ("HINCRBY", Command::Hincrby),
    ("LRANGE", Command::Lrange),
    ("LLEN", Command::Llen),
    ("LPUSH", Command::Lpush),
    ("RPUSH", Command::Rpush),
    ("LPOP", Command::Lpop),
    ("RPOP", Command::Rpop),
    ("LREM", Command::Lrem),
    ("ZADD", Command::Zadd),
    ("ZREM", Command::Zrem),
    ("ZRANGEBYSCORE", Command::Zrangebyscore),
    ("MULTI", Command::Multi),
    ("EXEC", Command::Exec),
    ("DISCARD", Command::Discard),
    ("DBSIZE", Command::Dbsize),
    ("FLUSHDB", Command::Flushdb),
    ("INFO", Command::Info),
];

impl Command {
    /// Returns the wire name
    pub fn name(&self) -> &'static str {
        COMMAND_TABLE
            .iter()
            .find(|(_, command)| command == self)
            .map(|(name, _)| *name)
            .unwrap_or("UNKNOWN")
    }

    /// Looks a command up by name, ignoring case
    pub fn from_name(name: &str) -> Option<Command> {
        COMMAND_TABLE
            .iter()
            .find(|(wire, _)| wire.eq_ignore_ascii_case(name))
            .map(|(_, command)| *command)
    }

    /// Returns every known command
    pub fn all() -> impl Iterator<Item = Command> {
        COMMAND_TABLE.iter().map(|(_, command)| *command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Sends one command and returns its decoded reply.
///
/// Implementations return a command error for top-level error replies.
pub trait CommandExecutor {
    fn execute(&mut self, command: Command, args: &[&str]) -> ClientResult<Reply>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for &mut T {
    fn execute(&mut self, command: Command, args: &[&str]) -> ClientResult<Reply> {
        (**self).execute(command, args)
    }
}

fn unexpected(command: Command, reply: &Reply) -> ClientError {
    ClientError::protocol(format!(
        "Unexpected reply to {}: {:?}",
        command.name(),
        reply
    ))
}

fn expect_integer(command: Command, reply: Reply) -> ClientResult<i64> {
    reply.as_i64().ok_or_else(|| unexpected(command, &reply))
}

fn expect_status(command: Command, reply: Reply) -> ClientResult<()> {
    match reply {
        Reply::Status(_) => Ok(()),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_bulk(command: Command, reply: Reply) -> ClientResult<Option<String>> {
    match reply {
        Reply::Bulk(v) => Ok(v),
        other => Err(unexpected(command, &other)),
    }
}

/// Typed helpers over [`CommandExecutor`]
pub trait Commands: CommandExecutor {
    fn ping(&mut self) -> ClientResult<()> {
        let reply = self.execute(Command::Ping, &[])?;
        expect_status(Command::Ping, reply)
    }

    fn auth(&mut self, password: &str) -> ClientResult<()> {
        let reply = self.execute(Command::Auth, &[password])?;
        expect_status(Command::Auth, reply)
    }

    fn select(&mut self, database: u32) -> ClientResult<()> {
        let index = database.to_string();
        let reply = self.execute(Command::Select, &[&index])?;
        expect_status(Command::Select, reply)
    }

    fn get(&mut self, key: &str) -> ClientResult<Option<String>> {
        let reply = self.execute(Command::Get, &[key])?;
        expect_bulk(Command::Get, reply)
    }

    fn set(&mut self, key: &str, value: &str) -> ClientResult<()> {
        let reply = self.execute(Command::Set, &[key, value])?;
        expect_status(Command::Set, reply)
    }

    fn del(&mut self, keys: &[&str]) -> ClientResult<i64> {
        let reply = self.execute(Command::Del, keys)?;
        expect_integer(Command::Del, reply)
    }

    fn exists(&mut self, key: &str) -> ClientResult<bool> {
        let reply = self.execute(Command::Exists, &[key])?;
        Ok(expect_integer(Command::Exists, reply)? > 0)
    }

    fn incr(&mut self, key: &str) -> ClientResult<i64> {
        let reply = self.execute(Command::Incr, &[key])?;
        expect_integer(Command::Incr, reply)
    }

    fn hget(&mut self, key: &str, field: &str) -> ClientResult<Option<String>> {
        let reply = self.execute(Command::Hget, &[key, field])?;
        expect_bulk(Command::Hget, reply)
    }

    /// Returns the field/value pairs of a hash, empty if the key is missing
    fn hgetall(&mut self, key: &str) -> ClientResult<Vec<(String, String)>> {
        let reply = self.execute(Command::Hgetall, &[key])?;
        match reply {
            Reply::Array(_) | Reply::Bulk(None) => reply.into_pairs().ok_or_else(|| {
                ClientError::protocol("HGETALL reply is not a list of field/value pairs")
            }),
            other => Err(unexpected(Command::Hgetall, &other)),
        }
    }

    /// Sets several fields of a hash at once
    fn hset_all(&mut self, key: &str, fields: &[(&str, &str)]) -> ClientResult<()> {
        let mut args = Vec::with_capacity(fields.len() * 2 + 1);
        args.push(key);
        for (field, value) in fields {
            args.push(*field);
            args.push(*value);
        }
        let reply = self.execute(Command::Hmset, &args)?;
        expect_status(Command::Hmset, reply)
    }

    fn lrange(&mut self, key: &str, start: i64, stop: i64) -> ClientResult<Vec<String>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        let reply = self.execute(Command::Lrange, &[key, &start, &stop])?;
        match reply {
            Reply::Array(items) => Ok(items.into_iter().filter_map(Reply::into_bulk).collect()),
            Reply::Bulk(None) => Ok(Vec::new()),
            other => Err(unexpected(Command::Lrange, &other)),
        }
    }

    fn llen(&mut self, key: &str) -> ClientResult<i64> {
        let reply = self.execute(Command::Llen, &[key])?;
        expect_integer(Command::Llen, reply)
    }

    fn rpush(&mut self, key: &str, values: &[&str]) -> ClientResult<i64> {
        let mut args = Vec::with_capacity(values.len() + 1);
        args.push(key);
        args.extend_from_slice(values);
        let reply = self.execute(Command::Rpush, &args)?;
        expect_integer(Command::Rpush, reply)
    }

    /// Runs a Lua program. The raw reply is returned since its shape is
    /// defined by the program.
    fn eval(&mut self, script: &str, keys: &[&str], args: &[&str]) -> ClientResult<Reply> {
        let key_count = keys.len().to_string();
        let mut all = Vec::with_capacity(keys.len() + args.len() + 2);
        all.push(script);
        all.push(key_count.as_str());
        all.extend_from_slice(keys);
        all.extend_from_slice(args);
        self.execute(Command::Eval, &all)
    }

    fn flushdb(&mut self) -> ClientResult<()> {
        let reply = self.execute(Command::Flushdb, &[])?;
        expect_status(Command::Flushdb, reply)
    }
}

impl<T: CommandExecutor + ?Sized> Commands for T {}
