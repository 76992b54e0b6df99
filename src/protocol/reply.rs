//! RESP framing
//!
//! Requests are always arrays of bulk strings:
//! `*<argc>\r\n` then `$<byteLength>\r\n<bytes>\r\n` per argument.
//!
//! Replies are decoded recursively, driven by the leading type byte.

use std::io::BufRead;

use super::errors::{ClientError, ClientResult};

/// Largest bulk payload accepted, the server's default `proto-max-bulk-len`
const MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;

/// A decoded reply unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+` status line. The text is discarded.
    Status(bool),
    /// `-` error line. Only surfaces nested inside arrays; at top level the
    /// connection turns it into a command error.
    Error(String),
    /// `:` integer, kept as its decimal text to preserve the full 64-bit range
    Integer(String),
    /// `$` bulk string, `None` for the null bulk (and the null array)
    Bulk(Option<String>),
    /// `*` array of replies, in order
    Array(Vec<Reply>),
}

impl Reply {
    /// Returns the bulk payload, if this is a non-null bulk string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::Bulk(Some(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns true for the null bulk
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Bulk(None))
    }

    /// Parses an integer reply
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Reply::Integer(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Takes a bulk reply, mapping nil to `None`
    pub fn into_bulk(self) -> Option<String> {
        match self {
            Reply::Bulk(v) => v,
            Reply::Integer(s) => Some(s),
            _ => None,
        }
    }

    /// Takes the elements of an array reply. A null reply is an empty list.
    pub fn into_array(self) -> Option<Vec<Reply>> {
        match self {
            Reply::Array(items) => Some(items),
            Reply::Bulk(None) => Some(Vec::new()),
            _ => None,
        }
    }

    /// Reassembles a field/value interleaved array into pairs.
    ///
    /// Returns `None` if the reply is not an array of an even number of
    /// bulk strings.
    pub fn into_pairs(self) -> Option<Vec<(String, String)>> {
        let items = self.into_array()?;
        if items.len() % 2 != 0 {
            return None;
        }
        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            pairs.push((field.into_bulk()?, value.into_bulk()?));
        }
        Some(pairs)
    }
}

/// Serializes a command and its arguments as a RESP request.
pub fn encode_request(name: &str, args: &[&str]) -> Vec<u8> {
    let mut capacity = 16 + name.len();
    for arg in args {
        capacity += arg.len() + 16;
    }
    let mut out = Vec::with_capacity(capacity);

    out.extend_from_slice(format!("*{}\r\n", args.len() + 1).as_bytes());
    push_bulk(&mut out, name.as_bytes());
    for arg in args {
        push_bulk(&mut out, arg.as_bytes());
    }
    out
}

fn push_bulk(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(format!("${}\r\n", bytes.len()).as_bytes());
    out.extend_from_slice(bytes);
    out.extend_from_slice(b"\r\n");
}

/// Decodes exactly one reply from the stream.
///
/// Error replies are returned as [`Reply::Error`]; the caller decides whether
/// they are fatal to the call.
pub fn decode_reply<R: BufRead>(reader: &mut R) -> ClientResult<Reply> {
    let line = read_line(reader)?;
    let (tag, rest) = match line.split_first() {
        Some((tag, rest)) => (*tag, rest),
        None => return Err(ClientError::protocol("Empty reply line")),
    };

    match tag {
        b'+' => Ok(Reply::Status(true)),
        b'-' => Ok(Reply::Error(String::from_utf8_lossy(rest).into_owned())),
        b':' => {
            let text = line_text(rest)?;
            if !is_integer(text) {
                return Err(ClientError::protocol(format!(
                    "Invalid integer reply: '{}'",
                    text
                )));
            }
            Ok(Reply::Integer(text.to_string()))
        }
        b'$' => {
            let length = parse_length(rest)?;
            let length = match length {
                None => return Ok(Reply::Bulk(None)),
                Some(n) => n,
            };
            if length > MAX_BULK_LENGTH {
                return Err(ClientError::protocol(format!(
                    "Bulk length {} exceeds {} bytes",
                    length, MAX_BULK_LENGTH
                )));
            }
            let mut payload = vec![0u8; length];
            let mut terminator = [0u8; 2];
            reader
                .read_exact(&mut payload)
                .and_then(|_| reader.read_exact(&mut terminator))
                .map_err(|e| ClientError::io("Failed to read bulk payload", e))?;
            if &terminator != b"\r\n" {
                return Err(ClientError::protocol(
                    "Bulk payload is not terminated by CRLF",
                ));
            }
            Ok(Reply::Bulk(Some(
                String::from_utf8_lossy(&payload).into_owned(),
            )))
        }
        b'*' => {
            let count = match parse_length(rest)? {
                None => return Ok(Reply::Bulk(None)),
                Some(n) => n,
            };
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(decode_reply(reader)?);
            }
            Ok(Reply::Array(items))
        }
        other => Err(ClientError::protocol(format!(
            "Unexpected reply type byte: 0x{:02x}",
            other
        ))),
    }
}

/// Reads one CRLF-terminated line and strips the terminator.
fn read_line<R: BufRead>(reader: &mut R) -> ClientResult<Vec<u8>> {
    let mut line = Vec::new();
    let read = reader
        .read_until(b'\n', &mut line)
        .map_err(|e| ClientError::io("Failed to read reply", e))?;
    if read == 0 {
        return Err(ClientError::protocol(
            "Connection closed while waiting for a reply",
        ));
    }
    if !line.ends_with(b"\r\n") {
        return Err(ClientError::protocol("Reply line is not terminated by CRLF"));
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

fn line_text(bytes: &[u8]) -> ClientResult<&str> {
    std::str::from_utf8(bytes).map_err(|_| ClientError::protocol("Reply line is not UTF-8"))
}

fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parses a bulk/array length. `-1` is the null marker.
fn parse_length(bytes: &[u8]) -> ClientResult<Option<usize>> {
    let text = line_text(bytes)?;
    if text == "-1" {
        return Ok(None);
    }
    text.parse::<usize>()
        .map(Some)
        .map_err(|_| ClientError::protocol(format!("Invalid length: '{}'", text)))
}
