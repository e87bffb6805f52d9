//! RESP (Redis Serialization Protocol) codec, client side.
//!
//! Only what a client needs lives here: commands are encoded as arrays of
//! bulk strings, and replies are decoded incrementally.
//!
//! `parse` returns:
//! - `Ok(Some((value, consumed)))` when a complete reply sits at the head of `buf`
//! - `Ok(None)` when more bytes are needed
//! - `Err(ParseError)` when the bytes can never form a valid reply
//!
//! Reply framing:
//! - `+OK\r\n` simple string, `-ERR msg\r\n` error, `:42\r\n` integer
//! - `$5\r\nhello\r\n` bulk string, `$-1\r\n` null bulk
//! - `*2\r\n...` array, `*-1\r\n` null array

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

const CRLF: &[u8] = b"\r\n";

/// Largest bulk string accepted (same cap as the server side).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Arrays nested deeper than this are rejected.
pub const MAX_NESTING_DEPTH: usize = 32;

mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A decoded RESP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    /// Null bulk string or null array.
    Null,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Short type name, used in "unexpected reply" diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::SimpleString(_) => "simple-string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::BulkString(_) => "bulk-string",
            RespValue::Null => "null",
            RespValue::Array(_) => "array",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),
    #[error("bulk string too large: {size} bytes (max: {max})")]
    BulkTooLarge { size: usize, max: usize },
    #[error("maximum nesting depth exceeded: {0}")]
    TooDeep(usize),
    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Encode a command as an array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Bytes {
    let cap = 16 + args.iter().map(|a| a.len() + 16).sum::<usize>();
    let mut buf = BytesMut::with_capacity(cap);
    buf.put_u8(prefix::ARRAY);
    buf.put_slice(args.len().to_string().as_bytes());
    buf.put_slice(CRLF);
    for arg in args {
        buf.put_u8(prefix::BULK_STRING);
        buf.put_slice(arg.len().to_string().as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(arg);
        buf.put_slice(CRLF);
    }
    buf.freeze()
}

/// Try to decode one reply from the head of `buf`.
pub fn parse(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    parse_value(buf, 0)
}

fn parse_value(buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
    if depth > MAX_NESTING_DEPTH {
        return Err(ParseError::TooDeep(MAX_NESTING_DEPTH));
    }
    let Some(&tag) = buf.first() else {
        return Ok(None);
    };
    let Some((line, header_len)) = read_line(buf) else {
        return Ok(None);
    };

    match tag {
        prefix::SIMPLE_STRING => Ok(Some((RespValue::SimpleString(utf8(line)?), header_len))),
        prefix::ERROR => Ok(Some((RespValue::Error(utf8(line)?), header_len))),
        prefix::INTEGER => Ok(Some((RespValue::Integer(int(line)?), header_len))),
        prefix::BULK_STRING => parse_bulk(buf, int(line)?, header_len),
        prefix::ARRAY => parse_array(buf, int(line)?, header_len, depth),
        other => Err(ParseError::UnknownPrefix(other)),
    }
}

fn parse_bulk(buf: &[u8], len: i64, header_len: usize) -> ParseResult<Option<(RespValue, usize)>> {
    if len == -1 {
        return Ok(Some((RespValue::Null, header_len)));
    }
    let size = usize::try_from(len).map_err(|_| ParseError::InvalidBulkLength(len))?;
    if size > MAX_BULK_SIZE {
        return Err(ParseError::BulkTooLarge { size, max: MAX_BULK_SIZE });
    }

    let end = header_len + size;
    let Some(tail) = buf.get(end..end + 2) else {
        return Ok(None);
    };
    if tail != CRLF {
        return Err(ParseError::Protocol("bulk string not terminated by CRLF".into()));
    }
    let data = buf.get(header_len..end).unwrap_or_default();
    Ok(Some((RespValue::BulkString(Bytes::copy_from_slice(data)), end + 2)))
}

fn parse_array(
    buf: &[u8],
    len: i64,
    header_len: usize,
    depth: usize,
) -> ParseResult<Option<(RespValue, usize)>> {
    if len == -1 {
        return Ok(Some((RespValue::Null, header_len)));
    }
    let count = usize::try_from(len).map_err(|_| ParseError::InvalidArrayLength(len))?;

    let mut items = Vec::with_capacity(count.min(64));
    let mut pos = header_len;
    for _ in 0..count {
        let rest = buf.get(pos..).unwrap_or_default();
        match parse_value(rest, depth + 1)? {
            Some((item, used)) => {
                items.push(item);
                pos += used;
            }
            None => return Ok(None),
        }
    }
    Ok(Some((RespValue::Array(items), pos)))
}

/// Returns the line content after the prefix byte and the total length
/// including the prefix and CRLF.
fn read_line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let body = buf.get(1..)?;
    let pos = body.windows(2).position(|w| w == CRLF)?;
    Some((&body[..pos], 1 + pos + 2))
}

fn utf8(line: &[u8]) -> ParseResult<String> {
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|e| ParseError::InvalidUtf8(e.to_string()))
}

fn int(line: &[u8]) -> ParseResult<i64> {
    let s = std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    s.parse::<i64>()
        .map_err(|_| ParseError::InvalidInteger(s.to_owned()))
}
