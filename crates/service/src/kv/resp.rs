//! RESP2 framing (REdis Serialization Protocol).
//!
//! Reference: https://redis.io/docs/reference/protocol-spec/

use crate::errors::ServiceError;

const CRLF: &[u8] = b"\r\n";
/// Deepest array nesting accepted from a peer. Replies used here nest at most once.
pub const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    /// `None` is the null bulk string (`$-1`).
    BulkString(Option<Vec<u8>>),
    /// `None` is the null array (`*-1`).
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                out.push(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(CRLF);
            }
            RespValue::Error(e) => {
                out.push(b'-');
                out.extend_from_slice(e.as_bytes());
                out.extend_from_slice(CRLF);
            }
            RespValue::Integer(i) => {
                out.extend_from_slice(format!(":{i}\r\n").as_bytes());
            }
            RespValue::BulkString(None) => out.extend_from_slice(b"$-1\r\n"),
            RespValue::BulkString(Some(data)) => {
                out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(CRLF);
            }
            RespValue::Array(None) => out.extend_from_slice(b"*-1\r\n"),
            RespValue::Array(Some(items)) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode_into(out);
                }
            }
        }
    }

    /// UTF-8 payload of a simple or non-null bulk string.
    pub fn into_string(self) -> Result<Option<String>, ServiceError> {
        match self {
            RespValue::SimpleString(s) => Ok(Some(s)),
            RespValue::BulkString(None) => Ok(None),
            RespValue::BulkString(Some(data)) => String::from_utf8(data)
                .map(Some)
                .map_err(|_| ServiceError::protocol("bulk string is not valid utf-8")),
            other => Err(ServiceError::protocol(format!("expected string reply, got {}", other.kind()))),
        }
    }

    /// Elements of an array reply, each decoded as a string.
    pub fn into_string_list(self) -> Result<Option<Vec<String>>, ServiceError> {
        match self {
            RespValue::Array(None) => Ok(None),
            RespValue::Array(Some(items)) => items
                .into_iter()
                .map(|item| {
                    item.into_string()?
                        .ok_or_else(|| ServiceError::protocol("null element in list reply"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            other => Err(ServiceError::protocol(format!("expected array reply, got {}", other.kind()))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::SimpleString(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::BulkString(_) => "bulk string",
            RespValue::Array(_) => "array",
        }
    }
}

/// Encode a command as an array of bulk strings, the only form servers accept from clients.
pub fn encode_command(args: &[&str]) -> Vec<u8> {
    RespValue::Array(Some(args.iter().map(|a| RespValue::bulk(a.as_bytes())).collect())).encode()
}

/// Decode one value from the front of `buf`.
///
/// Returns `Ok(None)` when the frame is incomplete, otherwise the value and the number of
/// bytes it occupied.
pub fn decode(buf: &[u8]) -> Result<Option<(RespValue, usize)>, ServiceError> {
    decode_nested(buf, 0)
}

fn decode_nested(buf: &[u8], depth: usize) -> Result<Option<(RespValue, usize)>, ServiceError> {
    let Some((line, mut pos)) = read_line(buf, 0)? else {
        return Ok(None);
    };
    let (tag, body) = line
        .split_first()
        .ok_or_else(|| ServiceError::protocol("empty frame"))?;
    let value = match *tag {
        b'+' => RespValue::SimpleString(utf8(body)?),
        b'-' => RespValue::Error(utf8(body)?),
        b':' => RespValue::Integer(parse_int(body)?),
        b'$' => {
            let len = parse_int(body)?;
            if len < 0 {
                RespValue::BulkString(None)
            } else {
                let len = len as usize;
                if buf.len() < pos + len + CRLF.len() {
                    return Ok(None);
                }
                if &buf[pos + len..pos + len + CRLF.len()] != CRLF {
                    return Err(ServiceError::protocol("bulk string not terminated by CRLF"));
                }
                let data = buf[pos..pos + len].to_vec();
                pos += len + CRLF.len();
                RespValue::BulkString(Some(data))
            }
        }
        b'*' => {
            let count = parse_int(body)?;
            if count < 0 {
                RespValue::Array(None)
            } else {
                if depth >= MAX_DEPTH {
                    return Err(ServiceError::protocol("arrays nested too deeply"));
                }
                let mut items = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    match decode_nested(&buf[pos..], depth + 1)? {
                        Some((item, used)) => {
                            items.push(item);
                            pos += used;
                        }
                        None => return Ok(None),
                    }
                }
                RespValue::Array(Some(items))
            }
        }
        other => {
            return Err(ServiceError::protocol(format!("unknown type byte 0x{other:02x}")));
        }
    };
    Ok(Some((value, pos)))
}

/// Finds where the frame at the front of a growing buffer ends, resuming where the
/// previous call stopped so each byte is examined once.
///
/// Feed it the same buffer (with more bytes appended) until it returns the frame length,
/// then [`decode`] that prefix. The scanner resets itself after reporting a frame.
#[derive(Debug, Default)]
pub struct FrameScanner {
    pos: usize,
    /// Elements still expected by each open array, innermost last.
    open: Vec<i64>,
}

impl FrameScanner {
    pub fn scan(&mut self, buf: &[u8]) -> Result<Option<usize>, ServiceError> {
        loop {
            let Some((line, next)) = read_line(buf, self.pos)? else {
                return Ok(None);
            };
            let (tag, body) = line
                .split_first()
                .ok_or_else(|| ServiceError::protocol("empty frame"))?;
            let end = match *tag {
                b'+' | b'-' | b':' => next,
                b'$' => {
                    let len = parse_int(body)?;
                    if len < 0 {
                        next
                    } else {
                        let end = next + len as usize + CRLF.len();
                        if buf.len() < end {
                            return Ok(None);
                        }
                        end
                    }
                }
                b'*' => {
                    let count = parse_int(body)?;
                    if count > 0 {
                        if self.open.len() >= MAX_DEPTH {
                            return Err(ServiceError::protocol("arrays nested too deeply"));
                        }
                        self.open.push(count);
                        self.pos = next;
                        continue;
                    }
                    next
                }
                other => {
                    return Err(ServiceError::protocol(format!("unknown type byte 0x{other:02x}")));
                }
            };
            self.pos = end;
            // one element done; close every array it completes
            loop {
                let Some(top) = self.open.len().checked_sub(1) else {
                    let len = self.pos;
                    self.pos = 0;
                    return Ok(Some(len));
                };
                self.open[top] -= 1;
                if self.open[top] > 0 {
                    break;
                }
                self.open.pop();
            }
        }
    }
}

fn read_line(buf: &[u8], from: usize) -> Result<Option<(&[u8], usize)>, ServiceError> {
    let rest = &buf[from..];
    match rest.windows(2).position(|w| w == CRLF) {
        Some(i) => Ok(Some((&rest[..i], from + i + CRLF.len()))),
        None => Ok(None),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, ServiceError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| ServiceError::protocol("line is not valid utf-8"))
}

fn parse_int(bytes: &[u8]) -> Result<i64, ServiceError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ServiceError::protocol("invalid integer in frame header"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_array_of_bulk_strings() {
        let bytes = encode_command(&["SET", "domain", "example.com"]);
        assert_eq!(bytes, b"*3\r\n$3\r\nSET\r\n$6\r\ndomain\r\n$11\r\nexample.com\r\n".to_vec());
    }

    #[test]
    fn decodes_scalar_replies() -> Result<(), ServiceError> {
        assert_eq!(decode(b"+OK\r\n")?, Some((RespValue::SimpleString("OK".into()), 5)));
        assert_eq!(decode(b"-ERR nope\r\n")?, Some((RespValue::Error("ERR nope".into()), 11)));
        assert_eq!(decode(b":12\r\n")?, Some((RespValue::Integer(12), 5)));
        assert_eq!(decode(b"$-1\r\n")?, Some((RespValue::BulkString(None), 5)));
        assert_eq!(decode(b"$0\r\n\r\n")?, Some((RespValue::bulk(""), 6)));
        Ok(())
    }

    #[test]
    fn decodes_nested_arrays() -> Result<(), ServiceError> {
        let frame = b"*2\r\n$1\r\na\r\n*1\r\n:3\r\n";
        let (value, used) = decode(frame)?.expect("complete frame");
        assert_eq!(used, frame.len());
        assert_eq!(
            value,
            RespValue::Array(Some(vec![
                RespValue::bulk("a"),
                RespValue::Array(Some(vec![RespValue::Integer(3)])),
            ]))
        );
        Ok(())
    }

    #[test]
    fn incomplete_frames_ask_for_more() -> Result<(), ServiceError> {
        let frame = b"*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n";
        for cut in 0..frame.len() {
            assert_eq!(decode(&frame[..cut])?, None, "cut at {cut}");
        }
        assert!(decode(frame)?.is_some());
        Ok(())
    }

    #[test]
    fn trailing_bytes_are_left_alone() -> Result<(), ServiceError> {
        let (value, used) = decode(b"+OK\r\n+QUEUED\r\n")?.expect("complete frame");
        assert_eq!(value, RespValue::SimpleString("OK".into()));
        assert_eq!(used, 5);
        Ok(())
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(decode(b"?what\r\n").is_err());
        assert!(decode(b":abc\r\n").is_err());
        assert!(decode(b"$3\r\nabcXY").is_err());
    }

    #[test]
    fn encode_then_decode_preserves_binary_payloads() -> Result<(), ServiceError> {
        let value = RespValue::bulk(b"line\r\nbreak".to_vec());
        let bytes = value.encode();
        assert_eq!(decode(&bytes)?, Some((value, bytes.len())));
        Ok(())
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut frame = b"*1\r\n".repeat(MAX_DEPTH + 1);
        frame.extend_from_slice(b":1\r\n");
        assert!(decode(&frame).is_err());
        assert!(FrameScanner::default().scan(&frame).is_err());

        let mut ok = b"*1\r\n".repeat(MAX_DEPTH);
        ok.extend_from_slice(b":1\r\n");
        assert!(decode(&ok).is_ok_and(|v| v.is_some()));
    }

    #[test]
    fn scanner_finds_frame_end_byte_by_byte() -> Result<(), ServiceError> {
        let frame = b"*3\r\n$5\r\nhello\r\n*2\r\n:1\r\n$-1\r\n*0\r\n+OK\r\n";
        let mut scanner = FrameScanner::default();
        let first_len = frame.len() - 5;
        for cut in 1..first_len {
            assert_eq!(scanner.scan(&frame[..cut])?, None, "cut at {cut}");
        }
        assert_eq!(scanner.scan(&frame[..first_len])?, Some(first_len));
        assert!(decode(&frame[..first_len])?.is_some());
        // reset after reporting, ready for the next frame in a fresh buffer
        assert_eq!(scanner.scan(b"+OK\r\n")?, Some(5));
        Ok(())
    }

    #[test]
    fn scanner_handles_payloads_containing_crlf() -> Result<(), ServiceError> {
        let frame = RespValue::Array(Some(vec![RespValue::bulk("a\r\nb"), RespValue::Integer(7)])).encode();
        let mut scanner = FrameScanner::default();
        assert_eq!(scanner.scan(&frame[..8])?, None);
        assert_eq!(scanner.scan(&frame)?, Some(frame.len()));
        Ok(())
    }

    #[test]
    fn string_list_conversion() -> Result<(), ServiceError> {
        let reply = RespValue::Array(Some(vec![RespValue::bulk("a"), RespValue::bulk("b")]));
        assert_eq!(reply.into_string_list()?, Some(vec!["a".to_string(), "b".to_string()]));
        assert!(RespValue::Integer(1).into_string_list().is_err());
        assert_eq!(RespValue::BulkString(None).into_string()?, None);
        Ok(())
    }
}
