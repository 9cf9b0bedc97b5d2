//! RESP2 framing
//!
//! Requests arrive as arrays of bulk strings; replies use every RESP2 type.
//! Decoding is done with nom streaming parsers, so a partial frame yields
//! `Ok(None)` and leaves the buffer untouched.

use bytes::{Buf, BufMut, BytesMut};
use nom::{
    branch::alt,
    bytes::streaming::{tag, take, take_until},
    character::streaming::char,
    combinator::{map, map_res},
    error::{Error, ErrorKind},
    sequence::{preceded, terminated},
    IResult,
};

/// Maximum bulk string size (512MB)
const MAX_BULK_STRING_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array size (1M elements)
const MAX_ARRAY_SIZE: usize = 1024 * 1024;

/// Maximum array nesting; requests themselves are flat
const MAX_ARRAY_DEPTH: usize = 32;

/// RESP data types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// `+OK\r\n`
    SimpleString(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:1000\r\n`
    Integer(i64),
    /// `$6\r\nfoobar\r\n`, `$-1\r\n` for null
    BulkString(Option<Vec<u8>>),
    /// `*2\r\n...`, `*-1\r\n` for null
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Bulk string from anything string-like
    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    /// Encode into `out`
    pub fn write_to(&self, out: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => {
                out.put_u8(b'+');
                out.put_slice(s.as_bytes());
                out.put_slice(b"\r\n");
            }
            RespValue::Error(e) => {
                out.put_u8(b'-');
                out.put_slice(e.as_bytes());
                out.put_slice(b"\r\n");
            }
            RespValue::Integer(i) => {
                out.put_slice(format!(":{}\r\n", i).as_bytes());
            }
            RespValue::BulkString(None) => out.put_slice(b"$-1\r\n"),
            RespValue::BulkString(Some(data)) => {
                out.put_slice(format!("${}\r\n", data.len()).as_bytes());
                out.put_slice(data);
                out.put_slice(b"\r\n");
            }
            RespValue::Array(None) => out.put_slice(b"*-1\r\n"),
            RespValue::Array(Some(items)) => {
                out.put_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.write_to(out);
                }
            }
        }
    }

    /// Encode into a fresh buffer
    pub fn serialize(&self) -> BytesMut {
        let mut out = BytesMut::new();
        self.write_to(&mut out);
        out
    }

    /// Decode one value from the front of `buf`, consuming it.
    ///
    /// `Ok(None)` means the frame is incomplete.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, String> {
        let (consumed, value) = match value(&buf[..]) {
            Ok((rest, value)) => (buf.len() - rest.len(), value),
            Err(nom::Err::Incomplete(_)) => return Ok(None),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                return Err(match e.code {
                    ErrorKind::TooLarge => "request too large".to_string(),
                    code => format!("protocol error ({:?})", code),
                });
            }
        };
        buf.advance(consumed);
        Ok(Some(value))
    }
}

fn line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_until("\r\n"), tag("\r\n"))(input)
}

fn text_line(input: &[u8]) -> IResult<&[u8], String> {
    map_res(line, |l: &[u8]| String::from_utf8(l.to_vec()))(input)
}

fn number(input: &[u8]) -> IResult<&[u8], i64> {
    map_res(map_res(line, std::str::from_utf8), str::parse::<i64>)(input)
}

fn simple_string(input: &[u8]) -> IResult<&[u8], RespValue> {
    map(preceded(char('+'), text_line), RespValue::SimpleString)(input)
}

fn error(input: &[u8]) -> IResult<&[u8], RespValue> {
    map(preceded(char('-'), text_line), RespValue::Error)(input)
}

fn integer(input: &[u8]) -> IResult<&[u8], RespValue> {
    map(preceded(char(':'), number), RespValue::Integer)(input)
}

fn too_large(input: &[u8]) -> nom::Err<Error<&[u8]>> {
    nom::Err::Failure(Error::new(input, ErrorKind::TooLarge))
}

fn bulk_string(input: &[u8]) -> IResult<&[u8], RespValue> {
    let (input, len) = preceded(char('$'), number)(input)?;
    if len < 0 {
        return Ok((input, RespValue::BulkString(None)));
    }
    let len = len as usize;
    if len > MAX_BULK_STRING_SIZE {
        return Err(too_large(input));
    }
    let (input, data) = terminated(take(len), tag("\r\n"))(input)?;
    Ok((input, RespValue::BulkString(Some(data.to_vec()))))
}

fn array(input: &[u8], depth: usize) -> IResult<&[u8], RespValue> {
    let (input, len) = preceded(char('*'), number)(input)?;
    if len < 0 {
        return Ok((input, RespValue::Array(None)));
    }
    let len = len as usize;
    if len > MAX_ARRAY_SIZE || depth >= MAX_ARRAY_DEPTH {
        return Err(too_large(input));
    }

    let mut items = Vec::with_capacity(len.min(1024));
    let mut input = input;
    for _ in 0..len {
        let (rest, item) = nested(input, depth + 1)?;
        items.push(item);
        input = rest;
    }
    Ok((input, RespValue::Array(Some(items))))
}

fn nested(input: &[u8], depth: usize) -> IResult<&[u8], RespValue> {
    match input.first() {
        Some(b'*') => array(input, depth),
        _ => alt((simple_string, error, integer, bulk_string))(input),
    }
}

fn value(input: &[u8]) -> IResult<&[u8], RespValue> {
    nested(input, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(data: &[u8]) -> RespValue {
        let mut buf = BytesMut::from(data);
        let val = RespValue::parse(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        val
    }

    #[test]
    fn test_simple_string() {
        let val = parse_all(b"+OK\r\n");
        assert_eq!(val, RespValue::SimpleString("OK".to_string()));
        assert_eq!(&val.serialize()[..], b"+OK\r\n");
    }

    #[test]
    fn test_error_and_integer() {
        assert_eq!(
            parse_all(b"-NOTFOUND note x\r\n"),
            RespValue::Error("NOTFOUND note x".to_string())
        );
        assert_eq!(parse_all(b":-12\r\n"), RespValue::Integer(-12));
    }

    #[test]
    fn test_bulk_string_with_crlf_inside() {
        let data = b"$8\r\nab\r\ncd\r\n\r\n";
        assert_eq!(parse_all(data), RespValue::bulk("ab\r\ncd\r\n"));
    }

    #[test]
    fn test_null_values() {
        assert_eq!(parse_all(b"$-1\r\n"), RespValue::BulkString(None));
        assert_eq!(parse_all(b"*-1\r\n"), RespValue::Array(None));
    }

    #[test]
    fn test_command_array() {
        let data = b"*3\r\n$8\r\nNOTES.ADD\r\n$5\r\nTitle\r\n$4\r\nText\r\n";
        let mut buf = BytesMut::from(&data[..]);
        // "NOTES.ADD" is 9 bytes, so the declared length leaves a bad terminator
        assert!(RespValue::parse(&mut buf).is_err());

        let data = b"*3\r\n$9\r\nNOTES.ADD\r\n$5\r\nTitle\r\n$4\r\nText\r\n";
        assert_eq!(
            parse_all(data),
            RespValue::Array(Some(vec![
                RespValue::bulk("NOTES.ADD"),
                RespValue::bulk("Title"),
                RespValue::bulk("Text"),
            ]))
        );
    }

    #[test]
    fn test_incomplete_data_left_in_buffer() {
        let mut buf = BytesMut::from(&b"*2\r\n$4\r\nPING\r\n$3\r\nhi"[..]);
        assert!(RespValue::parse(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 20);

        buf.extend_from_slice(b"!\r\n");
        let val = RespValue::parse(&mut buf).unwrap().unwrap();
        assert_eq!(
            val,
            RespValue::Array(Some(vec![RespValue::bulk("PING"), RespValue::bulk("hi!")]))
        );
    }

    #[test]
    fn test_two_frames_in_one_buffer() {
        let mut buf = BytesMut::from(&b"+A\r\n+B\r\n"[..]);
        assert_eq!(
            RespValue::parse(&mut buf).unwrap(),
            Some(RespValue::SimpleString("A".to_string()))
        );
        assert_eq!(
            RespValue::parse(&mut buf).unwrap(),
            Some(RespValue::SimpleString("B".to_string()))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_array_rejected() {
        let mut buf = BytesMut::from(&b"*99999999\r\n"[..]);
        assert_eq!(
            RespValue::parse(&mut buf).unwrap_err(),
            "request too large"
        );
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let mut buf = BytesMut::from(&b"*1\r\n".repeat(100_000)[..]);
        assert_eq!(
            RespValue::parse(&mut buf).unwrap_err(),
            "request too large"
        );

        let mut buf = BytesMut::from(&b"*1\r\n*1\r\n:7\r\n"[..]);
        assert_eq!(
            RespValue::parse(&mut buf).unwrap(),
            Some(RespValue::Array(Some(vec![RespValue::Array(Some(vec![
                RespValue::Integer(7)
            ]))])))
        );
    }

    #[test]
    fn test_unknown_type_byte() {
        let mut buf = BytesMut::from(&b"?what\r\n"[..]);
        assert!(RespValue::parse(&mut buf).is_err());
    }

    #[test]
    fn test_serialize_nested_array() {
        let val = RespValue::Array(Some(vec![
            RespValue::Integer(1),
            RespValue::BulkString(None),
            RespValue::bulk("x"),
        ]));
        assert_eq!(&val.serialize()[..], b"*3\r\n:1\r\n$-1\r\n$1\r\nx\r\n");
    }
}
