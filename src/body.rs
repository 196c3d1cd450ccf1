use crate::record::HttpBody;
use serde::Serialize;
use std::io;
use tracing::debug;

/// Upper bound on captured body size, counted in characters (Unicode scalar
/// values). A character is never split.
pub const MAX_HTTP_BODY_CHARS: usize = 2048;

/// Value substituted for the body when capture is disabled.
pub const REDACTED: &str = "[REDACTED]";

const UNSERIALIZABLE: &str = "[UNSERIALIZABLE]";

/// Borrowed view of a request body as exposed by a [`RequestView`](crate::request::RequestView).
#[derive(Debug)]
pub enum BodyRef<'a, T: ?Sized> {
    Text(&'a str),
    Structured(&'a T),
}

// Manual impls: derive would require `T: Clone`.
impl<T: ?Sized> Clone for BodyRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for BodyRef<'_, T> {}

#[derive(thiserror::Error, Debug)]
pub enum BodyError {
    #[error("body serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("serialized body is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Apply the body capture policy.
///
/// - capture disabled: [`REDACTED`], whatever the body looks like;
/// - text: cut to [`MAX_HTTP_BODY_CHARS`] characters;
/// - structured: kept as a JSON value while its serialized form fits the
///   limit, otherwise the serialized form cut to the limit.
pub fn capture_body<T>(body: BodyRef<'_, T>, capture: bool) -> HttpBody
where
    T: Serialize + ?Sized,
{
    if !capture {
        return HttpBody::Text(REDACTED.to_string());
    }

    match body {
        BodyRef::Text(text) => HttpBody::Text(truncate_chars(text, MAX_HTTP_BODY_CHARS).to_string()),
        BodyRef::Structured(value) => match capture_structured(value, MAX_HTTP_BODY_CHARS) {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "falling back to placeholder for request body");
                HttpBody::Text(UNSERIALIZABLE.to_string())
            }
        },
    }
}

fn capture_structured<T>(value: &T, max_chars: usize) -> Result<HttpBody, BodyError>
where
    T: Serialize + ?Sized,
{
    let mut writer = BoundedWriter::new(max_chars);
    let result = serde_json::to_writer(&mut writer, value);

    if writer.overflowed {
        return Ok(HttpBody::Text(String::from_utf8(writer.buf)?));
    }
    result?;

    let value = serde_json::from_slice(&writer.buf)?;
    Ok(HttpBody::Structured(value))
}

/// Longest prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// `io::Write` sink that keeps at most `max_chars` UTF-8 characters and fails
/// the write once more would be needed.
struct BoundedWriter {
    buf: Vec<u8>,
    chars: usize,
    max_chars: usize,
    overflowed: bool,
}

impl BoundedWriter {
    fn new(max_chars: usize) -> Self {
        BoundedWriter {
            buf: Vec::new(),
            chars: 0,
            max_chars,
            overflowed: false,
        }
    }
}

impl io::Write for BoundedWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if self.overflowed {
            return Err(io::Error::new(io::ErrorKind::Other, "body limit reached"));
        }

        for (idx, &byte) in bytes.iter().enumerate() {
            // Continuation bytes (0b10xx_xxxx) belong to the current character.
            let starts_char = byte & 0xC0 != 0x80;
            if starts_char {
                if self.chars == self.max_chars {
                    self.buf.extend_from_slice(&bytes[..idx]);
                    self.overflowed = true;
                    return Err(io::Error::new(io::ErrorKind::Other, "body limit reached"));
                }
                self.chars += 1;
            }
        }

        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
