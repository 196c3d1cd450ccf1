//! Bounded, inspect-style rendering of arbitrary values.
//!
//! JSON-like values render as `{ key: 'value', list: [ 1, 2 ] }`. Containers
//! at nesting levels 0 through [`MAX_DEPTH`] are expanded; deeper ones collapse
//! to `[Object]` / `[Array]`. Any other
//! value renders through its `Debug` impl. Output never exceeds
//! [`MAX_INSPECT_CHARS`] characters plus a trailing `...`, and a `Debug` impl
//! that fails or panics yields a fixed placeholder instead.

use serde_json::Value;
use std::fmt::{self, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

pub const MAX_INSPECT_CHARS: usize = 2048;

const MAX_DEPTH: usize = 2;
const ELLIPSIS: &str = "...";
const UNRENDERABLE: &str = "[unrenderable value]";

/// Render a JSON value the way a REPL would print it.
pub fn inspect_value(value: &Value) -> String {
    let mut out = BoundedString::new(MAX_INSPECT_CHARS);
    // The only possible error is hitting the bound.
    let _ = write_value(&mut out, value, 0);
    out.finish()
}

/// Render any `Debug` value, bounded and panic-safe.
///
/// A panicking `Debug` impl is caught and replaced by a placeholder, but the
/// process panic hook still runs first; with the default hook that prints the
/// panic message to stderr. Hosts that log hostile values on hot paths should
/// install a quieter hook.
pub fn inspect_debug(value: &dyn fmt::Debug) -> String {
    let mut out = BoundedString::new(MAX_INSPECT_CHARS);
    let rendered = catch_unwind(AssertUnwindSafe(|| write!(out, "{:?}", value)));

    match rendered {
        Ok(Ok(())) => out.finish(),
        Ok(Err(_)) if out.truncated => out.finish(),
        Ok(Err(_)) => {
            debug!("Debug impl returned an error while rendering log input");
            UNRENDERABLE.to_string()
        }
        Err(_) => {
            debug!("Debug impl panicked while rendering log input");
            UNRENDERABLE.to_string()
        }
    }
}

/// Plain rendering used for `%s` and surplus parameters: strings verbatim,
/// everything else inspected.
pub fn render_plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => inspect_value(other),
    }
}

fn write_value(out: &mut BoundedString, value: &Value, depth: usize) -> fmt::Result {
    match value {
        Value::Null => out.write_str("null"),
        Value::Bool(b) => write!(out, "{}", b),
        Value::Number(n) => write!(out, "{}", n),
        Value::String(s) => write_quoted(out, s),
        Value::Array(items) if items.is_empty() => out.write_str("[]"),
        Value::Array(_) if depth > MAX_DEPTH => out.write_str("[Array]"),
        Value::Array(items) => {
            out.write_str("[ ")?;
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.write_str(", ")?;
                }
                write_value(out, item, depth + 1)?;
            }
            out.write_str(" ]")
        }
        Value::Object(map) if map.is_empty() => out.write_str("{}"),
        Value::Object(_) if depth > MAX_DEPTH => out.write_str("[Object]"),
        Value::Object(map) => {
            out.write_str("{ ")?;
            for (idx, (key, item)) in map.iter().enumerate() {
                if idx > 0 {
                    out.write_str(", ")?;
                }
                if is_identifier(key) {
                    out.write_str(key)?;
                } else {
                    write_quoted(out, key)?;
                }
                out.write_str(": ")?;
                write_value(out, item, depth + 1)?;
            }
            out.write_str(" }")
        }
    }
}

fn write_quoted(out: &mut BoundedString, s: &str) -> fmt::Result {
    out.write_char('\'')?;
    for c in s.chars() {
        match c {
            '\'' => out.write_str("\\'")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('\'')
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// `fmt::Write` target that stops accepting input after `max_chars`.
struct BoundedString {
    buf: String,
    chars: usize,
    max_chars: usize,
    truncated: bool,
}

impl BoundedString {
    fn new(max_chars: usize) -> Self {
        BoundedString {
            buf: String::new(),
            chars: 0,
            max_chars,
            truncated: false,
        }
    }

    fn finish(mut self) -> String {
        if self.truncated {
            self.buf.push_str(ELLIPSIS);
        }
        self.buf
    }
}

impl Write for BoundedString {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.truncated {
            return Err(fmt::Error);
        }
        for c in s.chars() {
            if self.chars == self.max_chars {
                self.truncated = true;
                return Err(fmt::Error);
            }
            self.buf.push(c);
            self.chars += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_nested_values() {
        let value = json!({ "foo": "bar", "n": 1, "list": [true, null], "dashed-key": {} });
        assert_eq!(
            inspect_value(&value),
            "{ foo: 'bar', n: 1, list: [ true, null ], 'dashed-key': {} }"
        );
    }

    #[test]
    fn collapses_deep_nesting() {
        let shallow = json!({ "a": { "b": { "c": 1 } }, "l": [[1]] });
        assert_eq!(inspect_value(&shallow), "{ a: { b: { c: 1 } }, l: [ [ 1 ] ] }");

        let deep = json!({ "a": { "b": { "c": { "d": 1 } } }, "l": [[[[1]]]] });
        assert_eq!(inspect_value(&deep), "{ a: { b: { c: [Object] } }, l: [ [ [Array] ] ] }");
    }

    #[test]
    fn escapes_quotes() {
        assert_eq!(inspect_value(&json!("it's")), "'it\\'s'");
    }

    #[test]
    fn bounds_output_length() {
        let value = json!({ "big": "z".repeat(MAX_INSPECT_CHARS * 2) });
        let out = inspect_value(&value);
        assert!(out.ends_with(ELLIPSIS));
        assert_eq!(out.chars().count(), MAX_INSPECT_CHARS + ELLIPSIS.len());
    }

    #[test]
    fn debug_rendering_survives_panics() {
        struct Hostile;
        impl fmt::Debug for Hostile {
            fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
                panic!("getter threw");
            }
        }

        assert_eq!(inspect_debug(&Hostile), UNRENDERABLE);
    }

    #[test]
    fn debug_rendering_survives_errors() {
        struct Failing;
        impl fmt::Debug for Failing {
            fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Err(fmt::Error)
            }
        }

        assert_eq!(inspect_debug(&Failing), UNRENDERABLE);
    }

    #[test]
    fn debug_rendering_is_bounded() {
        let long = vec![0u8; MAX_INSPECT_CHARS];
        let out = inspect_debug(&long);
        assert!(out.ends_with(ELLIPSIS));
        assert_eq!(out.chars().count(), MAX_INSPECT_CHARS + ELLIPSIS.len());
    }
}
