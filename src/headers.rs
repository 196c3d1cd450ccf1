use serde_json::{Map, Value};

/// Concrete, insertion-ordered header mapping. Names are lowercased; values are
/// strings, or arrays of strings when a header was repeated.
pub type Headers = Map<String, Value>;

/// Insert a header, collapsing repeated names into an array.
pub fn append(headers: &mut Headers, name: &str, value: &str) {
    let name = name.trim().to_ascii_lowercase();
    let value = Value::String(value.trim().to_string());

    match headers.get_mut(&name) {
        None => {
            headers.insert(name, value);
        }
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Build a header mapping from name/value pairs.
pub fn from_pairs<I, K, V>(pairs: I) -> Headers
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut headers = Headers::new();
    for (name, value) in pairs {
        append(&mut headers, name.as_ref(), value.as_ref());
    }
    headers
}

/// Parse a flushed HTTP/1 header block (`HTTP/1.1 200 OK\r\nName: value\r\n\r\n`).
///
/// The status line is skipped, parsing stops at the first blank line and
/// lines without a `:` are ignored.
pub fn from_raw_block(block: &str) -> Headers {
    let mut headers = Headers::new();

    for (idx, line) in block.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if idx == 0 && line.starts_with("HTTP/") {
            continue;
        }
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if !name.trim().is_empty() {
                append(&mut headers, name, value);
            }
        }
    }

    headers
}

/// Case-insensitive lookup of a single header value. Arrays yield their first entry.
pub fn get<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    let value = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)?;

    match value {
        Value::String(s) => Some(s),
        Value::Array(values) => values.first().and_then(Value::as_str),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repeated_headers_become_arrays() {
        let headers = from_pairs([("Set-Cookie", "a=1"), ("set-cookie", "b=2"), ("X-Id", "7")]);
        assert_eq!(
            Value::Object(headers),
            json!({ "set-cookie": ["a=1", "b=2"], "x-id": "7" })
        );
    }

    #[test]
    fn raw_block_skips_status_line_and_stops_at_blank_line() {
        let block = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nDate: Mon, 01 Jan 2024 00:00:00 GMT\r\n\r\nbody: not-a-header";
        let headers = from_raw_block(block);

        assert_eq!(headers.len(), 2);
        assert_eq!(get(&headers, "content-type"), Some("text/plain"));
        assert_eq!(get(&headers, "DATE"), Some("Mon, 01 Jan 2024 00:00:00 GMT"));
        assert!(headers.get("body").is_none());
    }

    #[test]
    fn raw_block_ignores_malformed_lines() {
        let headers = from_raw_block("garbage\r\n: empty-name\r\nx-ok: yes\r\n");
        assert_eq!(Value::Object(headers), json!({ "x-ok": "yes" }));
    }

    #[test]
    fn insertion_order_is_kept() {
        let headers = from_pairs([("zeta", "1"), ("alpha", "2")]);
        let names: Vec<_> = headers.keys().cloned().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }
}
