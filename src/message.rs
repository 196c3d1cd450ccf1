use crate::inspect::{inspect_debug, inspect_value, render_plain};
use crate::record::{LogPayload, LogRecord};
use serde_json::Value;
use std::fmt;

/// Every shape a log call can hand to [`parse_message`].
pub enum LogInput {
    PlainText(String),
    /// A printf-style template plus its positional parameters.
    TemplateWithParams { template: String, params: Vec<Value> },
    ArbitraryValue(Arbitrary),
    Absent(Absence),
}

/// A value with neither text nor a usable template.
pub enum Arbitrary {
    Json(Value),
    Debug(Box<dyn fmt::Debug + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    Null,
    Undefined,
}

impl Absence {
    fn as_str(self) -> &'static str {
        match self {
            Absence::Null => "null",
            Absence::Undefined => "undefined",
        }
    }
}

impl LogInput {
    pub fn template(template: impl Into<String>, params: Vec<Value>) -> Self {
        LogInput::TemplateWithParams {
            template: template.into(),
            params,
        }
    }

    pub fn debug<T>(value: T) -> Self
    where
        T: fmt::Debug + Send + Sync + 'static,
    {
        LogInput::ArbitraryValue(Arbitrary::Debug(Box::new(value)))
    }

    /// Classify a JSON value handed over from a dynamic runtime.
    ///
    /// An object with a string `message` and an array `params` is a template;
    /// any other object or array is an arbitrary value.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => LogInput::Absent(Absence::Null),
            Value::String(s) => LogInput::PlainText(s),
            Value::Object(mut map) => {
                let is_template = matches!(map.get("message"), Some(Value::String(s)) if !s.is_empty())
                    && matches!(map.get("params"), Some(Value::Array(_)));
                if !is_template {
                    return LogInput::ArbitraryValue(Arbitrary::Json(Value::Object(map)));
                }
                match (map.remove("message"), map.remove("params")) {
                    (Some(Value::String(template)), Some(Value::Array(params))) => {
                        LogInput::TemplateWithParams { template, params }
                    }
                    // Unreachable given the check above; keep the value intact.
                    _ => LogInput::ArbitraryValue(Arbitrary::Json(Value::Object(map))),
                }
            }
            other @ Value::Array(_) => LogInput::ArbitraryValue(Arbitrary::Json(other)),
            // Scalars print as their literal form.
            other => LogInput::PlainText(other.to_string()),
        }
    }
}

impl From<&str> for LogInput {
    fn from(s: &str) -> Self {
        LogInput::PlainText(s.to_string())
    }
}

impl From<String> for LogInput {
    fn from(s: String) -> Self {
        LogInput::PlainText(s)
    }
}

impl<T: Into<LogInput>> From<Option<T>> for LogInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(LogInput::Absent(Absence::Undefined), Into::into)
    }
}

impl fmt::Debug for LogInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogInput::PlainText(s) => f.debug_tuple("PlainText").field(s).finish(),
            LogInput::TemplateWithParams { template, params } => f
                .debug_struct("TemplateWithParams")
                .field("template", template)
                .field("params", params)
                .finish(),
            LogInput::ArbitraryValue(_) => f.write_str("ArbitraryValue(..)"),
            LogInput::Absent(absence) => f.debug_tuple("Absent").field(absence).finish(),
        }
    }
}

/// Canonicalize a log input into a `{ log: ... }` payload. Never fails.
pub fn parse_message(input: impl Into<LogInput>) -> LogPayload {
    let log = match input.into() {
        LogInput::PlainText(message) => LogRecord {
            message,
            param_message: None,
        },
        LogInput::TemplateWithParams { template, params } => LogRecord {
            message: format_template(&template, &params),
            param_message: Some(template),
        },
        LogInput::ArbitraryValue(Arbitrary::Json(value)) => LogRecord {
            message: inspect_value(&value),
            param_message: None,
        },
        LogInput::ArbitraryValue(Arbitrary::Debug(value)) => LogRecord {
            message: inspect_debug(&*value),
            param_message: None,
        },
        LogInput::Absent(absence) => LogRecord {
            message: absence.as_str().to_string(),
            param_message: None,
        },
    };

    LogPayload { log }
}

/// printf-style substitution.
///
/// Supported directives: `%s` (string), `%d` (number), `%i` (integer),
/// `%f` (float), `%j` (JSON), `%o`/`%O` (inspect) and `%%`. A directive with no
/// parameter left is kept verbatim; parameters without a directive are
/// appended, separated by spaces.
pub fn format_template(template: &str, params: &[Value]) -> String {
    if params.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut params = params.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let directive = match chars.peek() {
            Some(&d) => d,
            None => {
                out.push('%');
                break;
            }
        };

        if directive == '%' {
            chars.next();
            out.push('%');
            continue;
        }

        if !matches!(directive, 's' | 'd' | 'i' | 'f' | 'j' | 'o' | 'O') {
            out.push('%');
            continue;
        }

        chars.next();
        match params.next() {
            Some(param) => out.push_str(&apply_directive(directive, param)),
            None => {
                out.push('%');
                out.push(directive);
            }
        }
    }

    for param in params {
        out.push(' ');
        out.push_str(&render_plain(param));
    }

    out
}

fn apply_directive(directive: char, param: &Value) -> String {
    match directive {
        's' => render_plain(param),
        'd' => format_number(to_number(param)),
        'i' => format_number(to_number(param).trunc()),
        'f' => format_number(to_float(param)),
        'j' => serde_json::to_string(param).unwrap_or_else(|_| "[Circular]".to_string()),
        _ => inspect_value(param),
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => leading_float(s.trim_start()),
        _ => f64::NAN,
    }
}

/// Parse the longest numeric prefix: optional sign, digits with at most one
/// `.`, optional exponent. `"3.5kg"` -> 3.5, `"1e5"` -> 100000, `"1.2.3"` -> 1.2.
fn leading_float(s: &str) -> f64 {
    let bytes = s.as_bytes();
    let digits_from = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let int_digits = digits_from(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digits_from(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else {
        // f64's Display already drops a zero fraction: 42.0 -> "42".
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn message_of(input: impl Into<LogInput>) -> LogRecord {
        parse_message(input).log
    }

    #[test]
    fn plain_strings_pass_through() {
        for s in ["", "foo", "100%s", "multi\nline"] {
            assert_eq!(message_of(s), LogRecord { message: s.to_string(), param_message: None });
        }
    }

    #[test]
    fn template_with_params_is_expanded() {
        let record = message_of(LogInput::template("foo%s", vec![json!("bar")]));
        assert_eq!(
            record,
            LogRecord { message: "foobar".to_string(), param_message: Some("foo%s".to_string()) }
        );
    }

    #[test]
    fn absent_values_stringify() {
        assert_eq!(message_of(LogInput::Absent(Absence::Null)).message, "null");
        assert_eq!(message_of(None::<&str>).message, "undefined");
    }

    #[test]
    fn arbitrary_json_is_inspected() {
        let record = message_of(LogInput::from_json(json!({ "foo": "bar" })));
        assert_eq!(record.message, "{ foo: 'bar' }");
        assert_eq!(record.param_message, None);
    }

    #[test]
    fn arbitrary_debug_value_is_rendered() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Query {
            foo: regex::Regex,
        }

        let record = message_of(LogInput::debug(Query { foo: regex::Regex::new("bar").unwrap() }));
        assert!(record.message.contains("bar"), "{}", record.message);
        assert_eq!(record.param_message, None);
    }

    #[test]
    fn from_json_classifies_inputs() {
        assert!(matches!(LogInput::from_json(json!("hi")), LogInput::PlainText(s) if s == "hi"));
        assert!(matches!(LogInput::from_json(Value::Null), LogInput::Absent(Absence::Null)));
        assert!(matches!(
            LogInput::from_json(json!({ "message": "a %d", "params": [1] })),
            LogInput::TemplateWithParams { .. }
        ));
        // A message without params is just an object.
        assert!(matches!(
            LogInput::from_json(json!({ "message": "a %d" })),
            LogInput::ArbitraryValue(_)
        ));
        assert!(matches!(LogInput::from_json(json!(42)), LogInput::PlainText(s) if s == "42"));
    }

    #[test]
    fn directives() {
        let cases = [
            ("%s|%s", vec![json!("a"), json!({ "k": 1 })], "a|{ k: 1 }"),
            ("%d", vec![json!("42")], "42"),
            ("%d", vec![json!("abc")], "NaN"),
            ("%d", vec![json!(true)], "1"),
            ("%i", vec![json!(3.9)], "3"),
            ("%f", vec![json!("3.5kg")], "3.5"),
            ("%f", vec![json!("1e5")], "100000"),
            ("%f", vec![json!("1.2.3")], "1.2"),
            ("%f", vec![json!("-2.5e-1m")], "-0.25"),
            ("%f", vec![json!("7e")], "7"),
            ("%f", vec![json!(".5")], "0.5"),
            ("%f", vec![json!("-Infinity")], "-Infinity"),
            ("%f", vec![json!("kg")], "NaN"),
            ("%j", vec![json!({ "a": [1, 2] })], r#"{"a":[1,2]}"#),
            ("%o", vec![json!("x")], "'x'"),
            ("100%% %s", vec![json!("done")], "100% done"),
            ("%s and %s", vec![json!("one")], "one and %s"),
            ("%x %s", vec![json!("y")], "%x y"),
            ("trailing %", vec![json!(1)], "trailing % 1"),
        ];

        for (template, params, expected) in cases {
            assert_eq!(format_template(template, &params), expected, "template {:?}", template);
        }
    }

    #[test]
    fn surplus_params_are_appended() {
        let out = format_template("a", &[json!("b"), json!(1), json!(null)]);
        assert_eq!(out, "a b 1 null");
    }

    #[test]
    fn template_without_params_is_untouched() {
        let record = message_of(LogInput::template("50%% %s", Vec::new()));
        assert_eq!(record.message, "50%% %s");
        assert_eq!(record.param_message.as_deref(), Some("50%% %s"));
    }
}
