use crate::headers::Headers;
use serde::Serialize;
use serde_json::{Map, Value};

/// Canonical log record produced by [`parse_message`](crate::message::parse_message).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub message: String,
    /// Unexpanded template, present only when the input carried parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogPayload {
    pub log: LogRecord,
}

/// Snapshot of an incoming HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequestContext {
    pub http_version: String,
    pub method: String,
    pub url: RequestUrl,
    pub socket: SocketInfo,
    pub headers: Headers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<HttpBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestUrl {
    pub raw: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub pathname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocketInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    pub encrypted: bool,
}

/// Captured request body: either (possibly truncated) text, the redaction
/// marker, or a structured value small enough to keep as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HttpBody {
    Text(String),
    Structured(Value),
}

impl HttpBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HttpBody::Text(text) => Some(text),
            HttpBody::Structured(_) => None,
        }
    }

    pub fn is_redacted(&self) -> bool {
        self.as_text() == Some(crate::body::REDACTED)
    }
}

/// Snapshot of an outgoing HTTP response.
///
/// `headers_sent` and `finished` are only populated for error captures;
/// transaction reports leave them out entirely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpResponseContext {
    pub status_code: u16,
    pub headers: Headers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers_sent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
}

/// One resolved entry of a stack trace, innermost call first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackFrame {
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub library_frame: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_context: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_context: Option<Vec<String>>,
}

impl StackFrame {
    pub fn new(function: impl Into<String>) -> Self {
        StackFrame {
            function: function.into(),
            file: None,
            line: None,
            column: None,
            library_frame: false,
            abs_path: None,
            pre_context: None,
            context_line: None,
            post_context: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionRecord {
    pub message: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncaught: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    pub stacktrace: Vec<StackFrame>,
}

/// Structured exception produced by [`parse_error`](crate::exception::parse_error).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub culprit: Option<String>,
    pub exception: ExceptionRecord,
}

/// An event is either a log or an exception, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Log(LogPayload),
    Error(ErrorPayload),
}

impl From<LogPayload> for EventPayload {
    fn from(payload: LogPayload) -> Self {
        EventPayload::Log(payload)
    }
}

impl From<ErrorPayload> for EventPayload {
    fn from(payload: ErrorPayload) -> Self {
        EventPayload::Error(payload)
    }
}
