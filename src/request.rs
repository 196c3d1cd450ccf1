use crate::body::{capture_body, BodyRef};
use crate::headers::{self, Headers};
use crate::record::{HttpRequestContext, RequestUrl, SocketInfo};
use serde::Serialize;
use serde_json::Value;

/// Read-only view over a live incoming request.
///
/// Instrumentation adapts its runtime request objects to this trait; the
/// extractor only reads through it for the duration of one call.
pub trait RequestView {
    /// Type of a structured (non-text) body.
    type Body: Serialize + ?Sized;

    fn http_version(&self) -> &str;
    fn method(&self) -> &str;
    /// Raw request target as received, e.g. `/search?q=rust`.
    fn target(&self) -> &str;
    /// Concrete copy of the current headers.
    fn headers(&self) -> Headers;
    fn remote_address(&self) -> Option<&str>;
    fn encrypted(&self) -> bool;
    fn body(&self) -> Option<BodyRef<'_, Self::Body>>;
}

/// Owned request body for [`RequestSnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub enum OwnedBody<B> {
    Text(String),
    Structured(B),
}

/// Plain owned request, for adapters that already copied what they need.
#[derive(Debug, Clone)]
pub struct RequestSnapshot<B = Value> {
    pub http_version: String,
    pub method: String,
    pub target: String,
    pub headers: Headers,
    pub remote_address: Option<String>,
    pub encrypted: bool,
    pub body: Option<OwnedBody<B>>,
}

impl<B> RequestSnapshot<B> {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        RequestSnapshot {
            http_version: "1.1".to_string(),
            method: method.into(),
            target: target.into(),
            headers: Headers::new(),
            remote_address: None,
            encrypted: false,
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        headers::append(&mut self.headers, name, value);
        self
    }

    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(OwnedBody::Text(body.into()));
        self
    }

    pub fn structured_body(mut self, body: B) -> Self {
        self.body = Some(OwnedBody::Structured(body));
        self
    }
}

impl<B: Serialize> RequestView for RequestSnapshot<B> {
    type Body = B;

    fn http_version(&self) -> &str {
        &self.http_version
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    fn encrypted(&self) -> bool {
        self.encrypted
    }

    fn body(&self) -> Option<BodyRef<'_, B>> {
        self.body.as_ref().map(|body| match body {
            OwnedBody::Text(text) => BodyRef::Text(text.as_str()),
            OwnedBody::Structured(value) => BodyRef::Structured(value),
        })
    }
}

/// Snapshot `req` into an [`HttpRequestContext`].
///
/// `capture` decides whether the body is recorded or replaced by the
/// redaction marker; see [`capture_body`].
pub fn request_context<R>(req: &R, capture: bool) -> HttpRequestContext
where
    R: RequestView + ?Sized,
{
    let headers = req.headers();
    let encrypted = req.encrypted();
    let url = parse_url(req.target(), headers::get(&headers, "host"), encrypted);

    HttpRequestContext {
        http_version: req.http_version().to_string(),
        method: req.method().to_string(),
        url,
        socket: SocketInfo {
            remote_address: req.remote_address().map(str::to_string),
            encrypted,
        },
        headers,
        body: req.body().map(|body| capture_body(body, capture)),
    }
}

/// Decompose a raw request target.
///
/// Origin-form targets (`/path?query`) take their host from the `Host`
/// header; absolute-form targets (`http://host/path`) carry their own.
pub fn parse_url(raw: &str, host_header: Option<&str>, encrypted: bool) -> RequestUrl {
    let (scheme, authority, path_and_query) = split_absolute_form(raw);

    let protocol = match scheme {
        Some(scheme) => format!("{}:", scheme.to_ascii_lowercase()),
        None if encrypted => "https:".to_string(),
        None => "http:".to_string(),
    };

    let host = authority
        .filter(|a| !a.is_empty())
        .or(host_header)
        .filter(|h| !h.is_empty());
    let (hostname, port) = match host {
        Some(host) => {
            let (name, port) = split_host_port(host);
            (Some(name.to_string()), port.map(str::to_string))
        }
        None => (None, None),
    };

    let (pathname, search) = match path_and_query.find('?') {
        Some(idx) => (&path_and_query[..idx], Some(path_and_query[idx..].to_string())),
        None => (path_and_query, None),
    };

    let full = host.map(|host| format!("{}//{}{}", protocol, host, path_and_query));

    RequestUrl {
        raw: raw.to_string(),
        protocol,
        hostname,
        port,
        pathname: pathname.to_string(),
        search,
        full,
    }
}

fn split_absolute_form(raw: &str) -> (Option<&str>, Option<&str>, &str) {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return (None, None, raw);
    };
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
        return (None, None, raw);
    }

    let end = rest.find(|c: char| c == '/' || c == '?').unwrap_or(rest.len());
    let authority = &rest[..end];
    // Drop userinfo.
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    (Some(scheme), Some(authority), &rest[end..])
}

fn split_host_port(host: &str) -> (&str, Option<&str>) {
    if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        return match rest.split_once(']') {
            Some((addr, tail)) => (addr, tail.strip_prefix(':').filter(|p| !p.is_empty())),
            None => (host, None),
        };
    }

    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => (name, Some(port)),
        _ => (host, None),
    }
}
