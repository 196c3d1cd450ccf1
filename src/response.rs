use crate::config::EventKind;
use crate::headers::{self, Headers};
use crate::record::HttpResponseContext;

/// Read-only view over a live outgoing response.
///
/// Every accessor reports the state at the moment it is called; nothing is
/// buffered or corrected afterwards.
pub trait ResponseView {
    fn status_code(&self) -> u16;
    /// Headers flushed to the wire so far (or staged, if none were sent yet).
    fn headers(&self) -> Headers;
    fn headers_sent(&self) -> bool;
    fn finished(&self) -> bool;
}

/// Plain owned response state.
#[derive(Debug, Clone, Default)]
pub struct ResponseSnapshot {
    pub status_code: u16,
    pub headers: Headers,
    pub headers_sent: bool,
    pub finished: bool,
}

impl ResponseSnapshot {
    /// Build a snapshot from the raw header block written to the socket.
    pub fn from_raw_headers(status_code: u16, block: &str, finished: bool) -> Self {
        ResponseSnapshot {
            status_code,
            headers: headers::from_raw_block(block),
            headers_sent: true,
            finished,
        }
    }
}

impl ResponseView for ResponseSnapshot {
    fn status_code(&self) -> u16 {
        self.status_code
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn finished(&self) -> bool {
        self.finished
    }
}

/// Snapshot `res` for an error or a transaction report.
///
/// Errors record how far the response got (`headers_sent`, `finished`);
/// transactions only carry the status and headers.
pub fn response_context<R>(res: &R, kind: EventKind) -> HttpResponseContext
where
    R: ResponseView + ?Sized,
{
    let mut context = HttpResponseContext {
        status_code: res.status_code(),
        headers: res.headers(),
        headers_sent: None,
        finished: None,
    };

    if kind == EventKind::Error {
        context.headers_sent = Some(res.headers_sent());
        context.finished = Some(res.finished());
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    /// Response that moves through its lifecycle like a real server response.
    #[derive(Default)]
    struct LiveResponse {
        state: RefCell<ResponseSnapshot>,
    }

    impl LiveResponse {
        fn write_head(&self, status: u16, block: &str) {
            let mut state = self.state.borrow_mut();
            *state = ResponseSnapshot::from_raw_headers(status, block, false);
        }

        fn end(&self) {
            self.state.borrow_mut().finished = true;
        }
    }

    impl ResponseView for LiveResponse {
        fn status_code(&self) -> u16 {
            self.state.borrow().status_code
        }

        fn headers(&self) -> Headers {
            self.state.borrow().headers.clone()
        }

        fn headers_sent(&self) -> bool {
            self.state.borrow().headers_sent
        }

        fn finished(&self) -> bool {
            self.state.borrow().finished
        }
    }

    #[test]
    fn error_mode_tracks_lifecycle() {
        let res = LiveResponse::default();
        res.state.borrow_mut().status_code = 200;

        let before = response_context(&res, EventKind::Error);
        assert_eq!(before.headers_sent, Some(false));
        assert_eq!(before.finished, Some(false));

        res.write_head(201, "HTTP/1.1 201 Created\r\nContent-Type: text/plain\r\n\r\n");
        let partial = response_context(&res, EventKind::Error);
        assert_eq!(partial.status_code, 201);
        assert_eq!(partial.headers_sent, Some(true));
        assert_eq!(partial.finished, Some(false));
        assert_eq!(headers::get(&partial.headers, "content-type"), Some("text/plain"));

        res.end();
        let done = response_context(&res, EventKind::Error);
        assert_eq!(done.headers_sent, Some(true));
        assert_eq!(done.finished, Some(true));

        // Earlier snapshots are not touched by later progress.
        assert_eq!(before.headers_sent, Some(false));
    }

    #[test]
    fn transaction_mode_omits_lifecycle_flags() {
        let res = ResponseSnapshot {
            status_code: 404,
            headers: headers::from_pairs([("content-length", "0")]),
            headers_sent: true,
            finished: true,
        };

        let ctx = response_context(&res, EventKind::Transaction);
        assert_eq!(
            serde_json::to_value(&ctx).unwrap(),
            json!({ "status_code": 404, "headers": { "content-length": "0" } })
        );
    }
}
