//! Event normalization core of a monitoring agent.
//!
//! Turns raw runtime values into compact, size-bounded payloads:
//!
//! - [`message::parse_message`]: log inputs into `{ log: ... }` records;
//! - [`request::request_context`]: live requests into request contexts,
//!   applying the body capture policy;
//! - [`response::response_context`]: live responses into error or
//!   transaction response contexts;
//! - [`exception::parse_error`]: exceptions into `{ culprit, exception }`
//!   records, resolving stacks asynchronously.
//!
//! Every normalizer is a stateless transform that never fails; malformed
//! input degrades to omitted or placeholder fields. Shipping the output is
//! left to a [`sink::PayloadSink`].

pub mod record;
pub mod headers;
pub mod body;
pub mod inspect;
pub mod message;
pub mod request;
pub mod response;
pub mod stack;
pub mod exception;

pub mod config;
pub mod env;
pub mod sink;
pub mod noop_sink;

pub use body::{MAX_HTTP_BODY_CHARS, REDACTED};
pub use config::{CaptureBody, EventKind, NormalizeConfig};
pub use exception::{parse_error, RawException};
pub use message::{parse_message, LogInput};
pub use record::{ErrorPayload, EventPayload, HttpRequestContext, HttpResponseContext, LogPayload};
pub use request::{request_context, RequestView};
pub use response::{response_context, ResponseView};
pub use stack::StackTrace;
