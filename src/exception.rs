use crate::config::NormalizeConfig;
use crate::record::{ErrorPayload, ExceptionRecord};
use crate::stack::{self, StackTrace};
use serde_json::{Map, Value};
use std::error::Error as StdError;
use tokio::task::JoinHandle;
use tracing::trace;

const DEFAULT_TYPE: &str = "Error";

/// Keys that describe the exception itself and never count as attributes.
const RESERVED_ATTRIBUTES: &[&str] = &["message", "stack"];

/// An exception-like value as observed by instrumentation.
///
/// Every field is optional: values thrown by foreign code are often not
/// well-formed exceptions.
#[derive(Debug, Clone, Default)]
pub struct RawException {
    pub message: Option<String>,
    /// Class or constructor name.
    pub type_name: Option<String>,
    pub code: Option<String>,
    pub uncaught: Option<bool>,
    /// Extra properties carried by the value.
    pub attributes: Map<String, Value>,
    pub stack: Option<StackTrace>,
}

impl RawException {
    /// Exception with `message` and the caller's stack.
    #[inline(never)]
    pub fn capture(message: impl Into<String>) -> Self {
        RawException {
            message: Some(message.into()),
            stack: Some(StackTrace::capture()),
            ..Default::default()
        }
    }

    /// Build from a Rust error, capturing the caller's stack.
    ///
    /// The type name is the error's unqualified type; the `source()` chain is
    /// recorded as the `causes` attribute.
    #[inline(never)]
    pub fn from_error<E>(err: &E) -> Self
    where
        E: StdError + ?Sized,
    {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(Value::String(cause.to_string()));
            source = cause.source();
        }

        let mut attributes = Map::new();
        if !causes.is_empty() {
            attributes.insert("causes".to_string(), Value::Array(causes));
        }

        RawException {
            message: Some(err.to_string()),
            type_name: Some(short_type_name::<E>()),
            attributes,
            stack: Some(StackTrace::capture()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_uncaught(mut self, uncaught: bool) -> Self {
        self.uncaught = Some(uncaught);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_stack(mut self, stack: StackTrace) -> Self {
        self.stack = Some(stack);
        self
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    // Drop generic arguments, then the module path.
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Convert an exception into an [`ErrorPayload`].
///
/// Always completes with a payload. Fields that cannot be derived are
/// left out rather than reported as errors: an unresolvable stack gives an
/// empty `stacktrace` and no `culprit`.
///
/// `call_site` is an optional stack captured by instrumentation where the
/// failing operation started; it is used only when the exception's own stack
/// yields no frames.
///
/// Resolving a captured backtrace needs a Tokio runtime with the time driver
/// enabled. Without any runtime the payload is still produced, with an empty
/// `stacktrace`.
pub async fn parse_error(
    raw: RawException,
    config: &NormalizeConfig,
    call_site: Option<&StackTrace>,
) -> ErrorPayload {
    let RawException {
        message,
        type_name,
        code,
        uncaught,
        mut attributes,
        stack,
    } = raw;

    attributes.retain(|key, _| !RESERVED_ATTRIBUTES.contains(&key.as_str()));

    let mut frames = match &stack {
        Some(stack) => stack::resolve(stack, config).await,
        None => Vec::new(),
    };

    if frames.is_empty() {
        if let Some(call_site) = call_site {
            trace!("exception stack unusable, resolving call-site stack instead");
            frames = stack::resolve(call_site, config).await;
        }
    }

    let culprit = stack::culprit(&frames);

    ErrorPayload {
        culprit,
        exception: ExceptionRecord {
            message: message.unwrap_or_default(),
            type_name: type_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_TYPE.to_string()),
            code,
            uncaught,
            attributes: (!attributes.is_empty()).then_some(attributes),
            stacktrace: frames,
        },
    }
}

/// Run [`parse_error`] on the Tokio runtime and hand back its handle, for
/// callers that cannot await on the spot.
pub fn spawn_parse_error(
    raw: RawException,
    config: NormalizeConfig,
    call_site: Option<StackTrace>,
) -> JoinHandle<ErrorPayload> {
    tokio::spawn(async move { parse_error(raw, &config, call_site.as_ref()).await })
}
