use crate::config::NormalizeConfig;
use crate::record::StackFrame;
use lazy_static::lazy_static;
use regex::Regex;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, trace};

lazy_static! {
    // `  12: crate::module::function` (native backtrace symbol line)
    static ref NATIVE_SYMBOL: Regex = Regex::new(r"^\s*\d+:\s+(?P<function>\S.*?)\s*$").unwrap();
    // `    at fn (location)` or `    at location`
    static ref CALL_SITE: Regex =
        Regex::new(r"^\s*at\s+(?:(?P<function>.+?)\s+\((?P<location>[^()]+)\)|(?P<bare>\S+))\s*$").unwrap();
    static ref LOCATION: Regex = Regex::new(r"^(?P<file>.+?):(?P<line>\d+)(?::(?P<column>\d+))?$").unwrap();
}

const ANONYMOUS: &str = "<anonymous>";

/// Source files larger than this are never read for context.
pub const MAX_SOURCE_FILE_BYTES: u64 = 1024 * 1024;

/// Locations that are valid in a runtime stack but carry no file.
const OPAQUE_LOCATIONS: &[&str] = &["native", "<anonymous>", "unknown location"];

const LIBRARY_PATH_MARKERS: &[&str] = &[
    "node_modules/",
    "/rustc/",
    "/.cargo/registry/",
    "/.cargo/git/",
    "/.rustup/toolchains/",
];

const LIBRARY_PATH_PREFIXES: &[&str] = &["node:", "internal/", "native"];

const LIBRARY_SYMBOL_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "tokio::",
    "<std::",
    "<core::",
    "<alloc::",
    "<tokio::",
    "__rust",
    "rust_begin_unwind",
    "__libc_start",
    "_start",
];

/// Frames belonging to the capture helpers themselves; stripped from the top
/// of captured backtraces.
const CAPTURE_SYMBOLS: &[&str] = &[
    concat!(module_path!(), "::StackTrace::capture"),
    concat!(env!("CARGO_CRATE_NAME"), "::exception::RawException::capture"),
    concat!(env!("CARGO_CRATE_NAME"), "::exception::RawException::from_error"),
];

/// A stack as handed over by instrumentation.
///
/// `Captured` holds a native backtrace whose symbols are resolved lazily; the
/// backtrace caches its resolution, so reading it before normalization does
/// not change the outcome. `Text` holds an already-rendered stack (or whatever
/// text replaced it).
#[derive(Debug, Clone)]
pub enum StackTrace {
    Captured(Arc<Backtrace>),
    Text(String),
}

impl StackTrace {
    /// Capture the current call stack, regardless of `RUST_BACKTRACE`.
    #[inline(never)]
    pub fn capture() -> Self {
        StackTrace::Captured(Arc::new(Backtrace::force_capture()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        StackTrace::Text(text.into())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("backtrace is not available: {0:?}")]
    NotCaptured(BacktraceStatus),

    #[error("stack resolution timed out after {0:?}")]
    Timeout(Duration),

    #[error("stack resolution worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("no Tokio runtime available for stack resolution")]
    NoRuntime,

    #[error("cannot read source file {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("source path {0} is not a regular file")]
    NotAFile(String),

    #[error("source file {path} is {size} bytes, over the {} byte limit", MAX_SOURCE_FILE_BYTES)]
    SourceTooLarge { path: String, size: u64 },
}

/// Resolve `stack` into frames, innermost first.
///
/// Never fails: an unavailable, timed-out or unparseable stack yields an empty
/// list. Source context is attached when the `source-context` feature is on.
///
/// Captured backtraces are symbolicated on the Tokio blocking pool, so they
/// need a Tokio runtime with the time driver enabled; outside any runtime they
/// resolve to an empty list and text stacks skip source context.
pub async fn resolve(stack: &StackTrace, config: &NormalizeConfig) -> Vec<StackFrame> {
    resolve_with(stack, config, |backtrace: &Backtrace| backtrace.to_string()).await
}

async fn resolve_with<R>(stack: &StackTrace, config: &NormalizeConfig, render: R) -> Vec<StackFrame>
where
    R: FnOnce(&Backtrace) -> String + Send + 'static,
{
    let timeout = config.resolve_timeout();

    let text = match materialize(stack, timeout, render).await {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "stack resolution failed, reporting empty stacktrace");
            return Vec::new();
        }
    };

    let mut frames = parse_frames(&text);
    if matches!(stack, StackTrace::Captured(_)) {
        // Backtrace machinery and our capture helpers sit on top of the
        // caller's frames.
        let prefix = frames
            .iter()
            .take_while(|f| f.library_frame || is_capture_frame(f))
            .count();
        if let Some(last) = frames[..prefix].iter().rposition(is_capture_frame) {
            frames.drain(..=last);
        }
    }
    if frames.is_empty() {
        trace!("stack contained no recognizable frames");
        return frames;
    }

    #[cfg(feature = "source-context")]
    {
        if Handle::try_current().is_ok() {
            with_source_context(&mut frames, config, timeout, load_source).await;
        } else {
            trace!("no runtime available, skipping source context");
        }
    }

    frames
}

async fn materialize<R>(stack: &StackTrace, timeout: Duration, render: R) -> Result<Cow<'_, str>, ResolveError>
where
    R: FnOnce(&Backtrace) -> String + Send + 'static,
{
    match stack {
        StackTrace::Text(text) => Ok(Cow::Borrowed(text)),
        StackTrace::Captured(backtrace) => {
            let status = backtrace.status();
            if status != BacktraceStatus::Captured {
                return Err(ResolveError::NotCaptured(status));
            }
            let handle = Handle::try_current().map_err(|_| ResolveError::NoRuntime)?;

            // Symbolication can hit the disk; keep it off the async workers.
            let backtrace = Arc::clone(backtrace);
            let worker = handle.spawn_blocking(move || render(&backtrace));
            let text = tokio::time::timeout(timeout, worker)
                .await
                .map_err(|_| ResolveError::Timeout(timeout))??;
            Ok(Cow::Owned(text))
        }
    }
}

/// Parse a rendered stack into frames.
///
/// Understands runtime call sites (`at fn (file:line:col)`) and native
/// backtraces (`N: path::to::fn` followed by `at file:line:col`). Lines that
/// are neither, such as the leading `Error: message`, are skipped.
pub fn parse_frames(text: &str) -> Vec<StackFrame> {
    let cwd = std::env::current_dir().ok();
    parse_frames_in(text, cwd.as_deref())
}

fn parse_frames_in(text: &str, cwd: Option<&Path>) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    // Native symbol waiting for its `at` line.
    let mut pending: Option<StackFrame> = None;

    for line in text.lines() {
        if let Some(caps) = NATIVE_SYMBOL.captures(line) {
            if let Some(frame) = pending.take() {
                frames.push(frame);
            }
            pending = Some(StackFrame::new(&caps["function"]));
            continue;
        }

        let Some(caps) = CALL_SITE.captures(line) else {
            continue;
        };

        match (caps.name("function"), caps.name("location"), caps.name("bare")) {
            (Some(function), Some(location), _) => {
                if let Some(frame) = pending.take() {
                    frames.push(frame);
                }
                let mut frame = StackFrame::new(function.as_str());
                if apply_location(&mut frame, location.as_str()) {
                    frames.push(frame);
                }
            }
            (_, _, Some(location)) => match pending.take() {
                Some(mut frame) => {
                    apply_location(&mut frame, location.as_str());
                    frames.push(frame);
                }
                None => {
                    let mut frame = StackFrame::new(ANONYMOUS);
                    if apply_location(&mut frame, location.as_str()) {
                        frames.push(frame);
                    }
                }
            },
            _ => {}
        }
    }

    if let Some(frame) = pending {
        frames.push(frame);
    }

    frames.into_iter().map(|frame| finish_frame(frame, cwd)).collect()
}

/// Fill the location fields; `false` if `location` is not a location at all.
fn apply_location(frame: &mut StackFrame, location: &str) -> bool {
    let location = location.strip_prefix("file://").unwrap_or(location);

    if let Some(caps) = LOCATION.captures(location) {
        frame.abs_path = Some(caps["file"].to_string());
        frame.line = caps["line"].parse().ok();
        frame.column = caps.name("column").and_then(|m| m.as_str().parse().ok());
        return true;
    }

    if OPAQUE_LOCATIONS.contains(&location) {
        frame.abs_path = Some(location.to_string());
        return true;
    }

    false
}

fn finish_frame(mut frame: StackFrame, cwd: Option<&Path>) -> StackFrame {
    if let Some(path) = &frame.abs_path {
        frame.file = Some(relative_path(path, cwd));
    }
    frame.library_frame = is_library_frame(&frame);
    frame
}

fn relative_path(path: &str, cwd: Option<&Path>) -> String {
    if let Some(stripped) = path.strip_prefix("./") {
        return stripped.to_string();
    }
    match cwd.and_then(|cwd| Path::new(path).strip_prefix(cwd).ok()) {
        Some(relative) if !relative.as_os_str().is_empty() => relative.display().to_string(),
        _ => path.to_string(),
    }
}

/// Whether a frame belongs to dependency, runtime or toolchain code.
pub fn is_library_frame(frame: &StackFrame) -> bool {
    if let Some(path) = &frame.abs_path {
        let path = path.replace('\\', "/");
        if LIBRARY_PATH_MARKERS.iter().any(|marker| path.contains(marker))
            || LIBRARY_PATH_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        {
            return true;
        }
    }

    LIBRARY_SYMBOL_PREFIXES
        .iter()
        .any(|prefix| frame.function.starts_with(prefix))
}

fn is_capture_frame(frame: &StackFrame) -> bool {
    CAPTURE_SYMBOLS
        .iter()
        .any(|symbol| frame.function.starts_with(symbol))
}

/// Label for the innermost application frame: `function (file)`.
///
/// Falls back to the innermost frame when every frame is library code;
/// `None` only for an empty stack.
pub fn culprit(frames: &[StackFrame]) -> Option<String> {
    let frame = frames
        .iter()
        .find(|frame| !frame.library_frame)
        .or_else(|| frames.first())?;

    Some(match &frame.file {
        Some(file) => format!("{} ({})", frame.function, file),
        None => frame.function.clone(),
    })
}

/// Attach source context under `timeout`; frames handled before the deadline
/// keep their context.
#[cfg(feature = "source-context")]
async fn with_source_context<L, F>(frames: &mut [StackFrame], config: &NormalizeConfig, timeout: Duration, load: L)
where
    L: Fn(String) -> F,
    F: std::future::Future<Output = Result<Vec<String>, ResolveError>>,
{
    if tokio::time::timeout(timeout, attach_source_context(frames, config, load))
        .await
        .is_err()
    {
        debug!(?timeout, "source context loading timed out, keeping partial context");
    }
}

#[cfg(feature = "source-context")]
async fn attach_source_context<L, F>(frames: &mut [StackFrame], config: &NormalizeConfig, load: L)
where
    L: Fn(String) -> F,
    F: std::future::Future<Output = Result<Vec<String>, ResolveError>>,
{
    use std::collections::HashMap;

    // Per-call cache; frames often repeat the same file.
    let mut sources: HashMap<String, Option<Arc<Vec<String>>>> = HashMap::new();

    for frame in frames.iter_mut() {
        let lines = config.source_lines(frame.library_frame);
        let (Some(path), Some(line)) = (frame.abs_path.clone(), frame.line) else {
            continue;
        };
        if lines == 0 || line == 0 {
            continue;
        }

        let source = match sources.get(&path) {
            Some(cached) => cached.clone(),
            None => {
                let loaded = match load(path.clone()).await {
                    Ok(lines) => Some(Arc::new(lines)),
                    Err(e) => {
                        debug!(error = %e, "skipping source context");
                        None
                    }
                };
                sources.insert(path, loaded.clone());
                loaded
            }
        };

        if let Some(source) = source {
            apply_context(frame, &source, line as usize, lines);
        }
    }
}

/// Read a source file, refusing anything but regular files up to
/// [`MAX_SOURCE_FILE_BYTES`].
#[cfg(feature = "source-context")]
async fn load_source(path: String) -> Result<Vec<String>, ResolveError> {
    use tokio::io::AsyncReadExt;

    let io_error = |source: std::io::Error| ResolveError::Source {
        path: path.clone(),
        source,
    };

    let metadata = tokio::fs::metadata(&path).await.map_err(io_error)?;
    if !metadata.is_file() {
        return Err(ResolveError::NotAFile(path.clone()));
    }
    if metadata.len() > MAX_SOURCE_FILE_BYTES {
        return Err(ResolveError::SourceTooLarge {
            path: path.clone(),
            size: metadata.len(),
        });
    }

    // The file may grow or be swapped after the metadata check.
    let file = tokio::fs::File::open(&path).await.map_err(io_error)?;
    let mut buf = Vec::with_capacity(usize::try_from(metadata.len()).unwrap_or(0));
    file.take(MAX_SOURCE_FILE_BYTES)
        .read_to_end(&mut buf)
        .await
        .map_err(io_error)?;

    Ok(String::from_utf8_lossy(&buf).lines().map(str::to_string).collect())
}

/// Attach `total` lines around 1-based `line`: the line itself, then the
/// remainder split before/after with the extra line going after.
#[cfg(feature = "source-context")]
fn apply_context(frame: &mut StackFrame, source: &[String], line: usize, total: usize) {
    let idx = line - 1;
    if idx >= source.len() {
        return;
    }

    let before = (total - 1) / 2;
    let after = total - 1 - before;
    let start = idx.saturating_sub(before);
    let end = (idx + 1 + after).min(source.len());

    frame.pre_context = Some(source[start..idx].to_vec());
    frame.context_line = Some(source[idx].clone());
    frame.post_context = Some(source[idx + 1..end].to_vec());
}
