use std::sync::Arc;
use std::time::Instant;

use apm_event_core::message::{parse_message, LogInput};
use apm_event_core::noop_sink::NoopSink;
use apm_event_core::request::{request_context, RequestSnapshot};
use apm_event_core::sink::PayloadSink;
use apm_event_core::{CaptureBody, EventKind, EventPayload, NormalizeConfig};
use serde_json::json;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = NormalizeConfig::from_env().unwrap_or_else(|e| {
        eprintln!("invalid configuration, using defaults: {}", e);
        NormalizeConfig {
            capture_body: CaptureBody::All,
            ..NormalizeConfig::default()
        }
    });
    let sink = Arc::new(NoopSink::default());

    let n: u64 = 100_000;
    let request = RequestSnapshot::new("POST", "/orders?source=load")
        .header("Host", "shop.example.com")
        .structured_body(json!({ "items": [1, 2, 3], "note": "x".repeat(512) }));

    let start = Instant::now();
    for i in 0..n {
        let input = LogInput::template("order %d processed in %sms", vec![json!(i), json!("12")]);
        let payload = EventPayload::from(parse_message(input));
        if let Err(e) = sink.send(&payload).await {
            eprintln!("sink rejected payload: {}", e);
        }

        let _context = request_context(&request, config.capture_body.allows(EventKind::Transaction));
    }
    let elapsed = start.elapsed();

    println!(
        "messages: normalized {} logs + request contexts in {:?} (~{:.0} ev/s), sink saw {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        sink.received()
    );
}
