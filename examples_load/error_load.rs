use std::sync::Arc;
use std::time::Instant;

use apm_event_core::exception::{parse_error, RawException};
use apm_event_core::noop_sink::NoopSink;
use apm_event_core::sink::PayloadSink;
use apm_event_core::{EventPayload, NormalizeConfig};
use tokio::task::JoinSet;

#[inline(never)]
fn failing_handler(i: u64) -> RawException {
    RawException::capture(format!("handler {} failed", i)).with_code("E_LOAD")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Arc::new(NormalizeConfig::default());
    let sink = Arc::new(NoopSink::default());

    let n: u64 = 2_000;
    let start = Instant::now();

    let mut tasks = JoinSet::new();
    for i in 0..n {
        let config = Arc::clone(&config);
        let sink = Arc::clone(&sink);
        let raw = failing_handler(i);
        tasks.spawn(async move {
            let payload = EventPayload::from(parse_error(raw, &config, None).await);
            if let Err(e) = sink.send(&payload).await {
                eprintln!("sink rejected payload: {}", e);
            }
        });
    }
    while tasks.join_next().await.is_some() {}

    let elapsed = start.elapsed();
    println!(
        "errors: normalized {} exceptions in {:?} (~{:.0} ev/s), sink saw {}",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        sink.received()
    );
}
