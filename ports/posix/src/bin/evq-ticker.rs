//! Demo: a heartbeat and a few one-shot timers on a wall-clock queue.
//!
//! Runs until Ctrl-C. Log output is controlled with `RUST_LOG`, for
//! example `RUST_LOG=debug evq-ticker`. With the `trace` feature and
//! `EVQ_TRACE_UDP=host:port` set, the binary trace stream is sent to that
//! address once per second.

use evq_posix::{PosixRuntime, TickRate};
use evq_queue::{Callback, QueueConfig};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

const QUEUE_DEPTH: usize = 16;

fn announce(label: &'static str, at_ms: u32) {
    info!("one-shot {} after {} ms", label, at_ms);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = QueueConfig::builder().name("ticker").build();
    let runtime: PosixRuntime<QUEUE_DEPTH> = PosixRuntime::new(TickRate::DEFAULT, config);
    if let Err(err) = runtime.break_on_ctrlc() {
        warn!("cannot install Ctrl-C handler: {}", err);
    }

    let queue = runtime.queue();
    let rate = runtime.rate();

    let mut beats = 0u32;
    let heartbeat = queue.post_every(rate.millis(500), move || {
        beats += 1;
        info!("heartbeat {}", beats);
    });
    if let Err(err) = heartbeat {
        warn!("heartbeat not scheduled: {}", err);
        return;
    }

    for (label, at_ms) in [("first", 250u32), ("second", 1_250), ("third", 3_000)] {
        let posted = Callback::from_fn2(Some(announce as fn(&'static str, u32)), label, at_ms)
            .and_then(|callback| queue.post_callback(rate.millis(at_ms), None, callback));
        if let Err(err) = posted {
            warn!("one-shot {} not scheduled: {}", label, err);
        }
    }

    start_trace_uplink(&runtime);

    runtime.run();
    info!("{} events still pending", queue.len());
}

#[cfg(feature = "trace")]
fn start_trace_uplink(runtime: &PosixRuntime<QUEUE_DEPTH>) {
    let Ok(addr) = std::env::var("EVQ_TRACE_UDP") else {
        return;
    };
    let sink = match evq_posix::trace::UdpSink::connect(addr.as_str()) {
        Ok(sink) => sink,
        Err(err) => {
            warn!("trace uplink to {} failed: {}", addr, err);
            return;
        }
    };

    evq_posix::trace::enable(evq_trace::filters::ALL_RECORDS, "evq-ticker");
    let queue = runtime.queue();
    let flushed = queue.post_every(runtime.rate().millis(1_000), move || {
        if let Err(err) = sink.flush() {
            warn!("trace flush failed: {}", err);
        }
    });
    match flushed {
        Ok(_) => info!("tracing to {}", addr),
        Err(err) => warn!("trace flush not scheduled: {}", err),
    }
}

#[cfg(not(feature = "trace"))]
fn start_trace_uplink(_runtime: &PosixRuntime<QUEUE_DEPTH>) {}
