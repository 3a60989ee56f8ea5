//! Binary trace output of queue operations.
//!
//! The trace buffer is global, so everything runs in one test.

#![cfg(feature = "trace")]

use evq_queue::{EventId, EventQueue, EvqError, ManualClock, QueueConfig};
use evq_trace::hdlc::{Decoder, Frame};
use evq_trace::{filters, RecordType};

fn drain() -> Vec<Frame<64>> {
    let mut raw = [0u8; evq_trace::TRACE_BUFFER_SIZE];
    let n = evq_trace::read(&mut raw);

    let mut decoder: Decoder<64> = Decoder::new();
    raw[..n]
        .iter()
        .filter_map(|&byte| decoder.push(byte))
        .map(|frame| frame.expect("frame decodes"))
        .collect()
}

fn kinds(frames: &[Frame<64>]) -> Vec<RecordType> {
    frames
        .iter()
        .map(|frame| RecordType::from_raw(frame.record_type).expect("known record type"))
        .collect()
}

fn word(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[test]
fn test_queue_trace_stream() {
    evq_trace::init();
    let queue: EventQueue<ManualClock, 4> = EventQueue::new(ManualClock::new(), QueueConfig::DEFAULT);

    // Disabled by default
    queue.post(|| {}).unwrap();
    assert_eq!(queue.dispatch_once(), 1);
    assert_eq!(evq_trace::available(), 0);

    evq_trace::global_filter_mask(filters::ALL_RECORDS);

    let id = queue.post_in(10, || {}).unwrap();
    assert!(!queue.cancel(EventId::NONE));
    assert_eq!(queue.post_every(0, || {}), Err(EvqError::InvalidPeriod));
    assert_eq!(queue.dispatch(10), 1);

    let frames = drain();
    assert_eq!(
        kinds(&frames),
        vec![
            RecordType::Post,
            RecordType::CancelAttempt,
            RecordType::PostAttempt,
            RecordType::DispatchBegin,
            RecordType::Fire,
            RecordType::DispatchEnd,
        ]
    );
    for pair in frames.windows(2) {
        assert_eq!(pair[1].seq, pair[0].seq.wrapping_add(1));
    }

    let post = &frames[0];
    assert_eq!(post.timestamp, 0);
    assert_eq!(word(&post.data, 0), id.raw());
    assert_eq!(word(&post.data, 4), 10);
    assert_eq!(word(&post.data, 8), 0);

    assert_eq!(frames[2].data.as_slice(), &[EvqError::InvalidPeriod.code()]);
    assert_eq!(word(&frames[3].data, 0), 10);

    let fire = &frames[4];
    assert_eq!(fire.timestamp, 10);
    assert_eq!(word(&fire.data, 0), id.raw());
    assert_eq!(word(&fire.data, 4), 10);

    // Only firing records pass a narrower filter
    evq_trace::global_filter_mask(filters::FIRE_RECORDS);
    let periodic = queue.post_every(5, || {}).unwrap();
    assert_eq!(queue.dispatch(10), 2);
    assert!(queue.cancel(periodic));

    let frames = drain();
    assert_eq!(
        kinds(&frames),
        vec![RecordType::Fire, RecordType::Rearm, RecordType::Fire, RecordType::Rearm]
    );
    assert_eq!(frames[1].timestamp, 15);
    assert_eq!(word(&frames[1].data, 4), 20);

    // Target info is never filtered out
    evq_trace::global_filter_mask(0);
    evq_trace::target_info("host");
    assert_eq!(kinds(&drain()), vec![RecordType::TargetInfo]);
    assert_eq!(evq_trace::dropped(), 0);
}
