//! Record emission through the global trace buffer.
//!
//! The buffer is global, so everything runs in one test.

use evq_trace::hdlc::{Decoder, Frame};
use evq_trace::{filters, RecordType, MAX_RECORD_DATA};

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

#[test]
fn test_emit_writes_whole_records() {
    evq_trace::init();

    // Filtered out: the payload writer never runs
    evq_trace::emit(RecordType::Fire, 1, |_| panic!("filtered record filled"));
    assert_eq!(evq_trace::available(), 0);

    evq_trace::global_filter_mask(filters::ALL_RECORDS);
    evq_trace::emit(RecordType::Fire, 7, |rec| {
        rec.u32(0x0002_0001);
        rec.u8(0x7E);
    });

    let frames = drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].record_type, RecordType::Fire as u8);
    assert_eq!(frames[0].timestamp, 7);
    assert_eq!(frames[0].data.as_slice(), &[0x01, 0x00, 0x02, 0x00, 0x7E]);

    // Too long for one record: dropped whole, never cut short
    evq_trace::emit(RecordType::Post, 8, |rec| {
        for n in 0..=MAX_RECORD_DATA as u32 / 4 {
            rec.u32(n);
        }
    });
    assert_eq!(evq_trace::available(), 0);
    assert_eq!(evq_trace::dropped(), 1);

    evq_trace::emit(RecordType::Post, 9, |rec| rec.u8(1));
    let frames = drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].timestamp, 9);
    assert_eq!(evq_trace::dropped(), 1);
}
