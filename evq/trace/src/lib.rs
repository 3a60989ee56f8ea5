#![no_std]

//! # evq Trace
//!
//! Binary software tracing for the evq event queue.
//!
//! Records are collected in a global ring buffer protected by a
//! `critical_section` mutex, so they can be emitted from interrupt context.
//! Each record carries a sequence number and the queue tick as timestamp,
//! and is written as an HDLC frame with byte-stuffing and a checksum.
//! A host drains the stream with [`read`] and decodes it with
//! [`hdlc::Decoder`].
//!
//! Every maskable record type is disabled until enabled through
//! [`global_filter`] or [`global_filter_mask`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use evq_trace::{filters, RecordType};
//!
//! evq_trace::init();
//! evq_trace::global_filter_mask(filters::FIRE_RECORDS);
//!
//! evq_trace::emit(RecordType::Fire, 100, |rec| {
//!     rec.u32(0x0001_0000);
//!     rec.u32(100);
//! });
//!
//! let mut out = [0u8; 64];
//! let n = evq_trace::read(&mut out);
//! assert!(n > 0);
//! ```

mod buffer;
pub mod hdlc;
mod types;

pub use buffer::{TraceBuffer, MAX_RECORD_DATA};
pub use types::{filters, RecordType};

use core::cell::RefCell;

use critical_section::Mutex;

/// Size of the global trace ring buffer
pub const TRACE_BUFFER_SIZE: usize = 1024;

static TRACE_BUF: Mutex<RefCell<TraceBuffer<TRACE_BUFFER_SIZE>>> =
    Mutex::new(RefCell::new(TraceBuffer::new()));

/// Trace crate version, reported in the target info record
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reset the trace buffer and disable every maskable record
pub fn init() {
    critical_section::with(|cs| {
        TRACE_BUF.borrow_ref_mut(cs).init();
    });
}

/// Set global filter for a record type
pub fn global_filter(record_type: RecordType, enable: bool) {
    critical_section::with(|cs| {
        TRACE_BUF
            .borrow_ref_mut(cs)
            .set_global_filter(record_type, enable);
    });
}

/// Set global filter mask directly
pub fn global_filter_mask(mask: u32) {
    critical_section::with(|cs| {
        TRACE_BUF.borrow_ref_mut(cs).set_global_filter_mask(mask);
    });
}

/// Check if a record type currently passes the filter
pub fn is_enabled(record_type: RecordType) -> bool {
    record_type.is_non_maskable()
        || critical_section::with(|cs| {
            TRACE_BUF.borrow_ref(cs).global_filter() & record_type.mask() != 0
        })
}

/// Payload writer handed to [`emit`]
pub struct Record<'a, const N: usize> {
    buf: &'a mut TraceBuffer<N>,
}

impl<const N: usize> Record<'_, N> {
    /// Output u8
    pub fn u8(&mut self, value: u8) {
        self.buf.u8(value);
    }

    /// Output u32
    pub fn u32(&mut self, value: u32) {
        self.buf.u32(value);
    }
}

/// Emit one complete record inside a single critical section
///
/// `fill` is only called when the record passes the filter.
pub fn emit<F>(record_type: RecordType, timestamp: u32, fill: F)
where
    F: FnOnce(&mut Record<'_, TRACE_BUFFER_SIZE>),
{
    critical_section::with(|cs| {
        let mut buf = TRACE_BUF.borrow_ref_mut(cs);
        if buf.begin(record_type, timestamp) {
            fill(&mut Record { buf: &mut *buf });
            buf.end();
        }
    });
}

/// Read trace data from buffer
/// Returns the number of bytes read
pub fn read(buf: &mut [u8]) -> usize {
    critical_section::with(|cs| TRACE_BUF.borrow_ref_mut(cs).read(buf))
}

/// Get number of bytes available to read from the trace buffer
pub fn available() -> usize {
    critical_section::with(|cs| TRACE_BUF.borrow_ref(cs).available())
}

/// Number of frames lost because the buffer was full
pub fn dropped() -> u32 {
    critical_section::with(|cs| TRACE_BUF.borrow_ref(cs).dropped())
}

/// Emit the non-maskable target description record
///
/// Should be called once during initialization so the host can check the
/// version and the sizes used in the stream.
pub fn target_info(target_name: &str) {
    critical_section::with(|cs| {
        TRACE_BUF
            .borrow_ref_mut(cs)
            .target_info_record(VERSION, target_name);
    });
}
