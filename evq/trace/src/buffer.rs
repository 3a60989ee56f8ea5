//! Trace buffer management
//!
//! Handles trace data buffering, HDLC framing, and output.

use crate::hdlc;
use crate::types::RecordType;

/// Largest payload a single record may carry
pub const MAX_RECORD_DATA: usize = 64;

// seq + type + timestamp + data + checksum, each possibly stuffed, + flag
const MAX_FRAME: usize = 2 * (2 + 4 + MAX_RECORD_DATA + 1) + 1;

/// Ring buffer collecting framed trace records
pub struct TraceBuffer<const N: usize> {
    /// Ring buffer storage
    data: [u8; N],
    /// Write index (head)
    head: usize,
    /// Read index (tail)
    tail: usize,
    /// Number of bytes in buffer
    used: usize,
    /// Sequence number for HDLC frames
    sequence: u8,
    /// Current record being built
    current_record: Option<RecordBuilder>,
    /// Global filter (one bit per record type)
    global_filter: u32,
    /// Frames discarded because the ring was full or the payload too long
    dropped: u32,
}

struct RecordBuilder {
    record_type: RecordType,
    timestamp: u32,
    data: heapless::Vec<u8, MAX_RECORD_DATA>,
    oversized: bool,
}

impl RecordBuilder {
    fn extend(&mut self, bytes: &[u8]) {
        if self.oversized || self.data.extend_from_slice(bytes).is_err() {
            self.oversized = true;
        }
    }
}

impl<const N: usize> TraceBuffer<N> {
    /// Create new trace buffer with every maskable record disabled
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            head: 0,
            tail: 0,
            used: 0,
            sequence: 0,
            current_record: None,
            global_filter: 0,
            dropped: 0,
        }
    }

    /// Discard buffered data and reset filters and counters
    pub fn init(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.used = 0;
        self.sequence = 0;
        self.current_record = None;
        self.global_filter = 0;
        self.dropped = 0;
    }

    /// Enable or disable one record type
    pub fn set_global_filter(&mut self, record_type: RecordType, enable: bool) {
        if enable {
            self.global_filter |= record_type.mask();
        } else {
            self.global_filter &= !record_type.mask();
        }
    }

    /// Set global filter mask directly
    pub fn set_global_filter_mask(&mut self, mask: u32) {
        self.global_filter = mask;
    }

    /// Current global filter mask
    pub fn global_filter(&self) -> u32 {
        self.global_filter
    }

    fn passes_filter(&self, record_type: RecordType) -> bool {
        record_type.is_non_maskable() || self.global_filter & record_type.mask() != 0
    }

    /// Begin a trace record
    ///
    /// Returns `false` when the record is filtered out; payload writes are
    /// then ignored until the next `begin`.
    pub fn begin(&mut self, record_type: RecordType, timestamp: u32) -> bool {
        if !self.passes_filter(record_type) {
            self.current_record = None;
            return false;
        }

        if self.current_record.is_some() {
            self.end();
        }

        self.current_record = Some(RecordBuilder {
            record_type,
            timestamp,
            data: heapless::Vec::new(),
            oversized: false,
        });
        true
    }

    /// End current trace record and commit to buffer
    pub fn end(&mut self) {
        if let Some(record) = self.current_record.take() {
            self.commit_record(record);
        }
    }

    fn commit_record(&mut self, record: RecordBuilder) {
        // A cut payload would mislead the decoder
        if record.oversized {
            self.dropped = self.dropped.wrapping_add(1);
            return;
        }

        let ts_bytes = record.timestamp.to_le_bytes();

        // ~(sequence + record_type + sum(timestamp + data))
        let checksum = ![self.sequence, record.record_type as u8]
            .iter()
            .chain(ts_bytes.iter())
            .chain(record.data.iter())
            .fold(0u8, |sum, &byte| sum.wrapping_add(byte));

        let mut frame = heapless::Vec::<u8, MAX_FRAME>::new();
        hdlc::stuff(&mut frame, self.sequence);
        hdlc::stuff(&mut frame, record.record_type as u8);
        for &byte in ts_bytes.iter().chain(record.data.iter()) {
            hdlc::stuff(&mut frame, byte);
        }
        hdlc::stuff(&mut frame, checksum);
        let _ = frame.push(hdlc::FLAG);

        // A partial frame would desynchronize the reader
        if N - self.used < frame.len() {
            self.dropped = self.dropped.wrapping_add(1);
            return;
        }

        for &byte in &frame {
            self.data[self.head] = byte;
            self.head = (self.head + 1) % N;
            self.used += 1;
        }
        self.sequence = self.sequence.wrapping_add(1);
    }

    /// Read available bytes from buffer
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() && self.used > 0 {
            buf[n] = self.data[self.tail];
            self.tail = (self.tail + 1) % N;
            self.used -= 1;
            n += 1;
        }
        n
    }

    /// Get number of bytes available to read
    pub fn available(&self) -> usize {
        self.used
    }

    /// Number of frames lost to a full buffer or an oversized payload
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Add u8 to current record
    pub fn u8(&mut self, value: u8) {
        if let Some(ref mut record) = self.current_record {
            record.extend(&[value]);
        }
    }

    /// Add u16 to current record
    pub fn u16(&mut self, value: u16) {
        if let Some(ref mut record) = self.current_record {
            record.extend(&value.to_le_bytes());
        }
    }

    /// Add u32 to current record
    pub fn u32(&mut self, value: u32) {
        if let Some(ref mut record) = self.current_record {
            record.extend(&value.to_le_bytes());
        }
    }

    /// Add string to current record (zero-terminated)
    ///
    /// A record whose payload outgrows [`MAX_RECORD_DATA`] is dropped
    /// whole when it ends.
    pub fn str(&mut self, value: &str) {
        if let Some(ref mut record) = self.current_record {
            record.extend(value.as_bytes());
            record.extend(&[0]);
        }
    }

    /// Generate the non-maskable target description record
    ///
    /// Contains: version, endianness, tick/id/pointer sizes, target name
    pub fn target_info_record(&mut self, version: &str, target_name: &str) {
        let endianness = if cfg!(target_endian = "big") { 1 } else { 0 };

        self.begin(RecordType::TargetInfo, 0);
        self.str(version);
        self.u8(endianness);
        self.u8(core::mem::size_of::<u32>() as u8);
        self.u8(core::mem::size_of::<u32>() as u8);
        self.u8(core::mem::size_of::<usize>() as u8);
        self.str(target_name);
        self.end();
    }
}

impl<const N: usize> Default for TraceBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
