//! Binary trace hooks
//!
//! Every hook compiles to nothing unless the `trace` feature is enabled.
//! Timestamps are the queue tick at which the record was produced.

#![cfg_attr(not(feature = "trace"), allow(unused_variables))]

use evq_core::{Duration, EventId, EvqError, Tick, Timeout};

#[cfg(feature = "trace")]
use evq_trace::{emit, RecordType};

pub(crate) fn post(now: Tick, id: EventId, deadline: Tick, period: Option<Duration>) {
    #[cfg(feature = "trace")]
    emit(RecordType::Post, now.raw(), |rec| {
        rec.u32(id.raw());
        rec.u32(deadline.raw());
        rec.u32(period.map_or(0, |period| period.ticks()));
    });
}

pub(crate) fn post_attempt(now: Tick, error: EvqError) {
    #[cfg(feature = "trace")]
    emit(RecordType::PostAttempt, now.raw(), |rec| rec.u8(error.code()));
}

pub(crate) fn cancel(now: Tick, id: EventId) {
    #[cfg(feature = "trace")]
    emit(RecordType::Cancel, now.raw(), |rec| rec.u32(id.raw()));
}

pub(crate) fn cancel_attempt(now: Tick, id: EventId) {
    #[cfg(feature = "trace")]
    emit(RecordType::CancelAttempt, now.raw(), |rec| rec.u32(id.raw()));
}

pub(crate) fn fire(now: Tick, id: EventId, deadline: Tick) {
    #[cfg(feature = "trace")]
    emit(RecordType::Fire, now.raw(), |rec| {
        rec.u32(id.raw());
        rec.u32(deadline.raw());
    });
}

pub(crate) fn rearm(now: Tick, id: EventId, deadline: Tick) {
    #[cfg(feature = "trace")]
    emit(RecordType::Rearm, now.raw(), |rec| {
        rec.u32(id.raw());
        rec.u32(deadline.raw());
    });
}

pub(crate) fn dispatch_begin(now: Tick, timeout: Timeout) {
    #[cfg(feature = "trace")]
    emit(RecordType::DispatchBegin, now.raw(), |rec| {
        rec.u32(match timeout {
            Timeout::Ticks(ticks) => ticks,
            Timeout::Forever => u32::MAX,
        })
    });
}

pub(crate) fn dispatch_end(now: Tick, fired: usize) {
    #[cfg(feature = "trace")]
    emit(RecordType::DispatchEnd, now.raw(), |rec| rec.u32(fired as u32));
}

pub(crate) fn brk(now: Tick) {
    #[cfg(feature = "trace")]
    emit(RecordType::Break, now.raw(), |_| {});
}
