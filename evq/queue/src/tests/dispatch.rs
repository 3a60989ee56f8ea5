use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use evq_core::{ClockSource, Duration, EventId, ManualClock, Tick, Timeout};
use evq_mem::Callback;

use crate::config::{Overrun, QueueConfig};
use crate::lifecycle::EventQueue;

fn counter(hits: &Arc<AtomicUsize>) -> impl FnMut() + Send + 'static {
    let hits = Arc::clone(hits);
    move || {
        hits.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_immediate_pass_runs_only_due_events() {
    let hits = Arc::new(AtomicUsize::new(0));
    let queue: EventQueue<ManualClock, 4> = EventQueue::new(ManualClock::new(), QueueConfig::DEFAULT);

    queue.post(counter(&hits)).unwrap();
    let later = queue.post_in(10, counter(&hits)).unwrap();

    assert_eq!(queue.dispatch_once(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(queue.now(), Tick::ZERO);
    assert_eq!(queue.time_left(later), Some(Duration::from_ticks(10)));
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_timeout_bounds_the_pass() {
    let clock = ManualClock::new();
    let queue: EventQueue<&ManualClock, 4> = EventQueue::new(&clock, QueueConfig::DEFAULT);
    let id = queue.post_in(50, || {}).unwrap();

    assert_eq!(queue.dispatch(20), 0);
    assert_eq!(clock.now(), Tick::new(20));
    assert_eq!(queue.time_left(id), Some(Duration::from_ticks(30)));

    assert_eq!(queue.dispatch(30), 1);
    assert_eq!(queue.time_left(id), None);
    assert_eq!(clock.alarm(), None);
}

static REPOST_QUEUE: EventQueue<ManualClock, 2> = EventQueue::new(ManualClock::new(), QueueConfig::DEFAULT);
static REPOSTS: AtomicUsize = AtomicUsize::new(0);

fn repost() {
    REPOSTS.fetch_add(1, Ordering::SeqCst);
    let callback = Callback::from_fn(Some(repost as fn())).unwrap();
    REPOST_QUEUE
        .post_callback(Duration::ZERO, None, callback)
        .unwrap();
}

#[test]
fn test_zero_delay_repost_runs_once_per_pass() {
    repost();
    assert_eq!(REPOSTS.load(Ordering::SeqCst), 1);

    assert_eq!(REPOST_QUEUE.dispatch_once(), 1);
    assert_eq!(REPOSTS.load(Ordering::SeqCst), 2);

    assert_eq!(REPOST_QUEUE.dispatch_once(), 1);
    assert_eq!(REPOSTS.load(Ordering::SeqCst), 3);
    assert_eq!(REPOST_QUEUE.len(), 1);
}

static NESTED_QUEUE: EventQueue<ManualClock, 2> = EventQueue::new(ManualClock::new(), QueueConfig::DEFAULT);
static NESTED_RESULT: AtomicUsize = AtomicUsize::new(usize::MAX);

#[test]
fn test_nested_dispatch_returns_immediately() {
    NESTED_QUEUE.post(|| {}).unwrap();
    NESTED_QUEUE
        .post(|| NESTED_RESULT.store(NESTED_QUEUE.dispatch_once(), Ordering::SeqCst))
        .unwrap();

    assert_eq!(NESTED_QUEUE.dispatch_once(), 2);
    assert_eq!(NESTED_RESULT.load(Ordering::SeqCst), 0);
}

static BREAK_QUEUE: EventQueue<ManualClock, 4> = EventQueue::new(ManualClock::new(), QueueConfig::DEFAULT);

#[test]
fn test_break_from_callback_ends_forever_pass() {
    let hits = Arc::new(AtomicUsize::new(0));
    BREAK_QUEUE.post_every(10, counter(&hits)).unwrap();
    BREAK_QUEUE.post_in(35, || BREAK_QUEUE.break_dispatch()).unwrap();

    assert_eq!(BREAK_QUEUE.dispatch_forever(), 4);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(BREAK_QUEUE.now(), Tick::new(35));

    // Breaking does not cancel anything
    assert_eq!(BREAK_QUEUE.len(), 1);
}

#[test]
fn test_break_request_is_sticky() {
    let queue: EventQueue<ManualClock, 2> = EventQueue::new(ManualClock::new(), QueueConfig::DEFAULT);
    queue.post(|| {}).unwrap();

    queue.break_dispatch();
    assert_eq!(queue.dispatch(Timeout::Forever), 0);
    assert_eq!(queue.len(), 1);

    assert_eq!(queue.dispatch_once(), 1);
}

static SELF_CANCEL_QUEUE: EventQueue<ManualClock, 2> =
    EventQueue::new(ManualClock::new(), QueueConfig::DEFAULT);
static SELF_ID: AtomicU32 = AtomicU32::new(0);
static SELF_FIRES: AtomicUsize = AtomicUsize::new(0);
static SELF_CANCELLED: AtomicBool = AtomicBool::new(false);
static SELF_TIME_LEFT_ZERO: AtomicBool = AtomicBool::new(false);

fn cancel_self() {
    let id = EventId::from_raw(SELF_ID.load(Ordering::SeqCst));
    SELF_FIRES.fetch_add(1, Ordering::SeqCst);
    SELF_TIME_LEFT_ZERO.store(
        SELF_CANCEL_QUEUE.time_left(id) == Some(Duration::ZERO),
        Ordering::SeqCst,
    );
    SELF_CANCELLED.store(SELF_CANCEL_QUEUE.cancel(id), Ordering::SeqCst);
}

#[test]
fn test_periodic_event_cancelled_while_running_is_not_rearmed() {
    let callback = Callback::from_fn(Some(cancel_self as fn())).unwrap();
    let id = SELF_CANCEL_QUEUE
        .post_callback(10, Some(Duration::from_ticks(10)), callback)
        .unwrap();
    SELF_ID.store(id.raw(), Ordering::SeqCst);

    assert_eq!(SELF_CANCEL_QUEUE.dispatch(100), 1);
    assert_eq!(SELF_FIRES.load(Ordering::SeqCst), 1);
    assert!(SELF_CANCELLED.load(Ordering::SeqCst));
    assert!(SELF_TIME_LEFT_ZERO.load(Ordering::SeqCst));
    assert!(SELF_CANCEL_QUEUE.is_empty());
    assert_eq!(SELF_CANCEL_QUEUE.time_left(id), None);
}

static IDLE_CALLS: AtomicUsize = AtomicUsize::new(0);

fn count_idle() {
    IDLE_CALLS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_idle_hook_runs_before_sleeping() {
    let config = QueueConfig::builder().name("idle").idle_callback(count_idle).build();
    let queue: EventQueue<ManualClock, 2> = EventQueue::new(ManualClock::new(), config);
    queue.post_in(10, || {}).unwrap();

    assert_eq!(queue.dispatch(10), 1);
    assert_eq!(IDLE_CALLS.load(Ordering::SeqCst), 1);

    // An immediate pass never sleeps
    queue.post(|| {}).unwrap();
    assert_eq!(queue.dispatch_once(), 1);
    assert_eq!(IDLE_CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_catch_up_fires_each_missed_period() {
    let clock = ManualClock::new();
    let config = QueueConfig::builder().overrun(Overrun::CatchUp).build();
    let queue: EventQueue<&ManualClock, 2> = EventQueue::new(&clock, config);
    let hits = Arc::new(AtomicUsize::new(0));
    let id = queue.post_every(10, counter(&hits)).unwrap();

    clock.advance(Duration::from_ticks(35));
    assert_eq!(queue.dispatch_once(), 1);
    assert_eq!(queue.run_until_idle(10), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(queue.time_left(id), Some(Duration::from_ticks(5)));
}

#[test]
fn test_coalesce_fires_once_after_stall() {
    let clock = ManualClock::new();
    let queue: EventQueue<&ManualClock, 2> = EventQueue::new(&clock, QueueConfig::DEFAULT);
    let hits = Arc::new(AtomicUsize::new(0));
    let id = queue.post_every(10, counter(&hits)).unwrap();

    clock.advance(Duration::from_ticks(35));
    assert_eq!(queue.dispatch_once(), 1);
    assert_eq!(queue.run_until_idle(10), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(queue.time_left(id), Some(Duration::from_ticks(5)));
}

#[test]
fn test_panicking_callback_propagates_and_releases_dispatcher() {
    let queue: EventQueue<ManualClock, 1> = EventQueue::new(ManualClock::new(), QueueConfig::DEFAULT);
    let id = queue.post(|| panic!("callback failure")).unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| queue.dispatch_once()));
    assert!(result.is_err());
    assert_eq!(queue.clock().alarm(), None);

    // The only slot is free again and the old id is stale
    assert!(queue.is_empty());
    assert_eq!(queue.time_left(id), None);
    assert!(!queue.cancel(id));

    let hits = Arc::new(AtomicUsize::new(0));
    queue.post(counter(&hits)).unwrap();
    assert_eq!(queue.dispatch_once(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_periodic_event_is_not_rearmed() {
    let clock = ManualClock::new();
    let queue: EventQueue<&ManualClock, 1> = EventQueue::new(&clock, QueueConfig::DEFAULT);
    let id = queue.post_every(5, || panic!("periodic failure")).unwrap();

    clock.advance(Duration::from_ticks(5));
    let result = panic::catch_unwind(AssertUnwindSafe(|| queue.dispatch_once()));
    assert!(result.is_err());

    assert_eq!(queue.len(), 0);
    assert_eq!(queue.time_left(id), None);
    assert!(queue.post(|| {}).is_ok());
}

#[test]
fn test_wait_for_interrupt_as_idle_hook() {
    let config = QueueConfig::builder()
        .name("wfi")
        .idle_callback(crate::wait_for_interrupt)
        .build();
    let queue: EventQueue<ManualClock, 2> = EventQueue::new(ManualClock::new(), config);
    queue.post_in(10, || {}).unwrap();

    assert_eq!(queue.dispatch(10), 1);
    assert_eq!(queue.now(), Tick::new(10));
    assert_eq!(queue.run_until_idle(4), 0);
}
