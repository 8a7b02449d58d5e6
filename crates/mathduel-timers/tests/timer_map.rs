//! Timing behavior of `TimerMap` under the paused Tokio clock.
//!
//! `start_paused` makes the clock advance only when every task is idle, so
//! these tests are deterministic and run in microseconds of real time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;

use mathduel_timers::TimerMap;

type SharedTimers = Arc<Mutex<TimerMap<u32>>>;

/// Schedules a keep-existing timer whose callback redeems its ticket and
/// bumps `fired` only on success — the exact shape the server uses.
async fn schedule_counting(timers: &SharedTimers, key: u32, delay_ms: u64, fired: &Arc<AtomicU32>) -> bool {
    let t = Arc::clone(timers);
    let f = Arc::clone(fired);
    timers
        .lock()
        .await
        .schedule(key, Duration::from_millis(delay_ms), move |ticket| async move {
            let mut map = t.lock().await;
            if map.complete(&ticket) {
                f.fetch_add(1, Ordering::SeqCst);
            }
        })
}

async fn reschedule_counting(timers: &SharedTimers, key: u32, delay_ms: u64, fired: &Arc<AtomicU32>) {
    let t = Arc::clone(timers);
    let f = Arc::clone(fired);
    timers
        .lock()
        .await
        .reschedule(key, Duration::from_millis(delay_ms), move |ticket| async move {
            let mut map = t.lock().await;
            if map.complete(&ticket) {
                f.fetch_add(1, Ordering::SeqCst);
            }
        });
}

#[tokio::test(start_paused = true)]
async fn test_timer_fires_once_after_delay() {
    let timers: SharedTimers = Arc::new(Mutex::new(TimerMap::new()));
    let fired = Arc::new(AtomicU32::new(0));

    assert!(schedule_counting(&timers, 1, 100, &fired).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0, "not yet due");
    assert!(timers.lock().await.is_pending(&1));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!timers.lock().await.is_pending(&1), "entry retired on fire");
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_schedule_keeps_existing_timer() {
    let timers: SharedTimers = Arc::new(Mutex::new(TimerMap::new()));
    let fired = Arc::new(AtomicU32::new(0));

    assert!(schedule_counting(&timers, 1, 100, &fired).await);
    assert!(
        !schedule_counting(&timers, 1, 5, &fired).await,
        "second schedule is a no-op"
    );

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1, "only the original fired");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_prevents_fire() {
    let timers: SharedTimers = Arc::new(Mutex::new(TimerMap::new()));
    let fired = Arc::new(AtomicU32::new(0));

    schedule_counting(&timers, 1, 100, &fired).await;
    assert!(timers.lock().await.cancel(&1));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0, "cancel-then-fire never both apply");
    assert!(!timers.lock().await.is_pending(&1));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_then_reschedule_fires_the_new_timer_only() {
    let timers: SharedTimers = Arc::new(Mutex::new(TimerMap::new()));
    let first = Arc::new(AtomicU32::new(0));
    let second = Arc::new(AtomicU32::new(0));

    schedule_counting(&timers, 1, 100, &first).await;
    timers.lock().await.cancel(&1);
    schedule_counting(&timers, 1, 100, &second).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reschedule_debounces() {
    let timers: SharedTimers = Arc::new(Mutex::new(TimerMap::new()));
    let fired = Arc::new(AtomicU32::new(0));

    reschedule_counting(&timers, 1, 200, &fired).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    reschedule_counting(&timers, 1, 200, &fired).await;

    // t = 250: the original deadline (t=200) has passed, but the restart
    // moved it to t=300.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0, "countdown restarted");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1, "fires once after the quiet period");
}

#[tokio::test(start_paused = true)]
async fn test_independent_keys_fire_independently() {
    let timers: SharedTimers = Arc::new(Mutex::new(TimerMap::new()));
    let fired = Arc::new(AtomicU32::new(0));

    schedule_counting(&timers, 1, 50, &fired).await;
    schedule_counting(&timers, 2, 100, &fired).await;
    timers.lock().await.cancel(&1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1, "key 2 unaffected by key 1's cancel");
}
