//! Event producers
//!
//! - `tick_task`: async task posting TICK on a fixed period
//! - `ButtonIsr`: a std thread standing in for an interrupt handler,
//!   posting BUTTON with `post_from_isr`

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_time::{Duration, Ticker};
use log::{info, warn};
use sigflow_core::{Event, Poster};

use crate::states::{BUTTON, TICK};

/// Post TICK every `period`, forever
pub async fn tick_task(poster: Poster<'_>, period: Duration) {
    info!("tick task started");

    let mut ticker = Ticker::every(period);
    loop {
        ticker.next().await;

        if let Err(e) = poster.post(&Event::new(TICK)).await {
            warn!("tick dropped: {e}");
        }
    }
}

/// Counters kept by the simulated interrupt
#[derive(Debug, Default)]
pub struct IsrStats {
    pub posted: AtomicU32,
    pub dropped: AtomicU32,
    /// Posts that found the consumer parked
    pub wakeups: AtomicU32,
}

/// Simulated button interrupt on its own thread
pub struct ButtonIsr {
    stop: Arc<AtomicBool>,
    stats: Arc<IsrStats>,
    handle: JoinHandle<()>,
}

impl ButtonIsr {
    /// Fire `burst` BUTTON posts every `period` until stopped
    pub fn spawn(poster: Poster<'static>, period: std::time::Duration, burst: u32) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(IsrStats::default());

        let handle = {
            let stop = stop.clone();
            let stats = stats.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(period);
                    fire(&poster, burst, &stats);
                }
            })
        };

        Self {
            stop,
            stats,
            handle,
        }
    }

    /// Stop the thread and return its counters
    pub fn stop(self) -> Arc<IsrStats> {
        self.stop.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            warn!("button isr thread panicked");
        }
        self.stats
    }
}

/// One interrupt: no waiting, no logging
fn fire(poster: &Poster<'_>, burst: u32, stats: &IsrStats) {
    let mut woken = false;
    for _ in 0..burst {
        match poster.post_from_isr(&Event::new(BUTTON), &mut woken) {
            Ok(()) => stats.posted.fetch_add(1, Ordering::Relaxed),
            Err(_) => stats.dropped.fetch_add(1, Ordering::Relaxed),
        };
    }
    if woken {
        stats.wakeups.fetch_add(1, Ordering::Relaxed);
    }
}
