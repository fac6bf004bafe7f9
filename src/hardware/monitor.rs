//! Dedicated OS-thread carrier-detect monitor.
//!
//! The interrupt read that senses the carrier line is a blocking call with
//! a bounded timeout, so the monitor lives on its own OS thread rather than
//! inside a tokio task.  [`CarrierMonitor`] owns that thread and a stop
//! flag; [`CarrierMonitor::stop`] (or drop) ends the loop at the next poll.
//!
//! The callback fires only on genuine value changes.  Debouncing falls out
//! of the gateway contract: a poll that times out re-reports the previous
//! value, so a timeout can never manufacture an edge.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use crate::hardware::gateway::CarrierPtt;

// ---------------------------------------------------------------------------
// CarrierMonitor
// ---------------------------------------------------------------------------

/// Handle to a running carrier-detect polling thread.
///
/// Construct one with [`CarrierMonitor::start`].
pub struct CarrierMonitor {
    /// Shared stop flag — set `true` to end the loop.
    stop: Arc<AtomicBool>,
    /// The polling thread; joined on [`stop`](Self::stop).
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CarrierMonitor {
    /// Spawn the polling thread.
    ///
    /// # Arguments
    ///
    /// * `gateway`       — the carrier-detect hardware to poll.
    /// * `poll_interval` — sleep between polls (~20 ms on the reference
    ///   hardware).
    /// * `read_timeout`  — bounded wait for a single interrupt read.
    /// * `on_change`     — invoked with the new value on every genuine
    ///   carrier transition, from the polling thread.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread (extremely unlikely).
    pub fn start<F>(
        gateway: Arc<dyn CarrierPtt>,
        poll_interval: Duration,
        read_timeout: Duration,
        mut on_change: F,
    ) -> Self
    where
        F: FnMut(bool) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("carrier-monitor".into())
            .spawn(move || {
                let mut last = false;
                while !stop_flag.load(Ordering::Relaxed) {
                    let current = gateway.poll_carrier(read_timeout);
                    if current != last {
                        last = current;
                        on_change(current);
                    }
                    std::thread::sleep(poll_interval);
                }
            })
            .expect("failed to spawn carrier-monitor thread");

        Self {
            stop,
            thread: Some(thread),
        }
    }

    /// Stop polling and join the thread.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CarrierMonitor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
