//! Scheduler
//!
//! Drives the generate->classify->persist->auto-escalate pipeline on a
//! randomized cadence, and refreshes the response-time estimate once a
//! second. Both loops wait on a cancellable `watch` channel instead of
//! a plain sleep, so `stop()` takes effect immediately: an in-flight
//! cycle completes but never reschedules.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::watch;

use super::engine::AlertEngine;

pub struct Scheduler {
    engine: Arc<AlertEngine>,
    /// Stop signal for the running loops; None while stopped
    running: Mutex<Option<watch::Sender<bool>>>,
}

impl Scheduler {
    pub fn new(engine: Arc<AlertEngine>) -> Self {
        Self {
            engine,
            running: Mutex::new(None),
        }
    }

    /// Start the background loops. Calling `start` while already
    /// started is a no-op.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            log::debug!("Scheduler start ignored, already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(generation_loop(self.engine.clone(), stop_rx.clone()));
        tokio::spawn(estimate_loop(self.engine.clone(), stop_rx));

        *running = Some(stop_tx);
        log::info!("Alert scheduler started");
    }

    /// Stop the background loops. No further pipeline invocation occurs
    /// after this returns; an in-flight cycle is allowed to finish.
    /// Calling `stop` while already stopped is a no-op.
    pub fn stop(&self) {
        let mut running = self.running.lock();
        if let Some(stop_tx) = running.take() {
            let _ = stop_tx.send(true);
            log::info!("Alert scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Wait a random interval in [cycle_min, cycle_max), run one cycle,
/// repeat - only while the stop flag stays clear.
async fn generation_loop(engine: Arc<AlertEngine>, mut stop_rx: watch::Receiver<bool>) {
    log::info!("Alert generation loop started");
    loop {
        let wait = {
            let mut rng = rand::thread_rng();
            let min = engine.config().cycle_min.as_millis() as u64;
            let max = engine.config().cycle_max.as_millis() as u64;
            Duration::from_millis(rng.gen_range(min..max.max(min + 1)))
        };

        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        if *stop_rx.borrow() {
            break;
        }

        engine.run_cycle().await;

        // In-flight run completed; do not reschedule after stop
        if *stop_rx.borrow() {
            break;
        }
    }
    log::info!("Alert generation loop exited");
}

/// 1 Hz response-time estimate refresh
async fn estimate_loop(engine: Arc<AlertEngine>, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(engine.config().estimate_refresh);
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {
                let ages = engine.store().pending_ages_secs(Utc::now());
                engine.estimator().refresh(&ages);
            }
        }
    }
}
