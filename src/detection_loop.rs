//! Detection loop controller.
//!
//! Drives the repeating "capture frame, run detector, report" cycle on one
//! worker thread per run. Each run carries a generation number; the result
//! gate holds the generation whose results may still be delivered. `stop`
//! clears the gate under its mutex, so once it returns no callback can fire
//! for that run even if a detector call was still in flight.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::clock::{FrameClock, RefreshClock};
use crate::detect::{DetectionUpdate, SharedDetector};
use crate::ingest::SharedSource;

thread_local! {
    /// Gate held by the result callback running on this thread, if any.
    static HELD_GATE: Cell<usize> = const { Cell::new(0) };
}

fn gate_id(gate: &Arc<Mutex<u64>>) -> usize {
    Arc::as_ptr(gate) as usize
}

/// Counters for the lifetime of a controller, across runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub iterations: u64,
    pub detections_run: u64,
    pub failures: u64,
    pub skipped_not_ready: u64,
    pub delivered: u64,
    pub discarded: u64,
}

#[derive(Default)]
struct Counters {
    iterations: AtomicU64,
    detections_run: AtomicU64,
    failures: AtomicU64,
    skipped_not_ready: AtomicU64,
    delivered: AtomicU64,
    discarded: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LoopStats {
        LoopStats {
            iterations: self.iterations.load(Ordering::Relaxed),
            detections_run: self.detections_run.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            skipped_not_ready: self.skipped_not_ready.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct DetectionLoop {
    detector: SharedDetector,
    refresh_hz: u32,
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    /// Generation allowed to deliver results; 0 when idle.
    gate: Arc<Mutex<u64>>,
    counters: Arc<Counters>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn holds_gate(gate: &Arc<Mutex<u64>>) -> bool {
    HELD_GATE.with(Cell::get) == gate_id(gate)
}

impl DetectionLoop {
    /// Build an idle controller around an already loaded detector.
    pub fn new(detector: SharedDetector, refresh_hz: u32) -> Result<Self> {
        RefreshClock::new(refresh_hz).context("detection loop clock")?;
        Ok(Self {
            detector,
            refresh_hz,
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            gate: Arc::new(Mutex::new(0)),
            counters: Arc::new(Counters::default()),
            worker: Mutex::new(None),
        })
    }

    /// Start detecting on `source`, delivering each successful result to
    /// `on_result` on the worker thread.
    ///
    /// Returns `Ok(false)` without starting a second cycle when already running.
    /// May be called from inside `on_result` after `stop`; the new run then
    /// delivers once the current callback has returned.
    pub fn start<F>(&self, source: SharedSource, on_result: F) -> Result<bool>
    where
        F: FnMut(DetectionUpdate) + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("detection loop already running; start ignored");
            return Ok(false);
        }

        let clock = match RefreshClock::new(self.refresh_hz) {
            Ok(clock) => clock,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // Inside our own callback the worker holds the gate and hands it over.
        let in_callback = holds_gate(&self.gate);
        if !in_callback {
            *lock(&self.gate) = generation;
        }

        let worker = Worker {
            generation,
            source,
            detector: self.detector.clone(),
            running: self.running.clone(),
            current: self.generation.clone(),
            gate: self.gate.clone(),
            counters: self.counters.clone(),
        };
        let spawned = std::thread::Builder::new()
            .name(format!("detection-loop-{generation}"))
            .spawn(move || worker.run(clock, on_result));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                if !in_callback {
                    *lock(&self.gate) = 0;
                }
                self.running.store(false, Ordering::SeqCst);
                return Err(err).context("spawn detection loop worker");
            }
        };
        // A previous run's worker exits on its own once it sees the new generation.
        *lock(&self.worker) = Some(handle);
        log::info!("detection loop started (run {})", generation);
        Ok(true)
    }

    /// Stop the loop. Returns whether it was running.
    ///
    /// An in-flight detector call still completes, but its result is dropped.
    /// When called from another thread this waits for a callback that is
    /// currently running to return.
    pub fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        // Inside our own callback the worker holds the gate and clears it.
        if !holds_gate(&self.gate) {
            *lock(&self.gate) = 0;
        }
        log::info!("detection loop stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> LoopStats {
        self.counters.snapshot()
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.stop();
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            // The last owner may be the worker's own callback.
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::warn!("detection loop worker panicked");
            }
        }
    }
}

struct Worker {
    generation: u64,
    source: SharedSource,
    detector: SharedDetector,
    running: Arc<AtomicBool>,
    current: Arc<AtomicU64>,
    gate: Arc<Mutex<u64>>,
    counters: Arc<Counters>,
}

impl Worker {
    fn is_current(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.current.load(Ordering::SeqCst) == self.generation
    }

    fn run<F>(self, mut clock: impl FrameClock, mut on_result: F)
    where
        F: FnMut(DetectionUpdate),
    {
        let mut sequence = 0u64;
        loop {
            clock.wait_for_frame();
            if !self.is_current() {
                break;
            }
            Counters::bump(&self.counters.iterations);

            let frame = {
                let mut source = lock(&self.source);
                if !source.is_ready() {
                    Counters::bump(&self.counters.skipped_not_ready);
                    continue;
                }
                source.current_frame()
            };
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    Counters::bump(&self.counters.failures);
                    log::warn!("frame capture failed: {:#}", err);
                    continue;
                }
            };

            Counters::bump(&self.counters.detections_run);
            let result = lock(&self.detector).detect(&frame);
            let detections = match result {
                Ok(detections) => detections,
                Err(err) => {
                    Counters::bump(&self.counters.failures);
                    log::warn!("Detection failed: {:#}", err);
                    continue;
                }
            };

            let mut gate = lock(&self.gate);
            if *gate != self.generation {
                Counters::bump(&self.counters.discarded);
                log::debug!("discarding late result from run {}", self.generation);
                break;
            }
            sequence += 1;
            let update = DetectionUpdate {
                detections,
                frame: frame.dimensions(),
                sequence,
            };
            HELD_GATE.with(|held| held.set(gate_id(&self.gate)));
            on_result(update);
            HELD_GATE.with(|held| held.set(0));
            Counters::bump(&self.counters.delivered);
            if !self.is_current() {
                // stop() or a restart ran inside the callback and left the gate to us.
                *gate = if self.running.load(Ordering::SeqCst) {
                    self.current.load(Ordering::SeqCst)
                } else {
                    0
                };
            }
            drop(gate);
        }
        log::debug!("detection loop run {} exited", self.generation);
    }
}
