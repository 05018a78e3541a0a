// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Traffic shaping for activity events.
//!
//! Every submitted event runs through a fixed chain of stages, each of which
//! can be switched off in [`ShaperConfig`]:
//!
//! 1. **ignore**: drop events whose resource matches an ignore pattern
//! 2. **rate limit**: at most `max_events_per_second` admissions per window
//! 3. **debounce**: hold edits, selections and diagnostics per resource
//!    until quiet
//! 4. **dedupe**: drop repeats of the same event within the dedupe window
//! 5. **batch**: group admitted events, flushing on size or window expiry
//!
//! Shaped output is delivered on the channel returned by
//! [`TrafficShaper::new`]. Timers run on the tokio runtime, so the shaper must
//! be created and used from within one.

mod dedupe;
mod filter;
mod rate;
mod stats;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ew_protocol::EventKind;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::ShaperConfig;
use crate::error::ConfigError;
use crate::event::{ActivityEvent, ShapedEvent, ShapedOutput};

pub use dedupe::{dedupe_key, DedupeCache};
pub use filter::IgnoreFilter;
pub use rate::RateBucket;
pub use stats::ShaperStats;

/// Debounce slots are keyed per kind and resource.
type DebounceKey = (EventKind, Option<String>);

/// Kinds held back by the debouncer.
pub fn is_debounced(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::FileEdit | EventKind::Selection | EventKind::Diagnostic
    )
}

/// Filters, coalesces and batches activity events before transport.
///
/// Cloning yields another handle to the same shaper.
#[derive(Clone)]
pub struct TrafficShaper {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    config: ShaperConfig,
    filter: IgnoreFilter,
    bucket: RateBucket,
    dedupe: DedupeCache,
    pending: HashMap<DebounceKey, Pending>,
    queue: Vec<ShapedEvent>,
    batch_timer: Option<JoinHandle<()>>,
    /// Generation of the armed batch timer.
    batch_generation: u64,
    next_generation: u64,
    stats: ShaperStats,
    /// `None` once destroyed.
    output: Option<mpsc::UnboundedSender<ShapedOutput>>,
}

/// A debounced event waiting for its quiet period to end.
struct Pending {
    event: ActivityEvent,
    count: u32,
    /// Order in which the slot was opened, for deterministic flushing.
    opened: u64,
    generation: u64,
    timer: JoinHandle<()>,
}

impl TrafficShaper {
    /// Create a shaper.
    ///
    /// Returns the shaper and the receiver for shaped output. The receiver
    /// ends after [`TrafficShaper::destroy`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] if an ignore pattern is invalid.
    pub fn new(
        config: ShaperConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ShapedOutput>), ConfigError> {
        let filter = IgnoreFilter::new(&config.ignore_patterns)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            bucket: RateBucket::new(config.max_events_per_second),
            dedupe: DedupeCache::new(config.dedupe_window()),
            filter,
            config,
            pending: HashMap::new(),
            queue: Vec::new(),
            batch_timer: None,
            batch_generation: 0,
            next_generation: 0,
            stats: ShaperStats::default(),
            output: Some(tx),
        };
        let shaper = TrafficShaper {
            inner: Arc::new(Mutex::new(inner)),
        };
        Ok((shaper, rx))
    }

    /// Submit an event.
    ///
    /// Returns true if the event was admitted (emitted, queued, or held by
    /// the debouncer) and false if a stage dropped it or the shaper has been
    /// destroyed.
    pub fn submit(&self, event: ActivityEvent) -> bool {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        inner.stats.received += 1;
        if inner.output.is_none() {
            return false;
        }

        if inner.config.ignore_enabled {
            if let Some(resource) = event.resource_id.as_deref() {
                if let Some(pattern) = inner.filter.matching(resource) {
                    trace!(resource, pattern, "ignored");
                    inner.stats.filtered += 1;
                    return false;
                }
            }
        }

        if inner.config.rate_limit_enabled && !inner.bucket.try_acquire(Instant::now()) {
            trace!(kind = %event.kind, "rate limited");
            inner.stats.rate_limited += 1;
            return false;
        }

        if inner.config.debounce_enabled && is_debounced(event.kind) {
            inner.debounce(&self.inner, event);
            return true;
        }

        inner.admit(&self.inner, ShapedEvent::single(event), false)
    }

    /// Release every pending debounced event and emit the batch queue now.
    ///
    /// Calling flush with nothing pending emits nothing.
    pub fn flush(&self) {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        let mut held: Vec<Pending> = inner.pending.drain().map(|(_, p)| p).collect();
        held.sort_by_key(|p| p.opened);
        for pending in held {
            pending.timer.abort();
            inner.release(&self.inner, pending);
        }
        inner.flush_queue();
    }

    /// Snapshot of the counters and gauges.
    pub fn stats(&self) -> ShaperStats {
        let inner = lock(&self.inner);
        ShaperStats {
            pending_debounce: inner.pending.len(),
            queued: inner.queue.len(),
            ..inner.stats
        }
    }

    /// Zero the counters.
    pub fn reset_stats(&self) {
        lock(&self.inner).stats = ShaperStats::default();
    }

    /// Discard pending, queued and remembered state without emitting it.
    pub fn clear(&self) {
        lock(&self.inner).clear();
    }

    /// Flush, clear, and close the output channel.
    ///
    /// Later submissions are rejected.
    pub fn destroy(&self) {
        self.flush();
        let mut inner = lock(&self.inner);
        inner.clear();
        inner.output = None;
        debug!("shaper destroyed");
    }

    /// Whether [`TrafficShaper::destroy`] has been called.
    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner).output.is_none()
    }
}

impl Inner {
    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Hold an event in its debounce slot, replacing any earlier one.
    fn debounce(&mut self, shared: &Arc<Mutex<Inner>>, event: ActivityEvent) {
        let key = (event.kind, event.resource_id.clone());
        let generation = self.next_generation();
        let timer = spawn_debounce_timer(
            Arc::downgrade(shared),
            key.clone(),
            generation,
            self.config.debounce_delay(),
        );
        match self.pending.get_mut(&key) {
            Some(pending) => {
                pending.timer.abort();
                pending.event = event;
                pending.count += 1;
                pending.generation = generation;
                pending.timer = timer;
                self.stats.debounced += 1;
            }
            None => {
                self.pending.insert(
                    key,
                    Pending {
                        event,
                        count: 1,
                        opened: generation,
                        generation,
                        timer,
                    },
                );
            }
        }
    }

    fn release(&mut self, shared: &Arc<Mutex<Inner>>, pending: Pending) {
        let shaped = ShapedEvent {
            event: pending.event,
            coalesced: pending.count,
        };
        self.admit(shared, shaped, true);
    }

    /// Run the dedupe and batch stages.
    fn admit(&mut self, shared: &Arc<Mutex<Inner>>, shaped: ShapedEvent, debounced: bool) -> bool {
        if self.config.dedupe_enabled && dedupe::applies_to(shaped.event.kind, debounced) {
            let key = dedupe_key(&shaped.event);
            if self.dedupe.check_and_mark(key, Instant::now()) {
                trace!(kind = %shaped.event.kind, "duplicate");
                self.stats.deduplicated += 1;
                return false;
            }
        }
        self.stats.passed += 1;
        self.enqueue(shared, shaped);
        true
    }

    fn enqueue(&mut self, shared: &Arc<Mutex<Inner>>, shaped: ShapedEvent) {
        if !self.config.batch_enabled {
            self.emit(ShapedOutput::Event(shaped));
            return;
        }
        self.queue.push(shaped);
        if self.queue.len() >= self.config.max_batch_size {
            self.flush_queue();
        } else if self.batch_timer.is_none() {
            self.arm_batch_timer(shared);
        }
    }

    fn arm_batch_timer(&mut self, shared: &Arc<Mutex<Inner>>) {
        let generation = self.next_generation();
        self.batch_generation = generation;
        let weak = Arc::downgrade(shared);
        let window = self.config.batch_window();
        self.batch_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut inner = lock(&shared);
            if inner.batch_generation == generation && inner.batch_timer.is_some() {
                inner.batch_timer = None;
                inner.flush_queue();
            }
        }));
    }

    /// Emit the batch queue: a single event on its own, more as a batch.
    fn flush_queue(&mut self) {
        if let Some(timer) = self.batch_timer.take() {
            timer.abort();
        }
        let mut events = std::mem::take(&mut self.queue);
        match events.len() {
            0 => {}
            1 => {
                if let Some(event) = events.pop() {
                    self.emit(ShapedOutput::Event(event));
                }
            }
            _ => self.emit(ShapedOutput::Batch(events)),
        }
    }

    fn emit(&mut self, output: ShapedOutput) {
        match &output {
            ShapedOutput::Event(_) => self.stats.emitted_events += 1,
            ShapedOutput::Batch(events) => {
                debug!(size = events.len(), "emitting batch");
                self.stats.emitted_batches += 1;
            }
        }
        if let Some(tx) = &self.output {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(output);
        }
    }

    fn clear(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.timer.abort();
        }
        if let Some(timer) = self.batch_timer.take() {
            timer.abort();
        }
        self.queue.clear();
        self.dedupe.clear();
        self.bucket.reset();
    }
}

fn spawn_debounce_timer(
    weak: Weak<Mutex<Inner>>,
    key: DebounceKey,
    generation: u64,
    delay: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let mut guard = lock(&shared);
        let inner = &mut *guard;
        let current = inner
            .pending
            .get(&key)
            .is_some_and(|p| p.generation == generation);
        if !current {
            return;
        }
        if let Some(pending) = inner.pending.remove(&key) {
            inner.release(&shared, pending);
        }
    })
}

/// Lock the shared state, recovering from a poisoned mutex.
fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
