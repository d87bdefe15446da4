//! DeliveryQueue - bounded intake, worker pool, graceful shutdown
//!
//! Producers push into a mutex-guarded ring buffer and never wait. A fixed
//! pool of `max_concurrency` workers pops entries, finalizes them and fans
//! each event out to every sink. The pool size is the concurrency cap.
//!
//! An entry is counted as active from the moment it leaves the buffer (under
//! the buffer lock) until its fan-out completes, so `queue_length` plus
//! `active_deliveries` never drops to zero while work is pending.

use std::future::Future;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{DeliveryConfig, EventSink, LimitsConfig, RawEvent, SinkRole};
use futures::future::join_all;
use ringbuf::{traits::*, HeapRb};
use tokio::runtime::Handle;
use tokio::sync::{Notify, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};
use transform::{serialized_len, EventPipeline};
use validator::Validate;

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::{QueueMetrics, QueueMetricsSnapshot, SinkMetricsSnapshot};

/// Buffered event awaiting a worker
struct QueueEntry {
    raw: RawEvent,
    enqueued_at: Instant,
}

/// Backlog visibility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Entries buffered, not yet picked up
    pub queue_length: usize,
    /// Entries being finalized or delivered
    pub active_deliveries: usize,
    /// Any worker currently awake
    pub is_dispatching: bool,
}

/// Outcome of [`DeliveryQueue::shutdown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Queue and in-flight deliveries reached zero before the timeout
    pub drained: bool,
    /// Buffered entries discarded after the timeout
    pub discarded: usize,
    /// Deliveries still in flight when the timeout elapsed
    pub abandoned_active: usize,
    pub elapsed: Duration,
}

impl ShutdownReport {
    pub fn timed_out(&self) -> bool {
        !self.drained
    }
}

/// State shared between the queue front and its workers
struct Shared {
    buffer: Mutex<HeapRb<QueueEntry>>,
    notify: Notify,
    /// Intake open
    accepting: AtomicBool,
    /// Workers exit once the buffer is empty
    closed: AtomicBool,
    active: AtomicUsize,
    awake: AtomicUsize,
    pipeline: EventPipeline,
    sinks: Vec<SinkHandle>,
    metrics: QueueMetrics,
}

impl Shared {
    fn lock_buffer(&self) -> MutexGuard<'_, HeapRb<QueueEntry>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop the oldest entry and mark it active in one critical section
    fn pop(self: &Arc<Self>) -> Option<(QueueEntry, ActiveGuard)> {
        let mut buffer = self.lock_buffer();
        let entry = buffer.try_pop()?;
        self.active.fetch_add(1, Ordering::AcqRel);
        Some((entry, ActiveGuard(Arc::clone(self))))
    }

    fn stats(&self) -> QueueStats {
        let buffer = self.lock_buffer();
        QueueStats {
            queue_length: buffer.occupied_len(),
            active_deliveries: self.active.load(Ordering::Acquire),
            is_dispatching: self.awake.load(Ordering::Acquire) > 0,
        }
    }

    fn close(&self) {
        self.accepting.store(false, Ordering::Release);
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Finalize one entry and fan it out
    #[instrument(
        name = "delivery_queue_process",
        skip(self, entry),
        fields(event_type = %entry.raw.event_type)
    )]
    async fn process(&self, entry: QueueEntry) {
        let queued_ms = entry.enqueued_at.elapsed().as_millis() as u64;

        let event = match self.pipeline.finalize(entry.raw).await {
            Ok(event) => event,
            Err(e) => {
                self.metrics.inc_redaction_failed();
                error!(error = %e, "Redaction failed, event dropped");
                return;
            }
        };
        self.metrics.inc_finalized(serialized_len(&event));

        let outcomes = join_all(self.sinks.iter().map(|sink| sink.deliver(&event))).await;
        let delivered = outcomes.into_iter().filter(|ok| *ok).count();

        debug!(
            event_id = %event.id,
            delivered,
            sinks = self.sinks.len(),
            queued_ms,
            "Event dispatched"
        );
    }
}

/// Decrements the active count when a delivery ends, including on panic
struct ActiveGuard(Arc<Shared>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Worker task: pop, process, park when idle
#[instrument(name = "delivery_worker_loop", skip(shared))]
async fn worker_loop(shared: Arc<Shared>, worker_id: usize) {
    debug!(worker_id, "Delivery worker started");

    while let Some((entry, _guard)) = next_entry(&shared).await {
        shared.process(entry).await;
    }

    shared.awake.fetch_sub(1, Ordering::AcqRel);
    debug!(worker_id, "Delivery worker stopped");
}

/// Wait for the next entry; `None` once the queue is closed and empty
async fn next_entry(shared: &Arc<Shared>) -> Option<(QueueEntry, ActiveGuard)> {
    loop {
        // Register interest before checking the buffer so a concurrent
        // enqueue cannot slip between the check and the park.
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some(next) = shared.pop() {
            return Some(next);
        }
        if shared.closed.load(Ordering::Acquire) {
            return None;
        }

        shared.awake.fetch_sub(1, Ordering::AcqRel);
        notified.await;
        shared.awake.fetch_add(1, Ordering::AcqRel);
    }
}

/// Bounded, concurrency-limited delivery service
pub struct DeliveryQueue {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    runtime: Handle,
    config: DeliveryConfig,
    report: OnceCell<ShutdownReport>,
}

impl DeliveryQueue {
    pub fn builder(config: DeliveryConfig) -> DeliveryQueueBuilder {
        DeliveryQueueBuilder::new(config)
    }

    /// Buffer `raw` for delivery
    ///
    /// Never blocks and never fails. At capacity the oldest buffered entry is
    /// evicted; after shutdown has begun the event is logged and dropped.
    pub fn enqueue(&self, raw: RawEvent) {
        let shared = &self.shared;
        if !shared.accepting.load(Ordering::Acquire) {
            shared.metrics.inc_rejected();
            warn!(
                event_type = %raw.event_type,
                session_id = %raw.session_id,
                "Delivery queue shut down, event dropped"
            );
            return;
        }

        let entry = QueueEntry {
            raw,
            enqueued_at: Instant::now(),
        };
        let (evicted, overflow) = {
            let mut buffer = shared.lock_buffer();
            let evicted = if buffer.is_full() {
                buffer.try_pop()
            } else {
                None
            };
            (evicted, buffer.try_push(entry).err())
        };

        shared.metrics.inc_enqueued();
        if let Some(old) = evicted {
            shared.metrics.inc_evicted();
            warn!(
                event_type = %old.raw.event_type,
                queued_ms = old.enqueued_at.elapsed().as_millis() as u64,
                capacity = self.config.max_queue_size,
                "Queue full, oldest event evicted"
            );
        }
        if let Some(lost) = overflow {
            shared.metrics.inc_evicted();
            warn!(event_type = %lost.raw.event_type, "Queue full, event dropped");
        }

        shared.notify.notify_one();
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.stats()
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Per-sink counters, in registration order
    pub fn sink_metrics(&self) -> Vec<(String, SinkMetricsSnapshot)> {
        self.shared
            .sinks
            .iter()
            .map(|sink| (sink.name().to_string(), sink.metrics().snapshot()))
            .collect()
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Stop intake and wait for the backlog to drain, at most `timeout`
    ///
    /// On a clean drain the workers are joined and every sink is flushed and
    /// closed. On timeout the remaining buffered entries are discarded, sinks
    /// are flushed and in-flight deliveries are left to finish on their own.
    /// Later calls return the first call's report.
    #[instrument(name = "delivery_queue_shutdown", skip(self))]
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        *self.report.get_or_init(|| self.drain(timeout)).await
    }

    /// Shut down once `signal` completes
    ///
    /// For wiring host lifecycle events such as `tokio::signal::ctrl_c()`.
    pub fn shutdown_on<F>(self: &Arc<Self>, signal: F, timeout: Duration) -> JoinHandle<ShutdownReport>
    where
        F: Future + Send + 'static,
    {
        let queue = Arc::clone(self);
        self.runtime.spawn(async move {
            signal.await;
            info!("Shutdown signal received");
            queue.shutdown(timeout).await
        })
    }

    async fn drain(&self, timeout: Duration) -> ShutdownReport {
        let shared = &self.shared;
        shared.accepting.store(false, Ordering::Release);

        let started = Instant::now();
        let deadline = started + timeout;
        let poll_interval = self.config.poll_interval();
        info!(
            timeout_ms = timeout.as_millis() as u64,
            backlog = shared.stats().queue_length,
            "Delivery queue shutting down"
        );

        let drained = loop {
            let stats = shared.stats();
            if stats.queue_length == 0 && stats.active_deliveries == 0 {
                break true;
            }
            let now = Instant::now();
            if now >= deadline {
                break false;
            }
            sleep(poll_interval.min(deadline - now)).await;
        };

        let (discarded, abandoned_active) = if drained {
            (0, 0)
        } else {
            let leftover: Vec<QueueEntry> = shared.lock_buffer().pop_iter().collect();
            (leftover.len(), shared.active.load(Ordering::Acquire))
        };
        shared.close();

        let workers = mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        if drained {
            for worker in workers {
                if let Err(e) = worker.await {
                    error!(error = ?e, "Delivery worker panicked");
                }
            }
            for sink in &shared.sinks {
                sink.shutdown().await;
            }
        } else {
            shared.metrics.add_discarded(discarded as u64);
            warn!(
                discarded,
                abandoned_active,
                "Shutdown timed out, remaining events discarded"
            );
            drop(workers);
            for sink in &shared.sinks {
                sink.flush().await;
            }
        }

        let report = ShutdownReport {
            drained,
            discarded,
            abandoned_active,
            elapsed: started.elapsed(),
        };
        info!(
            drained,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Delivery queue shutdown complete"
        );
        report
    }
}

impl Drop for DeliveryQueue {
    /// Workers keep draining the buffer in the background, then exit
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Builder for [`DeliveryQueue`]
pub struct DeliveryQueueBuilder {
    config: DeliveryConfig,
    pipeline: EventPipeline,
    sinks: Vec<SinkHandle>,
}

impl DeliveryQueueBuilder {
    pub fn new(config: DeliveryConfig) -> Self {
        Self {
            config,
            pipeline: EventPipeline::default(),
            sinks: Vec::new(),
        }
    }

    /// Finalization limits
    pub fn limits(mut self, limits: &LimitsConfig) -> Self {
        self.pipeline = EventPipeline::new(limits);
        self
    }

    /// Replace the finalization pipeline
    pub fn pipeline(mut self, pipeline: EventPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Register a sink using the queue's retry policy
    pub fn sink<S>(self, sink: S, role: SinkRole) -> Self
    where
        S: EventSink + Sync + 'static,
    {
        let retry = self.config.retry.clone();
        self.sink_handle(SinkHandle::new(sink, role, retry))
    }

    /// Register a prepared handle
    pub fn sink_handle(mut self, handle: SinkHandle) -> Self {
        self.sinks.push(handle);
        self
    }

    /// Validate delivery config and limits, then start the worker pool on the
    /// current runtime
    #[instrument(
        name = "delivery_queue_builder_build",
        skip(self),
        fields(sinks = self.sinks.len(), workers = self.config.max_concurrency)
    )]
    pub fn build(self) -> Result<DeliveryQueue, DispatcherError> {
        self.config
            .validate()
            .map_err(|e| DispatcherError::InvalidConfig(e.to_string()))?;
        self.pipeline
            .limits()
            .validate()
            .map_err(|e| DispatcherError::InvalidConfig(e.to_string()))?;
        let runtime = Handle::try_current().map_err(|e| DispatcherError::NoRuntime(e.to_string()))?;

        if self.sinks.is_empty() {
            warn!("Delivery queue built without sinks, events will be finalized and discarded");
        }

        let workers = self.config.max_concurrency;
        let shared = Arc::new(Shared {
            buffer: Mutex::new(HeapRb::new(self.config.max_queue_size)),
            notify: Notify::new(),
            accepting: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            awake: AtomicUsize::new(workers),
            pipeline: self.pipeline,
            sinks: self.sinks,
            metrics: QueueMetrics::new(),
        });

        let handles = (0..workers)
            .map(|worker_id| runtime.spawn(worker_loop(Arc::clone(&shared), worker_id)))
            .collect();

        info!(
            capacity = self.config.max_queue_size,
            workers,
            sinks = shared.sinks.len(),
            "Delivery queue started"
        );

        Ok(DeliveryQueue {
            shared,
            workers: Mutex::new(handles),
            runtime,
            config: self.config,
            report: OnceCell::new(),
        })
    }
}
