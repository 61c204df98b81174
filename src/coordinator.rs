//! The engine's external surface (§4.9): `Coordinator` owns every shared
//! component and exposes `start`/`stop`/`submit`/`submit_batch`/`status`/
//! `cancel` to the embedding application.

use crate::config::EngineConfig;
use crate::deadletter::{DeadLetterEntry, DeadLetterQueue};
use crate::descriptor::{Priority, RequestDescriptor};
use crate::dispatcher;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::response::ResponseRecord;
use crate::snapshot;
use crate::transport::Transport;
use dispatch_cache::{Cache, CacheConfig};
use dispatch_circuitbreaker::{CircuitBreakerConfig, CircuitRegistry, CircuitState};
use dispatch_core::events::{EventListeners, FnListener};
use dispatch_core::{Clock, HealthState, Origin, SystemClock};
use dispatch_monitor::{AlertSink, Monitor, MonitorEvent};
use dispatch_queue::PriorityQueue;
use dispatch_ratelimiter::TokenBucket;
use dispatch_retry::{RetryConfig, RetryPolicy};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Everything a worker needs to process an entry, shared across the pool
/// via one `Arc`. Lives here (not `dispatcher.rs`) since `Coordinator`
/// owns its construction and teardown.
pub(crate) struct EngineShared {
    pub(crate) config: EngineConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) queue: Arc<PriorityQueue<RequestDescriptor>>,
    pub(crate) token_bucket: Arc<TokenBucket>,
    pub(crate) breakers: Arc<CircuitRegistry>,
    pub(crate) retry_policy: Arc<RetryPolicy>,
    pub(crate) cache: Option<Arc<Cache<String, ResponseRecord>>>,
    pub(crate) dead_letters: Arc<DeadLetterQueue>,
    pub(crate) monitor: Arc<Monitor>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) event_listeners: EventListeners<EngineEvent>,
    pub(crate) completions: Mutex<HashMap<Uuid, oneshot::Sender<ResponseRecord>>>,
    pub(crate) dispatched: Mutex<HashSet<Uuid>>,
    pub(crate) canceled: Mutex<HashSet<Uuid>>,
    pub(crate) known_origins: Mutex<HashSet<Origin>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) in_flight: AtomicUsize,
}

/// A snapshot of the coordinator's operational state (§4.9).
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub queue_size: usize,
    pub in_flight: usize,
    pub workers: usize,
    pub breaker_states: HashMap<String, CircuitState>,
    pub health: HealthState,
}

/// Returned by [`Coordinator::submit`]: carries the assigned id immediately
/// (§4.9's literal `submit(descriptor, priority) -> id`) and an awaitable
/// that resolves with the final [`ResponseRecord`] once the descriptor
/// completes (§7's "the handle returned by submit resolves with the final
/// outcome").
pub struct SubmitHandle {
    id: Uuid,
    receiver: oneshot::Receiver<ResponseRecord>,
}

impl SubmitHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Awaits the final record. Fails only if the engine dropped the
    /// completion sender without ever resolving it (e.g. the coordinator
    /// was dropped mid-flight).
    pub async fn wait(self) -> Result<ResponseRecord, EngineError> {
        self.receiver.await.map_err(|_| EngineError::UnknownRequest(self.id))
    }
}

/// Builds a [`Coordinator`], gathering the event listeners and alert sinks
/// that must be wired in before the shared state is constructed.
pub struct CoordinatorBuilder {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    event_listeners: EventListeners<EngineEvent>,
    monitor_sinks: Vec<Arc<dyn AlertSink>>,
}

impl CoordinatorBuilder {
    /// Overrides the clock (for deterministic tests via `ManualClock`).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a listener on the engine-wide [`EngineEvent`] stream.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Adds a delivery sink for [`dispatch_monitor::Alert`]s (paging, etc).
    pub fn monitor_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.monitor_sinks.push(sink);
        self
    }

    pub fn build(self) -> Coordinator {
        let shared = build_shared(self.config, self.transport, self.clock, self.event_listeners, self.monitor_sinks);
        Coordinator {
            shared,
            workers: Mutex::new(Vec::new()),
            monitor_collector: Mutex::new(None),
            metrics_sampler: Mutex::new(None),
            expiry_sweeper: Mutex::new(None),
        }
    }
}

fn build_shared(
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    event_listeners: EventListeners<EngineEvent>,
    monitor_sinks: Vec<Arc<dyn AlertSink>>,
) -> Arc<EngineShared> {
    let queue = Arc::new(PriorityQueue::new(config.max_queue_size));

    let token_bucket = Arc::new(
        dispatch_ratelimiter::TokenBucketConfig::builder()
            .refill_rate(config.rate_limit_per_second)
            .capacity(config.rate_limit_per_second)
            .name("dispatch-engine")
            .build()
            .into_bucket_with_clock(Arc::clone(&clock)),
    );

    let breakers = Arc::new(CircuitRegistry::new(
        CircuitBreakerConfig::builder()
            .failure_threshold(config.breaker_failure_threshold)
            .breaker_timeout(config.breaker_timeout())
            .half_open_max_calls(config.breaker_half_open_max_calls)
            .probe_required(config.breaker_probe_required)
            .name("dispatch-engine")
            .build(),
        Arc::clone(&clock),
    ));

    let retry_policy = Arc::new(RetryPolicy::new(
        RetryConfig::builder()
            .max_retries(config.retry_count)
            .base_delay(config.retry_base_delay())
            .max_delay(config.retry_max_delay())
            .name("dispatch-engine")
            .build(),
    ));

    let cache = if config.cache_enabled {
        let mut builder = CacheConfig::<ResponseRecord>::builder()
            .max_entries(config.cache_max_entries)
            .cacheable(|record: &ResponseRecord| record.is_default_cacheable())
            .name("dispatch-engine");
        if let Some(ttl) = config.cache_ttl() {
            builder = builder.ttl(ttl);
        }
        Some(Arc::new(Cache::new(builder.build())))
    } else {
        None
    };

    let dead_letters = Arc::new(DeadLetterQueue::new(config.dlq_max_size));

    let mut monitor = Monitor::new("dispatch-engine");
    for spec in config.monitor_thresholds.clone() {
        monitor.register_threshold(spec.into_threshold());
    }
    for sink in monitor_sinks {
        monitor.add_sink(sink);
    }

    // Forward alert firing/resolution onto the engine's own event stream so
    // external sinks only need to watch one channel (§6).
    let forwarded_listeners = event_listeners.clone();
    monitor.add_event_listener(FnListener::new(move |event: &MonitorEvent| {
        let mapped = match event {
            MonitorEvent::AlertFiring {
                monitor_name,
                timestamp,
                metric_name,
                ..
            } => EngineEvent::AlertFiring {
                timestamp: *timestamp,
                monitor_name: monitor_name.clone(),
                metric_name: metric_name.clone(),
            },
            MonitorEvent::AlertResolved {
                monitor_name,
                timestamp,
                metric_name,
                ..
            } => EngineEvent::AlertResolved {
                timestamp: *timestamp,
                monitor_name: monitor_name.clone(),
                metric_name: metric_name.clone(),
            },
        };
        forwarded_listeners.emit(&mapped);
    }));

    Arc::new(EngineShared {
        config,
        clock,
        queue,
        token_bucket,
        breakers,
        retry_policy,
        cache,
        dead_letters,
        monitor: Arc::new(monitor),
        transport,
        event_listeners,
        completions: Mutex::new(HashMap::new()),
        dispatched: Mutex::new(HashSet::new()),
        canceled: Mutex::new(HashSet::new()),
        known_origins: Mutex::new(HashSet::new()),
        cancel: CancellationToken::new(),
        in_flight: AtomicUsize::new(0),
    })
}

/// Owns the queue, rate limiter, circuit breakers, cache, retry policy, and
/// monitor, and drives the worker pool that ties them together (§4).
pub struct Coordinator {
    shared: Arc<EngineShared>,
    workers: Mutex<Vec<tokio::task::JoinHandle<()>>>,
    monitor_collector: Mutex<Option<tokio::task::JoinHandle<()>>>,
    metrics_sampler: Mutex<Option<tokio::task::JoinHandle<()>>>,
    expiry_sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Coordinator {
    /// Starts building a coordinator with the real system clock.
    pub fn builder(config: EngineConfig, transport: Arc<dyn Transport>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            transport,
            clock: Arc::new(SystemClock),
            event_listeners: EventListeners::new(),
            monitor_sinks: Vec::new(),
        }
    }

    /// Convenience constructor equivalent to `Coordinator::builder(..).build()`.
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        Self::builder(config, transport).build()
    }

    /// Restores a persisted queue (if configured) and starts the worker
    /// pool plus the background monitor collector.
    pub fn start(&self) -> Result<(), EngineError> {
        self.restore_from_disk()?;

        let mut workers = self.workers.lock().expect("workers mutex poisoned");
        for _ in 0..self.shared.config.max_concurrent_requests {
            workers.push(tokio::spawn(dispatcher::run_worker(Arc::clone(&self.shared))));
        }
        drop(workers);

        let collector = Arc::clone(&self.shared.monitor).spawn_collector(self.shared.config.monitor_collect_interval());
        *self.monitor_collector.lock().expect("monitor collector mutex poisoned") = Some(collector);

        let sampler = spawn_metrics_sampler(Arc::clone(&self.shared), self.shared.config.monitor_collect_interval());
        *self.metrics_sampler.lock().expect("metrics sampler mutex poisoned") = Some(sampler);

        let expiry_sweeper = spawn_expiry_sweeper(Arc::clone(&self.shared), self.shared.config.monitor_collect_interval());
        *self.expiry_sweeper.lock().expect("expiry sweeper mutex poisoned") = Some(expiry_sweeper);

        Ok(())
    }

    /// Signals the queue to drain, waits up to `grace` for in-flight
    /// workers to finish, then cancels outstanding rate-limiter waits and
    /// persists whatever remains in the queue (§4.9, §9).
    pub async fn stop(&self, grace: Duration) {
        self.shared.queue.shutdown();

        let handles = {
            let mut workers = self.workers.lock().expect("workers mutex poisoned");
            std::mem::take(&mut *workers)
        };

        if tokio::time::timeout(grace, join_all(handles)).await.is_err() {
            self.shared.cancel.cancel();
        }

        if let Some(collector) = self
            .monitor_collector
            .lock()
            .expect("monitor collector mutex poisoned")
            .take()
        {
            collector.abort();
        }
        if let Some(sampler) = self.metrics_sampler.lock().expect("metrics sampler mutex poisoned").take() {
            sampler.abort();
        }
        if let Some(sweeper) = self.expiry_sweeper.lock().expect("expiry sweeper mutex poisoned").take() {
            sweeper.abort();
        }

        if let Some(path) = self.shared.config.queue_persist_path.clone() {
            if let Err(err) = self.snapshot_to(&path) {
                tracing::warn!(error = %err, path = %path, "failed to persist queue snapshot on shutdown");
            }
        }
    }

    /// Submits one descriptor at `priority`, returning a handle that
    /// resolves once it completes (§4.9, §7).
    pub fn submit(&self, descriptor: RequestDescriptor, priority: Priority) -> Result<SubmitHandle, EngineError> {
        let now = self.shared.clock.now();
        let mut descriptor = descriptor;
        descriptor.priority = priority;
        let id = descriptor.id;
        let expiry_ts = now + self.shared.config.queue_item_ttl();

        let (sender, receiver) = oneshot::channel();
        self.shared
            .completions
            .lock()
            .expect("completions mutex poisoned")
            .insert(id, sender);

        match self.shared.queue.enqueue(id, priority, now, expiry_ts, descriptor) {
            Ok(_) => {
                self.shared.monitor.increment_counter("requests.submitted", 1);
                self.shared.monitor.set_gauge("queue.size", self.shared.queue.len() as f64);
                self.shared.event_listeners.emit(&EngineEvent::Submitted {
                    request_id: id,
                    timestamp: now,
                });
                Ok(SubmitHandle { id, receiver })
            }
            Err(_) => {
                self.shared
                    .completions
                    .lock()
                    .expect("completions mutex poisoned")
                    .remove(&id);
                Err(EngineError::QueueFull)
            }
        }
    }

    /// Submits a batch of descriptors, all at `priority`.
    pub fn submit_batch(
        &self,
        descriptors: Vec<RequestDescriptor>,
        priority: Priority,
    ) -> Vec<Result<SubmitHandle, EngineError>> {
        descriptors.into_iter().map(|d| self.submit(d, priority)).collect()
    }

    /// Cancels a still-queued descriptor. Returns `false` if it has already
    /// been picked up by a worker — cancellation past that point is not
    /// attempted, only best-effort via `Coordinator::stop`'s grace window.
    pub fn cancel(&self, id: Uuid) -> bool {
        let dispatched = self.shared.dispatched.lock().expect("dispatched set mutex poisoned");
        if dispatched.contains(&id) {
            return false;
        }
        drop(dispatched);
        self.shared.canceled.lock().expect("canceled set mutex poisoned").insert(id)
    }

    /// A point-in-time operational snapshot (§4.9).
    pub fn status(&self) -> EngineStatus {
        let breaker_states = self
            .shared
            .known_origins
            .lock()
            .expect("known origins mutex poisoned")
            .iter()
            .map(|origin| (origin.to_string(), self.shared.breakers.state(origin)))
            .collect();

        EngineStatus {
            queue_size: self.shared.queue.len(),
            in_flight: self.shared.in_flight.load(Ordering::Relaxed),
            workers: self.shared.config.max_concurrent_requests,
            breaker_states,
            health: self.shared.monitor.health(),
        }
    }

    /// Entries that exhausted every recovery path, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetterEntry> {
        self.shared.dead_letters.entries()
    }

    fn snapshot_to(&self, path: &str) -> Result<(), EngineError> {
        let now = self.shared.clock.now();
        let entries = self.shared.queue.drain_all();
        let bytes = snapshot::encode(&entries, now);
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Restores a persisted queue on startup. A corrupt snapshot is renamed
    /// aside and startup proceeds with an empty queue (§6, §9) rather than
    /// failing outright.
    fn restore_from_disk(&self) -> Result<(), EngineError> {
        let Some(path) = self.shared.config.queue_persist_path.clone() else {
            return Ok(());
        };
        if !std::path::Path::new(&path).exists() {
            return Ok(());
        }

        let bytes = std::fs::read(&path)?;
        let now = self.shared.clock.now();
        match snapshot::decode(&bytes, now) {
            Ok(entries) => self.shared.queue.restore_all(entries).map_err(|_| EngineError::QueueFull),
            Err(reason) => {
                let corrupt_path = format!("{path}.corrupt");
                let _ = std::fs::rename(&path, &corrupt_path);
                tracing::warn!(
                    reason,
                    original = %path,
                    renamed = %corrupt_path,
                    "queue snapshot corrupt, starting with an empty queue"
                );
                Ok(())
            }
        }
    }
}

async fn join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

/// Periodically sweeps the queue for entries that crossed their wall-clock
/// expiry while still waiting on a future `next_eligible_ts` (a delayed
/// retry, say) — without this, such an entry would sit unexamined until its
/// delay elapsed, since `dequeue_ready` only checks expiry for entries it
/// actually hands to a worker (§4.1's `purge_expired`, §4.6 step 1).
fn spawn_expiry_sweeper(shared: Arc<EngineShared>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = shared.clock.now();
            for entry in shared.queue.purge_expired(now) {
                let total_wall = now.saturating_duration_since(entry.payload.submitted_at);
                dispatcher::dead_letter(&shared, &entry.payload, entry.attempt, crate::response::Outcome::Expired, total_wall);
            }
        }
    })
}

fn spawn_metrics_sampler(shared: Arc<EngineShared>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            shared.monitor.set_gauge("queue.size", shared.queue.len() as f64);
            shared.monitor.set_gauge("inflight", shared.in_flight.load(Ordering::Relaxed) as f64);

            let open_count = shared
                .known_origins
                .lock()
                .expect("known origins mutex poisoned")
                .iter()
                .filter(|origin| shared.breakers.state(origin) == CircuitState::Open)
                .count();
            shared.monitor.set_gauge("breaker.open_count", open_count as f64);
        }
    })
}
