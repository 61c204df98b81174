//! Worker pool (§4.6): `max_concurrent_requests` tasks pulling from the
//! shared [`dispatch_queue::PriorityQueue`] and driving each descriptor
//! through cache, breaker, rate limiter, transport, and retry in turn.
//!
//! [`dispatch_queue::PriorityQueue::dequeue_ready`] is a blocking call (a
//! `std::sync::Condvar` wait, not an `.await` point), so each worker parks
//! it on `spawn_blocking` rather than calling it directly from async
//! context — the one place in this crate where a blocking bridge is
//! unavoidable.

use crate::coordinator::EngineShared;
use crate::deadletter::DeadLetterEntry;
use crate::descriptor::RequestDescriptor;
use crate::events::EngineEvent;
use crate::response::{Outcome, ResponseRecord};
use crate::transport::{ErrorKind, TransportOutcome};
use dispatch_circuitbreaker::CircuitState;
use dispatch_core::Origin;
use dispatch_queue::QueueEntry;
use dispatch_retry::{AttemptOutcome, RetryDecision, RetryOverride};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Runs one worker's loop until the queue shuts down and drains.
pub(crate) async fn run_worker(shared: Arc<EngineShared>) {
    loop {
        let queue = Arc::clone(&shared.queue);
        let entry = tokio::task::spawn_blocking(move || queue.dequeue_ready(Instant::now()))
            .await
            .expect("dequeue worker thread panicked");

        let Some(entry) = entry else {
            break;
        };

        let id = entry.id;
        shared
            .dispatched
            .lock()
            .expect("dispatched set mutex poisoned")
            .insert(id);

        let was_canceled = shared
            .canceled
            .lock()
            .expect("canceled set mutex poisoned")
            .remove(&id);

        shared.in_flight.fetch_add(1, Ordering::Relaxed);
        shared
            .monitor
            .set_gauge("queue.size", shared.queue.len() as f64);

        if was_canceled {
            let now = shared.clock.now();
            let total_wall = now.saturating_duration_since(entry.payload.submitted_at);
            shared.event_listeners.emit(&EngineEvent::Failed {
                request_id: id,
                timestamp: now,
                outcome: Outcome::Canceled,
            });
            complete(&shared, id, ResponseRecord::failure(Outcome::Canceled, entry.attempt, total_wall));
        } else {
            process_entry(&shared, entry).await;
        }

        shared.in_flight.fetch_sub(1, Ordering::Relaxed);
        shared
            .dispatched
            .lock()
            .expect("dispatched set mutex poisoned")
            .remove(&id);
    }
}

/// Delivers a descriptor's final record to its waiting `SubmitHandle`, if
/// anyone is still listening (a restored-from-snapshot entry has no
/// corresponding caller, so `remove` finding nothing is a normal case).
fn complete(shared: &EngineShared, id: Uuid, record: ResponseRecord) {
    if let Some(sender) = shared
        .completions
        .lock()
        .expect("completions mutex poisoned")
        .remove(&id)
    {
        let _ = sender.send(record);
    }
}

fn classify_outcome(transport: &TransportOutcome) -> Outcome {
    if let Some(status) = transport.status_code {
        return match status {
            200..=299 => Outcome::Success,
            429 => Outcome::RateLimited,
            _ => Outcome::HttpError,
        };
    }
    match transport.error_kind {
        Some(ErrorKind::Timeout) => Outcome::Timeout,
        Some(ErrorKind::Canceled) => Outcome::Canceled,
        _ => Outcome::TransportError,
    }
}

/// A failure the breaker should count against the origin (§4.4): transport
/// errors, timeouts, and 5xx. 4xx is a client-side defect, not counted.
fn is_breaker_failure(transport: &TransportOutcome) -> bool {
    match transport.error_kind {
        Some(ErrorKind::Canceled) => false,
        Some(_) => true,
        None => matches!(transport.status_code, Some(status) if status >= 500),
    }
}

/// Parses `Retry-After` in either form the glossary allows: a plain integer
/// seconds count, or an HTTP-date (e.g. `Sun, 06 Nov 1994 08:49:37 GMT`) —
/// in which case the delay is the gap between that date and wall-clock now.
fn retry_after_header(headers: &HashMap<String, String>) -> Option<Duration> {
    let value = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("retry-after"))
        .map(|(_, value)| value.trim())?;

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let target = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let target_unix = target.timestamp();
    let now_unix = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Some(Duration::from_secs(target_unix.saturating_sub(now_unix).max(0) as u64))
}

/// The sole caller of `Transport::send` for a given cache key at a given
/// moment (§4.3, §4.6 step 2): breaker admission, rate-limit acquisition,
/// the transport call itself, outcome classification, and breaker
/// bookkeeping all happen here. When `shared.cache` coalesces concurrent
/// misses on the same key via [`dispatch_cache::Cache::get_or_compute`],
/// this function's body is the `compute` future — only the first caller
/// for a key actually runs it, and every other concurrent caller for that
/// key receives the same [`ResponseRecord`] without a second wire call.
async fn perform_attempt(shared: Arc<EngineShared>, descriptor: RequestDescriptor, id: Uuid, attempt: u32) -> ResponseRecord {
    let origin = Origin::from_url(&descriptor.url);
    if let Some(origin) = &origin {
        shared
            .known_origins
            .lock()
            .expect("known origins mutex poisoned")
            .insert(origin.clone());

        if !shared.breakers.admit(origin) {
            let now = shared.clock.now();
            shared.event_listeners.emit(&EngineEvent::BreakerRejected {
                request_id: id,
                timestamp: now,
                origin: origin.to_string(),
            });
            let total_wall = now.saturating_duration_since(descriptor.submitted_at);
            return ResponseRecord::failure(Outcome::CircuitOpen, attempt, total_wall);
        }
    }

    if shared.token_bucket.acquire(1, &shared.cancel).await.is_err() {
        if let Some(origin) = &origin {
            shared.breakers.release_half_open_slot(origin);
        }
        let now = shared.clock.now();
        let total_wall = now.saturating_duration_since(descriptor.submitted_at);
        return ResponseRecord::failure(Outcome::Canceled, attempt, total_wall);
    }

    let deadline = shared.clock.now() + descriptor.timeout;
    let transport_outcome = shared.transport.send(&descriptor, deadline).await;
    let attempt_finished = shared.clock.now();

    shared.event_listeners.emit(&EngineEvent::Attempted {
        request_id: id,
        timestamp: attempt_finished,
        attempt,
        status: transport_outcome.status_code,
    });
    shared
        .monitor
        .record_histogram("request.duration", transport_outcome.elapsed.as_secs_f64());

    let outcome = classify_outcome(&transport_outcome);

    if let Some(origin) = &origin {
        if is_breaker_failure(&transport_outcome) {
            shared.breakers.record_failure(origin);
            if shared.breakers.state(origin) == CircuitState::Open {
                shared.monitor.increment_counter("breaker.opens", 1);
            }
        } else {
            shared.breakers.record_success(origin);
        }
    }

    let total_wall = attempt_finished.saturating_duration_since(descriptor.submitted_at);
    match outcome {
        Outcome::Success => ResponseRecord::success(
            transport_outcome.status_code.expect("success outcome always carries a status"),
            transport_outcome.headers,
            transport_outcome.body,
            attempt,
            total_wall,
            false,
        ),
        other => {
            let mut record = ResponseRecord::failure(other, attempt, total_wall);
            record.status = transport_outcome.status_code;
            record.headers = transport_outcome.headers;
            record
        }
    }
}

/// Drives one dequeued entry through the §4.6 worker loop: cache, breaker,
/// rate limiter, transport, then the success/retry/dead-letter decision.
async fn process_entry(shared: &Arc<EngineShared>, entry: QueueEntry<RequestDescriptor>) {
    let id = entry.id;
    let attempt = entry.attempt;
    let descriptor = entry.payload.clone();
    let now = shared.clock.now();

    // §4.8's `queue.wait` histogram: time this entry spent ready and
    // waiting on a worker, i.e. since it last became eligible (not since
    // original submission — a retried entry's wait resets at
    // `next_eligible_ts` each time it's reinserted).
    shared
        .monitor
        .record_histogram("queue.wait", now.saturating_duration_since(entry.next_eligible_ts).as_secs_f64());

    shared.event_listeners.emit(&EngineEvent::Dequeued {
        request_id: id,
        timestamp: now,
        attempt,
    });

    if entry.expiry_ts <= now {
        let total_wall = now.saturating_duration_since(descriptor.submitted_at);
        dead_letter(shared, &descriptor, attempt, Outcome::Expired, total_wall);
        return;
    }

    let cache_key = descriptor.cache_key();
    let record = if let Some(cache) = shared.cache.as_ref() {
        if let Some(mut cached) = cache.get(&cache_key, now) {
            shared.monitor.increment_counter("cache.hits", 1);
            shared.event_listeners.emit(&EngineEvent::CacheHit {
                request_id: id,
                timestamp: now,
            });
            cached.cache_hit = true;
            complete(shared, id, cached);
            return;
        }
        shared.monitor.increment_counter("cache.misses", 1);

        let live_shared = Arc::clone(shared);
        let live_descriptor = descriptor.clone();
        cache
            .get_or_compute(cache_key, now, move || perform_attempt(live_shared, live_descriptor, id, attempt))
            .await
    } else {
        perform_attempt(Arc::clone(shared), descriptor.clone(), id, attempt).await
    };

    match record.outcome {
        Outcome::Success => {
            shared.monitor.increment_counter("requests.succeeded", 1);
            shared.event_listeners.emit(&EngineEvent::Succeeded {
                request_id: id,
                timestamp: shared.clock.now(),
                attempts: attempt,
            });
            complete(shared, id, record);
        }
        Outcome::CircuitOpen => {
            let total_wall = record.total_wall_time;
            dead_letter(shared, &descriptor, attempt, Outcome::CircuitOpen, total_wall);
        }
        Outcome::Canceled => {
            shared.event_listeners.emit(&EngineEvent::Failed {
                request_id: id,
                timestamp: shared.clock.now(),
                outcome: Outcome::Canceled,
            });
            complete(shared, id, record);
        }
        _ => {
            let origin_label = Origin::from_url(&descriptor.url)
                .map(|origin| origin.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let attempt_outcome = AttemptOutcome {
                status: record.status,
                transport_error: matches!(record.outcome, Outcome::TransportError),
                timed_out: matches!(record.outcome, Outcome::Timeout),
                retry_after: retry_after_header(&record.headers),
            };
            let retry_override = RetryOverride {
                max_retries: descriptor.retry_overrides.max_retries,
                base_delay: descriptor.retry_overrides.base_delay,
                max_delay: descriptor.retry_overrides.max_delay,
            };
            let decision = shared.retry_policy.decide_and_emit_with_override(
                attempt,
                &attempt_outcome,
                &origin_label,
                &shared.clock,
                &retry_override,
            );

            if let RetryDecision::Retry { delay } = decision {
                let next_attempt = attempt + 1;
                let scheduled_at = shared.clock.now();
                shared.monitor.increment_counter("requests.retried", 1);
                shared.event_listeners.emit(&EngineEvent::RetryScheduled {
                    request_id: id,
                    timestamp: scheduled_at,
                    attempt: next_attempt,
                    delay,
                });

                let mut entry = entry;
                entry.attempt = next_attempt;
                if shared.queue.reinsert(entry, scheduled_at + delay).is_err() {
                    let total_wall = scheduled_at.saturating_duration_since(descriptor.submitted_at);
                    dead_letter(shared, &descriptor, next_attempt, record.outcome, total_wall);
                }
            } else {
                dead_letter(shared, &descriptor, attempt, record.outcome, record.total_wall_time);
            }
        }
    }
}

pub(crate) fn dead_letter(shared: &Arc<EngineShared>, descriptor: &RequestDescriptor, attempts: u32, outcome: Outcome, total_wall_time: Duration) {
    shared.monitor.increment_counter("requests.failed", 1);
    shared.dead_letters.push(DeadLetterEntry {
        descriptor: descriptor.clone(),
        outcome,
        attempts,
    });
    let now = shared.clock.now();
    shared.event_listeners.emit(&EngineEvent::Failed {
        request_id: descriptor.id,
        timestamp: now,
        outcome,
    });
    shared.event_listeners.emit(&EngineEvent::DeadLettered {
        request_id: descriptor.id,
        timestamp: now,
        outcome,
    });
    complete(shared, descriptor.id, ResponseRecord::failure(outcome, attempts, total_wall_time));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::coordinator::Coordinator;
    use crate::descriptor::{Method, Priority};
    use crate::transport::test_support::ScriptedTransport;
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    fn scripted(responses: Vec<TransportOutcome>) -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport::new(responses))
    }

    fn ok_200() -> TransportOutcome {
        TransportOutcome::success(200, HashMap::new(), None, Duration::ZERO)
    }

    fn status(code: u16) -> TransportOutcome {
        TransportOutcome::success(code, HashMap::new(), None, Duration::ZERO)
    }

    // Scenario 1 (§8): strict priority order across bands, submitted before
    // any worker starts so dispatch order reflects priority, not arrival
    // order to the worker.
    #[tokio::test]
    async fn dispatches_in_strict_priority_order() {
        let order: Arc<StdMutex<Vec<Uuid>>> = Arc::new(StdMutex::new(Vec::new()));
        let order_clone = Arc::clone(&order);

        let config = EngineConfig::builder().max_concurrent_requests(1).build();
        let transport = scripted(vec![ok_200()]);
        let coordinator = Coordinator::builder(config, transport)
            .on_event(move |event: &EngineEvent| {
                if let EngineEvent::Dequeued { request_id, .. } = event {
                    order_clone.lock().unwrap().push(*request_id);
                }
            })
            .build();

        let now = Instant::now();
        let low = coordinator
            .submit(
                RequestDescriptor::builder(Method::Get, "https://api.example.com/low").build(now),
                Priority::Low,
            )
            .unwrap();
        let critical = coordinator
            .submit(
                RequestDescriptor::builder(Method::Get, "https://api.example.com/critical").build(now),
                Priority::Critical,
            )
            .unwrap();
        let normal = coordinator
            .submit(
                RequestDescriptor::builder(Method::Get, "https://api.example.com/normal").build(now),
                Priority::Normal,
            )
            .unwrap();

        let (low_id, critical_id, normal_id) = (low.id(), critical.id(), normal.id());
        coordinator.start().unwrap();

        low.wait().await.unwrap();
        critical.wait().await.unwrap();
        normal.wait().await.unwrap();

        coordinator.stop(Duration::from_secs(1)).await;

        let observed = order.lock().unwrap().clone();
        assert_eq!(observed, vec![critical_id, normal_id, low_id]);
    }

    // Scenario 2 (§8): the sixth submission to a tripped breaker resolves
    // CIRCUIT_OPEN without ever calling the transport.
    #[tokio::test]
    async fn breaker_trips_and_rejects_without_calling_transport() {
        let transport = scripted(vec![status(500); 5]);
        let config = EngineConfig::builder()
            .max_concurrent_requests(1)
            .breaker_failure_threshold(5)
            .retry_count(0)
            .build();
        let coordinator = Coordinator::new(config, Arc::clone(&transport) as Arc<dyn Transport>);
        coordinator.start().unwrap();

        let now = Instant::now();
        for _ in 0..5 {
            let descriptor = RequestDescriptor::builder(Method::Get, "https://api.example.com/x").build(now);
            let handle = coordinator.submit(descriptor, Priority::Normal).unwrap();
            let record = handle.wait().await.unwrap();
            assert_eq!(record.outcome, Outcome::HttpError);
        }

        let descriptor = RequestDescriptor::builder(Method::Get, "https://api.example.com/x").build(now);
        let handle = coordinator.submit(descriptor, Priority::Normal).unwrap();
        let record = handle.wait().await.unwrap();
        assert_eq!(record.outcome, Outcome::CircuitOpen);
        assert_eq!(transport.call_count(), 5);

        coordinator.stop(Duration::from_secs(1)).await;
    }

    // Scenario 3 (§8): once the breaker's timeout elapses, a probe is
    // admitted; enough successful probes close the circuit again.
    #[tokio::test]
    async fn half_open_probe_recovers_to_closed() {
        let transport = scripted(vec![status(500), ok_200(), ok_200()]);
        let config = EngineConfig::builder()
            .max_concurrent_requests(1)
            .breaker_failure_threshold(1)
            .breaker_timeout(Duration::from_secs(1))
            .breaker_probe_required(2)
            .retry_count(0)
            .build();
        let coordinator = Coordinator::new(config, Arc::clone(&transport) as Arc<dyn Transport>);
        coordinator.start().unwrap();

        let now = Instant::now();
        let opening = coordinator
            .submit(RequestDescriptor::builder(Method::Get, "https://api.example.com/x").build(now), Priority::Normal)
            .unwrap();
        assert_eq!(opening.wait().await.unwrap().outcome, Outcome::HttpError);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        for _ in 0..2 {
            let handle = coordinator
                .submit(RequestDescriptor::builder(Method::Get, "https://api.example.com/x").build(now), Priority::Normal)
                .unwrap();
            assert_eq!(handle.wait().await.unwrap().outcome, Outcome::Success);
        }

        let status = coordinator.status();
        assert_eq!(
            status.breaker_states.get("https://api.example.com:443"),
            Some(&CircuitState::Closed)
        );

        coordinator.stop(Duration::from_secs(1)).await;
    }

    // Scenario 4 (§8): a `Retry-After` header overrides the computed
    // backoff delay; the descriptor eventually succeeds.
    #[tokio::test]
    async fn retry_after_header_drives_the_retry_delay() {
        let mut rate_limited = status(429);
        rate_limited.headers.insert("Retry-After".to_string(), "0".to_string());
        let transport = scripted(vec![rate_limited, ok_200()]);

        let config = EngineConfig::builder()
            .max_concurrent_requests(1)
            .retry_count(1)
            .retry_base_delay(Duration::from_secs(10))
            .build();
        let coordinator = Coordinator::new(config, Arc::clone(&transport) as Arc<dyn Transport>);
        coordinator.start().unwrap();

        let descriptor = RequestDescriptor::builder(Method::Get, "https://api.example.com/x").build(Instant::now());
        let handle = coordinator.submit(descriptor, Priority::Normal).unwrap();
        let record = handle.wait().await.unwrap();

        assert_eq!(record.outcome, Outcome::Success);
        assert_eq!(record.attempts, 2);
        assert_eq!(transport.call_count(), 2);

        coordinator.stop(Duration::from_secs(1)).await;
    }

    // Scenario 6 (§8): concurrent identical requests single-flight onto one
    // wire call.
    #[tokio::test]
    async fn concurrent_identical_requests_single_flight() {
        struct SlowTransport {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl Transport for SlowTransport {
            async fn send(&self, _descriptor: &RequestDescriptor, _deadline: Instant) -> TransportOutcome {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(40)).await;
                TransportOutcome::success(200, HashMap::new(), None, Duration::from_millis(40))
            }
        }

        let transport = Arc::new(SlowTransport { calls: AtomicUsize::new(0) });
        let config = EngineConfig::builder().max_concurrent_requests(20).build();
        let coordinator = Arc::new(Coordinator::new(config, Arc::clone(&transport) as Arc<dyn Transport>));
        coordinator.start().unwrap();

        let now = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..20 {
            let descriptor = RequestDescriptor::builder(Method::Get, "https://api.example.com/shared").build(now);
            handles.push(coordinator.submit(descriptor, Priority::Normal).unwrap());
        }

        for handle in handles {
            let record = handle.wait().await.unwrap();
            assert_eq!(record.outcome, Outcome::Success);
        }

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        coordinator.stop(Duration::from_secs(1)).await;
    }

    // Scenario 5 (§8): the token bucket spreads requests out so wall time
    // grows once the burst is exhausted.
    #[tokio::test]
    async fn rate_limiter_spreads_out_requests_past_the_burst() {
        let transport = scripted(vec![ok_200()]);
        let config = EngineConfig::builder()
            .max_concurrent_requests(20)
            .rate_limit_per_second(20.0)
            .cache_enabled(false)
            .build();
        let coordinator = Arc::new(Coordinator::new(config, Arc::clone(&transport) as Arc<dyn Transport>));
        coordinator.start().unwrap();

        let started = Instant::now();
        let mut handles = Vec::new();
        for i in 0..30 {
            let descriptor =
                RequestDescriptor::builder(Method::Get, format!("https://api.example.com/r{i}")).build(started);
            handles.push(coordinator.submit(descriptor, Priority::Normal).unwrap());
        }

        for handle in handles {
            assert_eq!(handle.wait().await.unwrap().outcome, Outcome::Success);
        }
        let elapsed = started.elapsed();

        // (30 - 20) / 20 == 0.5s of enforced waiting once the burst is spent.
        assert!(elapsed >= Duration::from_millis(450), "elapsed={elapsed:?}");

        coordinator.stop(Duration::from_secs(1)).await;
    }

    #[test]
    fn retry_after_header_parses_seconds() {
        let mut headers = HashMap::new();
        headers.insert("Retry-After".to_string(), "120".to_string());
        assert_eq!(retry_after_header(&headers), Some(Duration::from_secs(120)));
    }

    #[test]
    fn retry_after_header_parses_http_date() {
        let target = std::time::SystemTime::now() + Duration::from_secs(90);
        let unix_secs = target.duration_since(std::time::SystemTime::UNIX_EPOCH).unwrap().as_secs() as i64;
        let date = chrono::DateTime::from_timestamp(unix_secs, 0).unwrap();
        let mut headers = HashMap::new();
        headers.insert("Retry-After".to_string(), date.to_rfc2822());

        let delay = retry_after_header(&headers).expect("http-date should parse");
        // Allow a little slack for wall-clock rounding between the two `now()` calls above.
        assert!(delay >= Duration::from_secs(85) && delay <= Duration::from_secs(95), "delay={delay:?}");
    }

    #[test]
    fn retry_after_header_with_past_http_date_is_zero() {
        let unix_secs = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
            - 3600;
        let date = chrono::DateTime::from_timestamp(unix_secs, 0).unwrap();
        let mut headers = HashMap::new();
        headers.insert("Retry-After".to_string(), date.to_rfc2822());
        assert_eq!(retry_after_header(&headers), Some(Duration::ZERO));
    }

    // A per-descriptor `RetryOverrides.max_retries = Some(0)` must suppress
    // retries even though the engine-wide policy allows them.
    #[tokio::test]
    async fn per_descriptor_retry_override_suppresses_retries() {
        let transport = scripted(vec![status(503), ok_200()]);
        let config = EngineConfig::builder().max_concurrent_requests(1).retry_count(3).build();
        let coordinator = Coordinator::new(config, Arc::clone(&transport) as Arc<dyn Transport>);
        coordinator.start().unwrap();

        let descriptor = RequestDescriptor::builder(Method::Get, "https://api.example.com/x")
            .retry_overrides(crate::descriptor::RetryOverrides {
                max_retries: Some(0),
                base_delay: None,
                max_delay: None,
            })
            .build(Instant::now());
        let handle = coordinator.submit(descriptor, Priority::Normal).unwrap();
        let record = handle.wait().await.unwrap();

        assert_eq!(record.outcome, Outcome::HttpError);
        assert_eq!(record.attempts, 1);
        assert_eq!(transport.call_count(), 1);

        coordinator.stop(Duration::from_secs(1)).await;
    }
}
