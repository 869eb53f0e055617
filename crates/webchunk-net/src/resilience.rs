//! C14: Resilience (spec §4.14). Wraps fetch (and, from `webchunk-ai`, AI
//! calls) in `Bulkhead(Retry(CircuitBreaker(Timeout(op))))`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use webchunk_common::error::PipelineErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerEntry {
    state: Mutex<BreakerState>,
    consecutive_failures: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
}

/// Per-host circuit breaker: opens after `failure_threshold` consecutive
/// failures, allows one probe after `half_open_after`, closes on success.
pub struct CircuitBreaker {
    failure_threshold: u32,
    half_open_after: Duration,
    hosts: DashMap<String, BreakerEntry>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, half_open_after: Duration) -> Self {
        Self {
            failure_threshold,
            half_open_after,
            hosts: DashMap::new(),
        }
    }

    fn entry(&self, host: &str) -> dashmap::mapref::one::Ref<'_, String, BreakerEntry> {
        self.hosts.entry(host.to_string()).or_insert_with(|| BreakerEntry {
            state: Mutex::new(BreakerState::Closed),
            consecutive_failures: AtomicU32::new(0),
            opened_at: Mutex::new(None),
        });
        self.hosts.get(host).unwrap()
    }

    /// Returns `true` if a call should proceed (closed, half-open probe,
    /// or enough time has elapsed since opening to allow a probe).
    fn allow(&self, host: &str) -> bool {
        let entry = self.entry(host);
        let mut state = entry.state.lock().unwrap();
        match *state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let opened_at = entry.opened_at.lock().unwrap();
                if opened_at.map(|t| t.elapsed() >= self.half_open_after).unwrap_or(false) {
                    *state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self, host: &str) {
        let entry = self.entry(host);
        *entry.state.lock().unwrap() = BreakerState::Closed;
        entry.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self, host: &str) {
        let entry = self.entry(host);
        let failures = entry.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = entry.state.lock().unwrap();
        if *state == BreakerState::HalfOpen || failures >= self.failure_threshold {
            *state = BreakerState::Open;
            *entry.opened_at.lock().unwrap() = Some(Instant::now());
            warn!(host, failures, "circuit breaker opened");
        }
    }
}

fn is_transient(kind: &PipelineErrorKind) -> bool {
    match kind {
        PipelineErrorKind::Network(_) | PipelineErrorKind::Timeout => true,
        PipelineErrorKind::HttpStatus { code } => *code >= 500 || *code == 429,
        _ => false,
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let millis = 100u64.saturating_mul(1u64 << attempt.min(20));
    Duration::from_millis(millis.min(30_000))
}

/// Bulkhead: a semaphore bounding concurrent in-flight operations for one
/// logical pool (fetcher, AI, ...).
pub struct Bulkhead {
    semaphore: Semaphore,
}

impl Bulkhead {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Semaphore::new(capacity.max(1)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResilienceStats {
    pub calls: u64,
    pub retries: u64,
    pub circuit_rejections: u64,
}

/// Composes timeout, circuit breaking, retry, and bulkhead around a
/// fallible per-host async operation.
pub struct ResiliencePolicy {
    pub breaker: CircuitBreaker,
    pub bulkhead: Bulkhead,
    pub retry_max_attempts: u32,
    pub timeout: Duration,
    calls: AtomicU64,
    retries: AtomicU64,
    circuit_rejections: AtomicU64,
}

impl ResiliencePolicy {
    pub fn new(
        failure_threshold: u32,
        half_open_after: Duration,
        bulkhead_capacity: usize,
        retry_max_attempts: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            breaker: CircuitBreaker::new(failure_threshold, half_open_after),
            bulkhead: Bulkhead::new(bulkhead_capacity),
            retry_max_attempts,
            timeout,
            calls: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            circuit_rejections: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> ResilienceStats {
        ResilienceStats {
            calls: self.calls.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
        }
    }

    /// `Bulkhead(Retry(CircuitBreaker(Timeout(op))))`.
    pub async fn execute<F, Fut, T>(&self, host: &str, mut op: F) -> Result<T, PipelineErrorKind>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PipelineErrorKind>>,
    {
        let _permit = self
            .bulkhead
            .semaphore
            .acquire()
            .await
            .map_err(|_| PipelineErrorKind::Internal("bulkhead closed".into()))?;

        self.calls.fetch_add(1, Ordering::Relaxed);

        let mut attempt = 0u32;
        loop {
            if !self.breaker.allow(host) {
                self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
                return Err(PipelineErrorKind::Internal(format!(
                    "circuit open for host {host}"
                )));
            }

            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(r) => r,
                Err(_) => Err(PipelineErrorKind::Timeout),
            };

            match result {
                Ok(value) => {
                    self.breaker.record_success(host);
                    return Ok(value);
                }
                Err(kind) => {
                    self.breaker.record_failure(host);
                    if attempt >= self.retry_max_attempts || !is_transient(&kind) {
                        return Err(kind);
                    }
                    let delay = backoff_delay(attempt);
                    debug!(host, attempt, ?delay, "retrying transient failure");
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Per-logical-pool registry, e.g. one `ResiliencePolicy` for the fetcher
/// and one for AI calls, as spec §5 "fine-grained locking keyed by the
/// mutable unit" prescribes for shared state.
pub struct ResilienceRegistry {
    pools: HashMap<&'static str, ResiliencePolicy>,
}

impl ResilienceRegistry {
    pub fn new() -> Self {
        Self { pools: HashMap::new() }
    }

    pub fn register(&mut self, name: &'static str, policy: ResiliencePolicy) {
        self.pools.insert(name, policy);
    }

    pub fn get(&self, name: &str) -> Option<&ResiliencePolicy> {
        self.pools.get(name)
    }
}

impl Default for ResilienceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let policy = ResiliencePolicy::new(5, Duration::from_secs(30), 4, 3, Duration::from_secs(5));
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = policy
            .execute("example.com", move || {
                let attempts = attempts_clone.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::Relaxed);
                    if n < 2 {
                        Err(PipelineErrorKind::Network("boom".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let policy = ResiliencePolicy::new(5, Duration::from_secs(30), 4, 3, Duration::from_secs(5));
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<(), PipelineErrorKind> = policy
            .execute("example.com", move || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::Relaxed);
                    Err(PipelineErrorKind::InvalidInput("bad".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn circuit_opens_after_threshold_and_rejects() {
        let policy = ResiliencePolicy::new(2, Duration::from_secs(30), 4, 0, Duration::from_secs(5));

        for _ in 0..2 {
            let _: Result<(), PipelineErrorKind> = policy
                .execute("flaky.example.com", || async { Err(PipelineErrorKind::Network("x".into())) })
                .await;
        }

        let result: Result<(), PipelineErrorKind> = policy
            .execute("flaky.example.com", || async { Ok(()) })
            .await;

        assert!(result.is_err());
        assert!(policy.stats().circuit_rejections >= 1);
    }
}
