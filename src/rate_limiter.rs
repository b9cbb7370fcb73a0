//! Rate Limiter (C4): a per-provider bounded counting semaphore guarding
//! outbound provider calls, plus a process-wide registry keyed by provider.

use crate::config::Provider;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, SemaphorePermit};

/// Bounded concurrency guard for one provider. Acquire blocks (never
/// drops) when saturated; the returned permit releases on every exit path
/// of the caller's scope, including error and cancellation, since it's
/// RAII (§4.4).
pub struct RateLimiter {
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    in_flight: AtomicUsize,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Acquires a permit, suspending until one is available.
    pub async fn acquire(&self) -> RateLimiterPermit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("rate limiter semaphore never closes");
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        RateLimiterPermit {
            _permit: permit,
            in_flight: &self.in_flight,
        }
    }

    /// Acquires a permit that owns its slot rather than borrowing `self`,
    /// for a caller that must hold the slot across an `.await` boundary
    /// outliving the call that issued the request — a live token stream
    /// handed back to the caller before generation finishes (§4.8.2).
    pub async fn acquire_owned(self: &Arc<Self>) -> OwnedRateLimiterPermit {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("rate limiter semaphore never closes");
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        OwnedRateLimiterPermit {
            _permit: permit,
            limiter: self.clone(),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn current(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Held for the duration of one outbound call; releases the semaphore
/// permit and decrements the in-flight counter on drop.
pub struct RateLimiterPermit<'a> {
    _permit: SemaphorePermit<'a>,
    in_flight: &'a AtomicUsize,
}

impl Drop for RateLimiterPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The owned counterpart to [`RateLimiterPermit`] (see [`RateLimiter::acquire_owned`]).
pub struct OwnedRateLimiterPermit {
    _permit: OwnedSemaphorePermit,
    limiter: Arc<RateLimiter>,
}

impl Drop for OwnedRateLimiterPermit {
    fn drop(&mut self) {
        self.limiter.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Snapshot of one provider's limiter counters (§2.1 supplement).
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterStats {
    pub max_concurrent: usize,
    pub current: usize,
    pub available: usize,
}

/// Process-global map of one [`RateLimiter`] per provider, created lazily
/// on first use and never removed afterward (§9 "guard creation with a
/// one-time initializer, not a re-entrant lock").
#[derive(Default)]
pub struct RateLimiterRegistry {
    limiters: tokio::sync::RwLock<HashMap<Provider, Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the limiter for `provider`, creating it with `default_max`
    /// on first access.
    pub async fn get_or_create(&self, provider: Provider, default_max: usize) -> Arc<RateLimiter> {
        if let Some(limiter) = self.limiters.read().await.get(&provider) {
            return limiter.clone();
        }
        let mut limiters = self.limiters.write().await;
        limiters
            .entry(provider)
            .or_insert_with(|| Arc::new(RateLimiter::new(default_max)))
            .clone()
    }

    /// Counters for every provider that has had a limiter created so far.
    pub async fn stats(&self) -> HashMap<Provider, RateLimiterStats> {
        self.limiters
            .read()
            .await
            .iter()
            .map(|(provider, limiter)| {
                (
                    *provider,
                    RateLimiterStats {
                        max_concurrent: limiter.max_concurrent(),
                        current: limiter.current(),
                        available: limiter.available(),
                    },
                )
            })
            .collect()
    }
}
