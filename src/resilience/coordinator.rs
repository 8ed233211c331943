//! Single-flight token refresh.
//!
//! At most one refresh operation exists at any instant. Callers arriving while
//! it runs attach to it and all of them observe the same outcome. The work runs
//! in its own task, so a caller giving up at the shared deadline detaches
//! without cancelling the I/O; a late success still lands in the cache unless a
//! newer operation has written first (every operation carries an epoch).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::token::validate_access_token;
use crate::cache::token_cache::TokenCache;
use crate::errors::TokenError;
use crate::helpers::time::{get_instant, now_u64};
use crate::observability::metrics::get_metrics;
use crate::resilience::retry::RetrySettings;
use crate::sources::{FetchFailure, TokenSource};

pub type RefreshOutcome = Result<String, TokenError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Debug, Error)]
enum AttemptError {
    #[error("{0}")]
    Source(FetchFailure),
    #[error("refreshed token unusable: {0}")]
    Token(TokenError),
}

struct InFlight {
    epoch: u64,
    deadline: Instant,
    operation: SharedRefresh,
}

#[derive(Default)]
struct CoordinatorState {
    in_flight: Option<InFlight>,
    last_epoch: u64,
}

impl CoordinatorState {
    fn release(&mut self, epoch: u64) -> bool {
        if self.in_flight.as_ref().is_some_and(|f| f.epoch == epoch) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }
}

/// Everything one refresh operation needs, moved into its task
#[derive(Clone)]
struct RefreshContext {
    source: Arc<dyn TokenSource>,
    cache: TokenCache,
    retry: RetrySettings,
    grace_seconds: u64,
}

pub struct RefreshCoordinator {
    ctx: RefreshContext,
    timeout: Duration,
    state: Arc<Mutex<CoordinatorState>>,
}

impl RefreshCoordinator {
    pub fn new(
        source: Arc<dyn TokenSource>,
        cache: TokenCache,
        retry: RetrySettings,
        grace_seconds: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            ctx: RefreshContext { source, cache, retry, grace_seconds },
            timeout,
            state: Arc::new(Mutex::new(CoordinatorState::default())),
        }
    }

    /// Obtain a fresh token, starting a refresh or attaching to the running one.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (epoch, deadline, operation) = self.attach_or_start().await;

        match timeout_at(deadline, operation).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let released = lock(&self.state).release(epoch);
                if released {
                    warn!(epoch, "refresh wait timed out, detaching from shared operation");
                    get_metrics().await.refresh_timeouts.inc();
                }
                Err(TokenError::RefreshTimedOut { after: self.timeout })
            }
        }
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.state)
            .in_flight
            .as_ref()
            .is_some_and(|f| f.deadline > Instant::now())
    }

    /// Detach from any running operation and keep it from touching the cache.
    pub async fn reset(&self) {
        let fence = {
            let mut state = lock(&self.state);
            if let Some(in_flight) = state.in_flight.take() {
                debug!(epoch = in_flight.epoch, "abandoning in-flight refresh");
            }
            state.last_epoch += 1;
            state.last_epoch
        };
        self.ctx.cache.fence(fence).await;
    }

    async fn attach_or_start(&self) -> (u64, Instant, SharedRefresh) {
        let metrics = get_metrics().await;
        let mut state = lock(&self.state);

        let now = Instant::now();
        if let Some(in_flight) = &state.in_flight {
            if in_flight.deadline > now {
                debug!(epoch = in_flight.epoch, "waiting for existing refresh to complete");
                metrics.refresh_joined.inc();
                return (in_flight.epoch, in_flight.deadline, in_flight.operation.clone());
            }
            // past its ceiling with nobody left waiting; the task keeps running detached
            warn!(epoch = in_flight.epoch, "in-flight refresh exceeded its deadline, starting a new one");
            metrics.refresh_timeouts.inc();
            state.in_flight = None;
        }

        state.last_epoch += 1;
        let epoch = state.last_epoch;
        let deadline = now + self.timeout;
        info!(epoch, source = self.ctx.source.name(), "starting token refresh flow with retry logic");
        metrics.refresh_operations.inc();

        let task = tokio::spawn(run_refresh(self.ctx.clone(), epoch, Arc::clone(&self.state)));
        let attempts = self.ctx.retry.attempts;
        let operation = async move {
            task.await.unwrap_or_else(|e| {
                error!(epoch, "refresh task failed: {}", e);
                Err(TokenError::RefreshExhausted { attempts })
            })
        }
        .boxed()
        .shared();

        state.in_flight = Some(InFlight { epoch, deadline, operation: operation.clone() });
        (epoch, deadline, operation)
    }
}

async fn run_refresh(ctx: RefreshContext, epoch: u64, state: Arc<Mutex<CoordinatorState>>) -> RefreshOutcome {
    let outcome = ctx
        .retry
        .run_with_retry(|attempt| {
            let ctx = ctx.clone();
            async move { ctx.attempt(epoch, attempt).await }
        })
        .await;

    let result = match outcome {
        Ok(token) => Ok(token),
        Err(_) => {
            ctx.cache.clear_from(epoch).await;
            Err(TokenError::RefreshExhausted { attempts: ctx.retry.attempts })
        }
    };

    lock(&state).release(epoch);
    result
}

impl RefreshContext {
    async fn attempt(&self, epoch: u64, attempt: u32) -> Result<String, AttemptError> {
        let metrics = get_metrics().await;
        let source = self.source.name();
        metrics.refresh_attempts.with_label_values(&[source]).inc();
        let start = get_instant();

        let fetched = self.source.fetch_fresh_token().await;
        metrics
            .refresh_attempt_duration
            .with_label_values(&[source])
            .observe(start.elapsed().as_secs_f64());

        let result = match fetched {
            Ok(token) => match validate_access_token(&token, now_u64(), self.grace_seconds) {
                Ok(claims) => {
                    self.cache.write_from(epoch, token.clone(), claims).await;
                    info!(epoch, attempt, "token refresh succeeded");
                    return Ok(token);
                }
                Err(e) => {
                    metrics.refresh_failures.with_label_values(&[source, "unusable_token"]).inc();
                    Err(AttemptError::Token(e))
                }
            },
            Err(failure) => {
                metrics.refresh_failures.with_label_values(&[source, failure.reason()]).inc();
                Err(AttemptError::Source(failure))
            }
        };

        // stale state must not linger between attempts
        self.cache.clear_from(epoch).await;
        result
    }
}

fn lock(state: &Mutex<CoordinatorState>) -> MutexGuard<'_, CoordinatorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
