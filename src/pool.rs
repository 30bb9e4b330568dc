//! Bounded pool of oracle sessions.
//!
//! At most `capacity` sessions are checked out at once. Sessions are
//! spawned on demand, handed back after a successful query, and dropped
//! (killing the engine process) after a failed or interrupted one.

use std::{
    io,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::{
    error::RankError,
    oracle::{EvaluationOracle, OracleFactory},
    types::Evaluation,
};

struct PoolInner<F: OracleFactory> {
    factory: F,
    idle: Mutex<Vec<F::Session>>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

pub struct OraclePool<F: OracleFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: OracleFactory> Clone for OraclePool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: OracleFactory> OraclePool<F> {
    /// `capacity` is clamped to at least one session.
    pub fn new(factory: F, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(PoolInner {
                factory,
                idle: Mutex::new(Vec::with_capacity(capacity)),
                permits: Arc::new(Semaphore::new(capacity)),
                capacity,
            }),
        }
    }

    /// Sessions currently parked and ready for reuse.
    pub fn idle_count(&self) -> usize {
        self.inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// Wait for a free slot and check out a session, spawning one if none is idle.
    pub async fn acquire(&self) -> Result<PooledOracle<F>, RankError> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| RankError::OracleUnavailable(io::Error::other("oracle pool is closed")))?;

        let parked = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let session = match parked {
            Some(session) => session,
            None => {
                debug!("spawning oracle session");
                self.inner.factory.spawn().await?
            }
        };

        Ok(PooledOracle {
            session: Some(session),
            in_flight: false,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Spawn `count` sessions up front so a broken engine fails at startup.
    pub async fn warm_up(&self, count: usize) -> Result<(), RankError> {
        let mut checked_out = Vec::with_capacity(count);
        for _ in 0..count.min(self.inner.capacity) {
            checked_out.push(self.acquire().await?);
        }
        Ok(())
    }
}

/// Exclusive use of one session. Dropping the guard returns the session
/// to the pool unless its last query failed or never finished.
pub struct PooledOracle<F: OracleFactory> {
    session: Option<F::Session>,
    in_flight: bool,
    pool: Arc<PoolInner<F>>,
    _permit: OwnedSemaphorePermit,
}

impl<F: OracleFactory> PooledOracle<F> {
    pub async fn evaluate(&mut self, fen: &str, depth: u32) -> Result<Evaluation, RankError> {
        let Some(session) = self.session.as_mut() else {
            return Err(RankError::OracleProtocol(
                "session was discarded after a failure".to_string(),
            ));
        };

        self.in_flight = true;
        let result = session.evaluate(fen, depth).await;
        self.in_flight = false;

        if let Err(err) = &result {
            warn!(error = %err, "discarding oracle session");
            self.session = None;
        }
        result
    }

    /// True once a failed query has thrown the session away.
    pub fn is_discarded(&self) -> bool {
        self.session.is_none()
    }
}

impl<F: OracleFactory> Drop for PooledOracle<F> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if self.in_flight {
            // Cancelled mid-query: the engine may still be searching.
            debug!("dropping interrupted oracle session");
            return;
        }
        self.pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session);
    }
}
