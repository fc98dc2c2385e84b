//! Call budget: at most `calls` dispatches in any rolling `period`.
//!
//! The budget keeps a log of recent dispatch instants. Waiters queue on a
//! tokio mutex, which hands the lock out in request order, so calls are
//! admitted FIFO and the check-and-take is atomic across tasks.

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateLimit;
use crate::error::{Error, Result};

#[derive(Debug)]
struct Window {
    issued: VecDeque<Instant>,
}

impl Window {
    /// Takes a slot at `now`, or reports how long until one frees up.
    fn try_take(&mut self, limit: &RateLimit, now: Instant) -> Result<(), Duration> {
        while let Some(&oldest) = self.issued.front() {
            if now.duration_since(oldest) >= limit.period {
                self.issued.pop_front();
            } else {
                break;
            }
        }

        if self.issued.len() < limit.calls {
            self.issued.push_back(now);
            return Ok(());
        }

        // Non-empty: len >= calls >= 1.
        let oldest = self.issued[0];
        Err(limit.period - now.duration_since(oldest))
    }
}

#[derive(Debug)]
pub struct CallBudget {
    limit: RateLimit,
    window: Mutex<Window>,
}

impl CallBudget {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            window: Mutex::new(Window {
                issued: VecDeque::with_capacity(limit.calls),
            }),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Waits until a slot is free and takes it.
    ///
    /// The lock is held while sleeping so later callers cannot overtake.
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;
        loop {
            match window.try_take(&self.limit, Instant::now()) {
                Ok(()) => return,
                Err(wait) => {
                    debug!("Call budget exhausted, waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Takes a slot without waiting.
    ///
    /// Fails with `RateLimitExceeded` when the budget is spent or another
    /// caller is already queued for it.
    pub fn try_acquire(&self) -> Result<()> {
        let mut window = self
            .window
            .try_lock()
            .map_err(|_| Error::RateLimitExceeded("another call is waiting for budget".to_string()))?;
        window
            .try_take(&self.limit, Instant::now())
            .map_err(|wait| Error::RateLimitExceeded(format!("next slot in {:?}", wait)))
    }
}
