// src/services/limiter.rs

//! Outbound request rate limiting.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovRateLimiter};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

/// Token bucket shared by every fetch in a batch.
///
/// Issues at most one token per `1/qps` seconds with a burst of one, so no
/// tokens are banked while the batch is idle.
pub struct RateLimiter {
    limiter: GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    qps: u32,
}

impl RateLimiter {
    /// Create a limiter issuing `qps` tokens per second.
    pub fn new(qps: u32) -> Result<Self> {
        if qps == 0 {
            return Err(AppError::validation("qps must be > 0"));
        }
        let period = Duration::from_secs(1) / qps;
        let quota = Quota::with_period(period)
            .ok_or_else(|| AppError::validation(format!("qps {qps} is too high")))?
            .allow_burst(NonZeroU32::MIN);

        Ok(Self {
            limiter: GovRateLimiter::direct(quota),
            qps,
        })
    }

    /// Wait for a token.
    ///
    /// Fails with [`AppError::Cancelled`] as soon as `cancel` fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            _ = self.limiter.until_ready() => Ok(()),
        }
    }

    /// Get the configured tokens per second.
    pub fn qps(&self) -> u32 {
        self.qps
    }
}
