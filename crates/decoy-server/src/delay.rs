//! Simulated response latency.

use crate::mapping::ResponseDelay;
use async_trait::async_trait;
use std::time::Duration;

impl ResponseDelay {
    /// Delay to apply in milliseconds. Ranges draw uniformly, bounds
    /// inclusive; the loader guarantees `min <= max`.
    pub fn duration_ms(&self) -> u64 {
        match self {
            ResponseDelay::Fixed(ms) => *ms,
            ResponseDelay::Range { min_ms, max_ms } => {
                use rand::Rng;
                rand::thread_rng().gen_range(*min_ms..=*max_ms)
            }
        }
    }
}

/// Delay capability. The production implementation is [`TokioDelayer`];
/// tests substitute fakes.
#[async_trait]
pub trait Delayer: Send + Sync {
    /// Hold the calling request for the configured delay, returning the
    /// duration that was applied. `None` returns immediately.
    async fn apply(&self, delay: Option<&ResponseDelay>) -> Duration;
}

/// Delayer backed by the tokio timer: the wait suspends only the requesting
/// task and is abandoned when the request future is dropped.
pub struct TokioDelayer;

#[async_trait]
impl Delayer for TokioDelayer {
    async fn apply(&self, delay: Option<&ResponseDelay>) -> Duration {
        let duration = Duration::from_millis(delay.map_or(0, ResponseDelay::duration_ms));
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
        duration
    }
}
