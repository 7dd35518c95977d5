//! Request pacing shared by the HTTP providers

use std::time::Duration;
use tokio::sync::{AcquireError, Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;

/// Bounds in-flight requests and keeps a minimum gap between request starts.
#[derive(Debug)]
pub(crate) struct RequestPacer {
    permits: Semaphore,
    last_start: Mutex<Option<Instant>>,
    interval: Duration,
}

impl RequestPacer {
    pub(crate) fn new(max_in_flight: usize, interval: Duration) -> Self {
        Self {
            permits: Semaphore::new(max_in_flight.max(1)),
            last_start: Mutex::new(None),
            interval,
        }
    }

    /// `rpm` in flight, spaced `60s / rpm` apart (never under 10ms).
    pub(crate) fn per_minute(rpm: u32) -> Self {
        let rpm = rpm.max(1);
        let interval_ms = (60_000 / u64::from(rpm)).max(10);
        Self::new(rpm as usize, Duration::from_millis(interval_ms))
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for a slot. The permit must be held for the request's lifetime.
    pub(crate) async fn acquire(&self) -> Result<SemaphorePermit<'_>, AcquireError> {
        let permit = self.permits.acquire().await?;

        let mut last_start = self.last_start.lock().await;
        if let Some(previous) = *last_start {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last_start = Some(Instant::now());

        Ok(permit)
    }
}
