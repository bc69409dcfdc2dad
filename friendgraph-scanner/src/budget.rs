use crate::error::{Result, ScanError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Process-wide allowance for upstream requests.
///
/// Caps the number of requests in flight and spaces request starts at least
/// `spacing` apart. Clones share the same allowance, so every crawl running
/// in the process draws from one quota.
#[derive(Clone)]
pub struct RequestBudget {
    permits: Arc<Semaphore>,
    spacing: Duration,
    next_slot: Arc<Mutex<Instant>>,
}

impl RequestBudget {
    pub fn new(max_in_flight: usize, spacing: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            spacing,
            next_slot: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Semaphore::MAX_PERMITS, Duration::ZERO)
    }

    /// Waits for a free slot. The request may start once this returns and
    /// counts against the in-flight cap until the permit is dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ScanError::Other("request budget closed".to_string()))?;

        if !self.spacing.is_zero() {
            let start_at = {
                let mut next_slot = self.next_slot.lock().await;
                let slot = (*next_slot).max(Instant::now());
                *next_slot = slot + self.spacing;
                slot
            };
            tokio::time::sleep_until(start_at).await;
        }

        Ok(permit)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for RequestBudget {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(50))
    }
}
