//! Bounded blocking pool for CPU-bound model fits.
//!
//! Fits run on tokio's blocking threads behind a semaphore, so ingestion and
//! broadcast tasks on the async workers are never starved. Each fit has a
//! deadline; a fit that misses it is abandoned and the caller falls back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::ForecastError;

#[derive(Debug, Clone)]
pub struct FitPool {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl FitPool {
    /// `workers = 0` sizes the pool to half the available cores (at least one).
    #[must_use]
    pub fn new(workers: usize, timeout: Duration) -> Self {
        let workers = if workers == 0 {
            (num_cpus::get() / 2).max(1)
        } else {
            workers
        };
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            timeout,
        }
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `job` on the pool, waiting for a free worker first.
    ///
    /// The deadline covers both the wait and the fit.
    pub async fn run<T, F>(&self, job: F) -> Result<T, ForecastError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let task = async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|_| ForecastError::ModelFit {
                    model: "pool",
                    reason: "fit pool closed".into(),
                })?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job()
            })
            .await
            .map_err(|e| ForecastError::ModelFit {
                model: "pool",
                reason: e.to_string(),
            })
        };
        match tokio::time::timeout(self.timeout, task).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Model fit timed out");
                Err(ForecastError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_job_and_returns_value() {
        let pool = FitPool::new(2, Duration::from_secs(5));
        assert_eq!(pool.run(|| 21 * 2).await.unwrap(), 42);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn slow_job_times_out() {
        let pool = FitPool::new(1, Duration::from_millis(20));
        let err = pool
            .run(|| std::thread::sleep(Duration::from_millis(300)))
            .await
            .unwrap_err();
        assert_eq!(err, ForecastError::Timeout(Duration::from_millis(20)));
    }

    #[test]
    fn zero_workers_uses_cpu_count() {
        let pool = FitPool::new(0, Duration::from_secs(1));
        assert!(pool.available() >= 1);
    }
}
