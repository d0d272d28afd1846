use std::time::Duration;
use tokio::time::Instant;

/// Batch pacing for the generation APIs: after every `batch` requests, sleep
/// out whatever is left of the current window before continuing.
pub struct Pacer {
    batch: usize,
    window: Duration,
    sent: usize,
    window_start: Instant,
}

impl Pacer {
    pub fn new(batch: usize, window: Duration) -> Self {
        Self {
            batch,
            window,
            sent: 0,
            window_start: Instant::now(),
        }
    }

    /// Call before each request.
    pub async fn pace(&mut self) {
        if self.sent > 0 && self.sent % self.batch == 0 {
            let elapsed = self.window_start.elapsed();
            if elapsed < self.window {
                let wait = self.window - elapsed;
                tracing::info!("Pacing: waiting {:.1}s before next batch", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
            }
            self.window_start = Instant::now();
        }
        self.sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn waits_out_the_window_at_each_batch_boundary() {
        let mut pacer = Pacer::new(2, Duration::from_secs(60));
        let start = Instant::now();

        pacer.pace().await;
        pacer.pace().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        // Third request crosses the batch boundary and pays the window.
        pacer.pace().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_batches_do_not_sleep() {
        let mut pacer = Pacer::new(2, Duration::from_secs(60));

        pacer.pace().await;
        pacer.pace().await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let before = Instant::now();
        pacer.pace().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
