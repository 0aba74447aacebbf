/// Retry policy for transient delivery failures
///
/// A recipient gets up to `max_attempts` tries. After a transient failure the
/// worker waits `backoff * 2^(attempt - 1)` (capped at [`MAX_BACKOFF`]) plus up
/// to 25% random jitter, so several workers hitting the same rate-limited
/// server don't retry in lockstep. Permanent failures end the loop at once.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wfahub_worker::retry::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(500));
/// assert_eq!(policy.base_delay(1), Duration::from_millis(500));
/// assert_eq!(policy.base_delay(2), Duration::from_millis(1000));
/// ```

use crate::senders::Sender;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wfahub_shared::mailer::OutgoingEmail;

/// Longest wait between two attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Outcome of delivering one message under a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent { attempts: u32 },
    Failed { attempts: u32, error: String },

    /// Shutdown arrived while waiting to retry; the recipient stays pending
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; zero is treated as one
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the `attempt`-th failed try, before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let spread = base.as_millis() as u64 / 4;
        if spread == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }

    /// Sends `email`, retrying transient failures
    pub async fn deliver(
        &self,
        sender: &dyn Sender,
        email: &OutgoingEmail,
        shutdown: &CancellationToken,
    ) -> Delivery {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match sender.send(email).await {
                Ok(()) => return Delivery::Sent { attempts: attempt },
                Err(e) => e,
            };

            if !error.is_transient() || attempt >= self.max_attempts {
                return Delivery::Failed {
                    attempts: attempt,
                    error: error.to_string(),
                };
            }

            let delay = self.delay_with_jitter(attempt);
            tracing::debug!(
                to = %email.to,
                sender = sender.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient send failure, retrying"
            );

            tokio::select! {
                _ = shutdown.cancelled() => return Delivery::Interrupted,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
