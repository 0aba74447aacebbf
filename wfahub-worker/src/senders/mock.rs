/// Mock sender for tests and demos
///
/// Records every delivered message. Failures are scripted per address and
/// replayed in order, so a test can make one recipient fail transiently twice
/// and then succeed.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use wfahub_worker::senders::{MockSender, SendError, Sender};
/// use wfahub_shared::mailer::OutgoingEmail;
///
/// # async fn example() {
/// let sender = Arc::new(MockSender::new());
/// sender.fail_next("bo@example.com", SendError::Transient("421 try later".into()));
///
/// let email = OutgoingEmail::html("bo@example.com", "Hi", "<p>Hi</p>");
/// assert!(sender.send(&email).await.is_err());
/// assert!(sender.send(&email).await.is_ok());
/// assert_eq!(sender.sent().len(), 1);
/// # }
/// ```

use crate::senders::{SendError, SendResult, Sender, SenderError, SenderProvider};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use wfahub_shared::mailer::OutgoingEmail;
use wfahub_shared::models::bulk_campaign::BulkCampaign;

#[derive(Default)]
pub struct MockSender {
    sent: Mutex<Vec<OutgoingEmail>>,
    attempts: Mutex<HashMap<String, u32>>,
    failures: Mutex<HashMap<String, VecDeque<SendError>>>,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next send to `address` fail with `error`
    pub fn fail_next(&self, address: &str, error: SendError) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(address.to_lowercase())
            .or_default()
            .push_back(error);
    }

    /// Makes every send to `address` fail permanently
    pub fn reject(&self, address: &str, times: usize) {
        for _ in 0..times {
            self.fail_next(address, SendError::Permanent(format!("550 {} rejected", address)));
        }
    }

    /// Messages delivered so far
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Send calls made for `address`, failed ones included
    pub fn attempts(&self, address: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&address.to_lowercase())
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Sender for MockSender {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, email: &OutgoingEmail) -> SendResult<()> {
        let key = email.to.to_lowercase();
        *self
            .attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.clone())
            .or_insert(0) += 1;

        let scripted = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email.clone());
        Ok(())
    }
}

/// Hands out one shared mock, or reports no configuration when empty
#[derive(Clone, Default)]
pub struct MockSenderProvider {
    sender: Option<Arc<MockSender>>,
}

impl MockSenderProvider {
    pub fn new(sender: Arc<MockSender>) -> Self {
        MockSenderProvider {
            sender: Some(sender),
        }
    }

    /// A provider that behaves like a system with no SMTP configuration
    pub fn unconfigured() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SenderProvider for MockSenderProvider {
    async fn sender_for(&self, _campaign: &BulkCampaign) -> Result<Arc<dyn Sender>, SenderError> {
        match &self.sender {
            Some(sender) => Ok(sender.clone()),
            None => Err(SenderError::NoConfiguration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail::html(to, "Subject", "<p>Body</p>")
    }

    #[tokio::test]
    async fn test_records_deliveries() {
        let sender = MockSender::new();
        sender.send(&email("ana@example.com")).await.unwrap();
        sender.send(&email("bo@example.com")).await.unwrap();

        let sent: Vec<String> = sender.sent().into_iter().map(|e| e.to).collect();
        assert_eq!(sent, vec!["ana@example.com", "bo@example.com"]);
    }

    #[tokio::test]
    async fn test_scripted_failures_replay_in_order() {
        let sender = MockSender::new();
        sender.fail_next("ana@example.com", SendError::Transient("421".to_string()));
        sender.fail_next("ana@example.com", SendError::Permanent("550".to_string()));

        let target = email("Ana@Example.com");
        assert_eq!(sender.send(&target).await, Err(SendError::Transient("421".to_string())));
        assert_eq!(sender.send(&target).await, Err(SendError::Permanent("550".to_string())));
        assert!(sender.send(&target).await.is_ok());

        assert_eq!(sender.attempts("ana@example.com"), 3);
        assert_eq!(sender.sent().len(), 1);
    }
}
