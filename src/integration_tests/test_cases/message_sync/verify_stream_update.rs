use crate::integration_tests::core::*;
use crate::{BatchUpdate, MurmurError, ScrollAction, UpdateTrigger};
use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

/// Verifies that a view update with the expected trigger reaches a subscriber.
///
/// Two phases: call `subscribe()` first, perform the action that should
/// produce the update, then call `execute()`. Updates with other triggers
/// received in between are skipped.
pub struct VerifyStreamUpdateTestCase {
    user: String,
    expected_trigger: UpdateTrigger,
    expected_scroll: Option<ScrollAction>,
    expected_message_key: Option<String>,
    receiver: Mutex<Option<broadcast::Receiver<BatchUpdate>>>,
}

impl VerifyStreamUpdateTestCase {
    pub fn new(user: &str, expected_trigger: UpdateTrigger) -> Self {
        Self {
            user: user.to_string(),
            expected_trigger,
            expected_scroll: None,
            expected_message_key: None,
            receiver: Mutex::new(None),
        }
    }

    pub fn expect_scroll(mut self, scroll: ScrollAction) -> Self {
        self.expected_scroll = Some(scroll);
        self
    }

    pub fn expect_message_key(mut self, key: &str) -> Self {
        self.expected_message_key = Some(key.to_string());
        self
    }

    /// Subscribe to the client's updates. Must be called before `execute()`.
    pub async fn subscribe(&self, context: &ScenarioContext) -> Result<(), MurmurError> {
        let client = context.get_client(&self.user)?;
        let subscription = client.on_batch_update().await;
        *self.receiver.lock().await = Some(subscription.updates);

        tracing::info!(
            "Subscribed to '{}', waiting for {:?} update",
            self.user,
            self.expected_trigger
        );
        Ok(())
    }
}

#[async_trait]
impl TestCase for VerifyStreamUpdateTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        let mut guard = self.receiver.lock().await;
        let receiver = guard.as_mut().ok_or_else(|| {
            MurmurError::Other(anyhow::anyhow!(
                "VerifyStreamUpdateTestCase: subscribe() must be called before run()"
            ))
        })?;

        let update = tokio::time::timeout(tokio::time::Duration::from_secs(5), async {
            loop {
                match receiver.recv().await {
                    Ok(update) if update.trigger == self.expected_trigger => return Ok(update),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => return Err(e),
                }
            }
        })
        .await
        .map_err(|_| {
            MurmurError::Other(anyhow::anyhow!(
                "Timeout waiting for {:?} update",
                self.expected_trigger
            ))
        })?
        .map_err(|e| MurmurError::Other(anyhow::anyhow!("Failed to receive update: {}", e)))?;

        tracing::info!("✓ Received expected trigger: {:?}", update.trigger);

        if let Some(scroll) = &self.expected_scroll {
            assert_eq!(&update.scroll, scroll, "Unexpected scroll action");
            tracing::info!("✓ Scroll action is {:?}", update.scroll);
        }

        if let Some(key) = &self.expected_message_key {
            let expected_id = context.get_message_id(key)?;
            assert!(
                update.view.messages().any(|m| &m.id == expected_id),
                "Update does not contain message '{}'",
                key
            );
            tracing::info!("✓ Update contains message '{}'", key);
        }

        Ok(())
    }
}
