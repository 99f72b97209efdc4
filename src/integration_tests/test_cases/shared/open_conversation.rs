use crate::integration_tests::core::*;
use crate::{ConversationView, Murmur, MurmurError};
use async_trait::async_trait;
use std::time::Duration;

/// Opens the conversation between `user` and `with_user` on `user`'s client and
/// waits for the initial load.
pub struct OpenConversationTestCase {
    user: String,
    with_user: String,
    conversation_key: Option<String>,
}

impl OpenConversationTestCase {
    pub fn new(user: &str, with_user: &str) -> Self {
        Self {
            user: user.to_string(),
            with_user: with_user.to_string(),
            conversation_key: None,
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.conversation_key = Some(key.to_string());
        self
    }
}

/// Polls the active view of `client` until `predicate` holds.
pub async fn wait_for_view<F>(
    client: &Murmur,
    timeout: Duration,
    predicate: F,
) -> Result<ConversationView, MurmurError>
where
    F: Fn(&ConversationView) -> bool + Send,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(view) = client.current_view().await {
            if predicate(&view) {
                return Ok(view);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(MurmurError::Other(anyhow::anyhow!(
                "Timed out after {:?} waiting for the conversation view",
                timeout
            )));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[async_trait]
impl TestCase for OpenConversationTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        let client = context.get_client(&self.user)?;
        let other = context.get_identity(&self.with_user)?.id.clone();

        let conversation_id = client.open_conversation_with(&other).await?;
        let view = wait_for_view(&client, Duration::from_secs(5), |v| !v.loading).await?;

        assert_eq!(view.conversation_id, conversation_id);
        tracing::info!(
            "✓ '{}' opened conversation {} with {} messages loaded",
            self.user,
            conversation_id,
            view.message_count
        );

        if let Some(key) = &self.conversation_key {
            context.add_conversation(key, conversation_id);
        }
        Ok(())
    }
}
