use crate::integration_tests::core::*;
use crate::integration_tests::test_cases::shared::wait_for_view;
use crate::{LoadOlderOutcome, MurmurError};
use async_trait::async_trait;
use std::time::Duration;

/// Starts an older-page fetch, switches conversation while it is in flight,
/// and checks that the late response is discarded.
pub struct SwitchDuringFetchTestCase {
    user: String,
    switch_to_user: String,
}

impl SwitchDuringFetchTestCase {
    pub fn new(user: &str, switch_to_user: &str) -> Self {
        Self {
            user: user.to_string(),
            switch_to_user: switch_to_user.to_string(),
        }
    }
}

#[async_trait]
impl TestCase for SwitchDuringFetchTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        let client = context.get_client(&self.user)?;
        let other = context.get_identity(&self.switch_to_user)?.id.clone();

        context.store.hold_fetches();
        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.load_older().await }
        });

        let waited = wait_for_view(&client, Duration::from_secs(5), |v| v.loading_older).await;
        let switched = match waited {
            Ok(_) => client.open_conversation_with(&other).await,
            Err(e) => Err(e),
        };
        context.store.release_fetches();
        let target = switched?;

        let outcome = pending
            .await
            .map_err(|e| MurmurError::Other(anyhow::anyhow!("load_older task failed: {}", e)))??;
        assert_eq!(outcome, LoadOlderOutcome::Abandoned);

        let view = wait_for_view(&client, Duration::from_secs(5), |v| !v.loading).await?;
        assert_eq!(view.conversation_id, target);
        assert!(
            view.messages().all(|m| m.conversation_id == target),
            "Messages from the abandoned conversation leaked into {}",
            target
        );

        tracing::info!(
            "✓ In-flight page discarded after switching to {} ({} messages shown)",
            target,
            view.message_count
        );
        Ok(())
    }
}
