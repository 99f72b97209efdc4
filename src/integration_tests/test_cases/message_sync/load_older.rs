use crate::integration_tests::core::*;
use crate::{LoadOlderOutcome, MurmurError};
use async_trait::async_trait;

enum Expectation {
    Loaded { fetched: usize, exhausted: bool },
    Exhausted,
    FetchFailure,
}

pub struct LoadOlderTestCase {
    user: String,
    expectation: Expectation,
}

impl LoadOlderTestCase {
    pub fn expect_loaded(user: &str, fetched: usize, exhausted: bool) -> Self {
        Self {
            user: user.to_string(),
            expectation: Expectation::Loaded { fetched, exhausted },
        }
    }

    /// Expect a no-op: pagination already reached the start of the conversation.
    pub fn expect_exhausted(user: &str) -> Self {
        Self {
            user: user.to_string(),
            expectation: Expectation::Exhausted,
        }
    }

    /// Injects a backend failure and expects it to surface without losing messages.
    pub fn expect_fetch_failure(user: &str) -> Self {
        Self {
            user: user.to_string(),
            expectation: Expectation::FetchFailure,
        }
    }
}

#[async_trait]
impl TestCase for LoadOlderTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        let client = context.get_client(&self.user)?;
        let before = client
            .current_view()
            .await
            .ok_or(MurmurError::NoActiveConversation)?;
        let fetches_before = context.store.fetch_count();

        match self.expectation {
            Expectation::Loaded { fetched, exhausted } => {
                let outcome = client.load_older().await?;
                assert_eq!(outcome, LoadOlderOutcome::Loaded { fetched, exhausted });
                assert_eq!(context.store.fetch_count(), fetches_before + 1);
                tracing::info!("✓ Loaded {} older messages (exhausted: {})", fetched, exhausted);
            }
            Expectation::Exhausted => {
                let outcome = client.load_older().await?;
                assert_eq!(outcome, LoadOlderOutcome::Exhausted);
                assert_eq!(
                    context.store.fetch_count(),
                    fetches_before,
                    "An exhausted conversation must not issue a fetch"
                );
                tracing::info!("✓ Load older was a no-op on an exhausted conversation");
            }
            Expectation::FetchFailure => {
                context
                    .store
                    .fail_next_fetch(crate::BackendError::Unavailable("injected".to_string()));
                match client.load_older().await {
                    Err(MurmurError::PaginationFetch(reason)) => {
                        tracing::info!("✓ Pagination failure surfaced: {}", reason)
                    }
                    other => {
                        return Err(MurmurError::Other(anyhow::anyhow!(
                            "Expected a pagination failure, got {:?}",
                            other
                        )));
                    }
                }
                let after = client
                    .current_view()
                    .await
                    .ok_or(MurmurError::NoActiveConversation)?;
                assert_eq!(after.message_count, before.message_count);
            }
        }
        Ok(())
    }
}
