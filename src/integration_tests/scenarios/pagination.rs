use crate::integration_tests::{
    core::*,
    test_cases::{message_sync::*, shared::*},
};
use crate::{MurmurError, UpdateTrigger};
use async_trait::async_trait;

pub struct PaginationScenario {
    context: ScenarioContext,
}

#[async_trait]
impl Scenario for PaginationScenario {
    const NAME: &'static str = "pagination";

    fn new(context: ScenarioContext) -> Self {
        Self { context }
    }

    fn context(&self) -> &ScenarioContext {
        &self.context
    }

    async fn run_scenario(&mut self) -> Result<(), MurmurError> {
        let batch_size = self.context.config.sync.batch_size;
        let history = batch_size * 2 + 10;

        CreateUsersTestCase::with_names(vec!["alice", "bob"])
            .execute(&mut self.context)
            .await?;

        SeedHistoryTestCase::new("bob", "alice", history)
            .execute(&mut self.context)
            .await?;

        OpenConversationTestCase::new("alice", "bob")
            .execute(&mut self.context)
            .await?;

        // An hour between messages spreads one window over more than one day
        VerifyViewTestCase::new("alice")
            .expect_message_count(batch_size)
            .expect_has_more(true)
            .expect_min_day_groups(2)
            .execute(&mut self.context)
            .await?;

        let older_page = VerifyStreamUpdateTestCase::new("alice", UpdateTrigger::OlderPage);
        older_page.subscribe(&self.context).await?;

        LoadOlderTestCase::expect_loaded("alice", batch_size, false)
            .execute(&mut self.context)
            .await?;

        older_page.execute(&mut self.context).await?;

        VerifyViewTestCase::new("alice")
            .expect_message_count(batch_size * 2)
            .expect_has_more(true)
            .execute(&mut self.context)
            .await?;

        LoadOlderTestCase::expect_fetch_failure("alice")
            .execute(&mut self.context)
            .await?;

        VerifyViewTestCase::new("alice")
            .expect_message_count(batch_size * 2)
            .expect_error()
            .execute(&mut self.context)
            .await?;

        // Retrying after a failure picks up where the last page ended
        LoadOlderTestCase::expect_loaded("alice", 10, true)
            .execute(&mut self.context)
            .await?;

        VerifyViewTestCase::new("alice")
            .expect_message_count(history)
            .expect_has_more(false)
            .execute(&mut self.context)
            .await?;

        LoadOlderTestCase::expect_exhausted("alice")
            .execute(&mut self.context)
            .await?;

        Ok(())
    }
}
