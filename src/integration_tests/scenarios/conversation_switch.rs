use crate::integration_tests::{
    core::*,
    test_cases::{message_sync::*, shared::*},
};
use crate::MurmurError;
use async_trait::async_trait;

pub struct ConversationSwitchScenario {
    context: ScenarioContext,
}

#[async_trait]
impl Scenario for ConversationSwitchScenario {
    const NAME: &'static str = "conversation-switch";

    fn new(context: ScenarioContext) -> Self {
        Self { context }
    }

    fn context(&self) -> &ScenarioContext {
        &self.context
    }

    async fn run_scenario(&mut self) -> Result<(), MurmurError> {
        let batch_size = self.context.config.sync.batch_size;

        CreateUsersTestCase::with_names(vec!["alice", "bob", "carol"])
            .execute(&mut self.context)
            .await?;

        SeedHistoryTestCase::new("bob", "alice", batch_size + 15)
            .execute(&mut self.context)
            .await?;

        SeedHistoryTestCase::new("carol", "alice", 3)
            .execute(&mut self.context)
            .await?;

        OpenConversationTestCase::new("alice", "bob")
            .execute(&mut self.context)
            .await?;

        VerifyViewTestCase::new("alice")
            .expect_message_count(batch_size)
            .expect_has_more(true)
            .execute(&mut self.context)
            .await?;

        SwitchDuringFetchTestCase::new("alice", "carol")
            .execute(&mut self.context)
            .await?;

        VerifyViewTestCase::new("alice")
            .expect_message_count(3)
            .expect_has_more(false)
            .execute(&mut self.context)
            .await?;

        // Coming back starts over from the newest window
        OpenConversationTestCase::new("alice", "bob")
            .execute(&mut self.context)
            .await?;

        VerifyViewTestCase::new("alice")
            .expect_message_count(batch_size)
            .expect_has_more(true)
            .execute(&mut self.context)
            .await?;

        Ok(())
    }
}
