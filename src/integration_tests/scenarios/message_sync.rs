use crate::integration_tests::{
    core::*,
    test_cases::{message_sync::*, shared::*},
};
use crate::{MurmurError, ScrollAction, UpdateTrigger};
use async_trait::async_trait;

pub struct MessageSyncScenario {
    context: ScenarioContext,
}

#[async_trait]
impl Scenario for MessageSyncScenario {
    const NAME: &'static str = "message-sync";

    fn new(context: ScenarioContext) -> Self {
        Self { context }
    }

    fn context(&self) -> &ScenarioContext {
        &self.context
    }

    async fn run_scenario(&mut self) -> Result<(), MurmurError> {
        CreateUsersTestCase::with_names(vec!["alice", "bob"])
            .execute(&mut self.context)
            .await?;

        SendContactRequestTestCase::new("alice", "bob")
            .execute(&mut self.context)
            .await?;

        RespondContactRequestTestCase::accept("bob", "alice")
            .execute(&mut self.context)
            .await?;

        OpenConversationTestCase::new("alice", "bob")
            .with_key("alice_bob")
            .execute(&mut self.context)
            .await?;

        OpenConversationTestCase::new("bob", "alice")
            .execute(&mut self.context)
            .await?;

        VerifyViewTestCase::new("bob")
            .expect_message_count(0)
            .expect_has_more(false)
            .execute(&mut self.context)
            .await?;

        // Bob sits at the bottom, so a new message scrolls into view
        let first_update = VerifyStreamUpdateTestCase::new("bob", UpdateTrigger::LiveBatch)
            .expect_scroll(ScrollAction::ScrollToBottom)
            .expect_message_key("greeting");
        first_update.subscribe(&self.context).await?;

        SendMessageTestCase::basic()
            .with_sender("alice")
            .with_text("Hi Bob!")
            .with_message_id_key("greeting")
            .execute(&mut self.context)
            .await?;

        first_update.execute(&mut self.context).await?;

        VerifyViewTestCase::new("alice")
            .expect_message_count(1)
            .expect_message("greeting")
            .execute(&mut self.context)
            .await?;

        // Once Bob scrolls up, new messages are announced instead
        ReportViewportTestCase::scrolled_up("bob")
            .execute(&mut self.context)
            .await?;

        let announced = VerifyStreamUpdateTestCase::new("bob", UpdateTrigger::LiveBatch)
            .expect_scroll(ScrollAction::ShowNewMessages { count: 1 })
            .expect_message_key("reply");
        announced.subscribe(&self.context).await?;

        SendMessageTestCase::basic()
            .with_sender("alice")
            .with_text("Are you there?")
            .with_message_id_key("reply")
            .execute(&mut self.context)
            .await?;

        announced.execute(&mut self.context).await?;

        ReportViewportTestCase::at_bottom("bob")
            .execute(&mut self.context)
            .await?;

        VerifyViewTestCase::new("bob")
            .expect_message_count(2)
            .expect_message("reply")
            .execute(&mut self.context)
            .await?;

        Ok(())
    }
}
