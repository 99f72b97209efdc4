use crate::integration_tests::{core::*, test_cases::shared::*};
use crate::MurmurError;
use async_trait::async_trait;

pub struct ContactsScenario {
    context: ScenarioContext,
}

#[async_trait]
impl Scenario for ContactsScenario {
    const NAME: &'static str = "contacts";

    fn new(context: ScenarioContext) -> Self {
        Self { context }
    }

    fn context(&self) -> &ScenarioContext {
        &self.context
    }

    async fn run_scenario(&mut self) -> Result<(), MurmurError> {
        CreateUsersTestCase::with_names(vec!["alice", "bob", "carol"])
            .execute(&mut self.context)
            .await?;

        SendContactRequestTestCase::to_email("alice", "nobody@murmur.test")
            .expect_error(|e| matches!(e, MurmurError::UserNotFound))
            .execute(&mut self.context)
            .await?;

        SendContactRequestTestCase::new("alice", "alice")
            .expect_error(|e| matches!(e, MurmurError::CannotAddSelf))
            .execute(&mut self.context)
            .await?;

        SendContactRequestTestCase::new("alice", "bob")
            .execute(&mut self.context)
            .await?;

        SendContactRequestTestCase::new("alice", "carol")
            .execute(&mut self.context)
            .await?;

        // Pending requests do not open conversations yet
        VerifyConversationsTestCase::new("alice", vec![])
            .execute(&mut self.context)
            .await?;

        RespondContactRequestTestCase::accept("bob", "alice")
            .execute(&mut self.context)
            .await?;

        RespondContactRequestTestCase::reject("carol", "alice")
            .execute(&mut self.context)
            .await?;

        VerifyConversationsTestCase::new("alice", vec!["bob"])
            .execute(&mut self.context)
            .await?;

        VerifyConversationsTestCase::new("bob", vec!["alice"])
            .execute(&mut self.context)
            .await?;

        VerifyConversationsTestCase::new("carol", vec![])
            .execute(&mut self.context)
            .await?;

        Ok(())
    }
}
