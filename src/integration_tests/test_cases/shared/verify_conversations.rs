use crate::integration_tests::core::*;
use crate::MurmurError;
use async_trait::async_trait;

/// Checks which contacts appear in a user's conversation list.
pub struct VerifyConversationsTestCase {
    user: String,
    expected_contacts: Vec<String>,
}

impl VerifyConversationsTestCase {
    pub fn new(user: &str, expected_contacts: Vec<&str>) -> Self {
        Self {
            user: user.to_string(),
            expected_contacts: expected_contacts.into_iter().map(String::from).collect(),
        }
    }
}

#[async_trait]
impl TestCase for VerifyConversationsTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        let client = context.get_client(&self.user)?;
        let conversations = client.conversations().await?;

        let mut expected = Vec::new();
        for name in &self.expected_contacts {
            expected.push(context.get_identity(name)?.id.clone());
        }
        expected.sort();

        let mut actual: Vec<_> = conversations.iter().map(|c| c.contact_id.clone()).collect();
        actual.sort();

        assert_eq!(
            actual, expected,
            "Unexpected conversation list for '{}'",
            self.user
        );
        tracing::info!(
            "✓ '{}' has {} conversations",
            self.user,
            conversations.len()
        );
        Ok(())
    }
}
