use crate::integration_tests::core::*;
use crate::integration_tests::test_cases::shared::CreateUsersTestCase;
use crate::{ContactStatus, MurmurError};
use async_trait::async_trait;

pub struct SendContactRequestTestCase {
    sender: String,
    recipient_email: String,
    expect_error: Option<fn(&MurmurError) -> bool>,
}

impl SendContactRequestTestCase {
    pub fn new(sender: &str, recipient: &str) -> Self {
        Self::to_email(sender, &CreateUsersTestCase::email_for(recipient))
    }

    pub fn to_email(sender: &str, email: &str) -> Self {
        Self {
            sender: sender.to_string(),
            recipient_email: email.to_string(),
            expect_error: None,
        }
    }

    /// Expect the request to be refused with an error matching `matcher`.
    pub fn expect_error(mut self, matcher: fn(&MurmurError) -> bool) -> Self {
        self.expect_error = Some(matcher);
        self
    }
}

#[async_trait]
impl TestCase for SendContactRequestTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        tracing::info!(
            "'{}' sending contact request to {}...",
            self.sender,
            self.recipient_email
        );

        let client = context.get_client(&self.sender)?;
        let result = client.send_contact_request(&self.recipient_email).await;

        match (result, self.expect_error) {
            (Ok(contact), None) => {
                assert_eq!(contact.status, ContactStatus::Pending);
                assert!(contact.initiator);
                tracing::info!("✓ Contact request sent to {}", contact.display_name);
                Ok(())
            }
            (Err(e), Some(matcher)) if matcher(&e) => {
                tracing::info!("✓ Contact request correctly refused: {}", e);
                Ok(())
            }
            (Ok(_), Some(_)) => Err(MurmurError::Other(anyhow::anyhow!(
                "Expected contact request to {} to fail, but it succeeded",
                self.recipient_email
            ))),
            (Err(e), _) => Err(e),
        }
    }
}
