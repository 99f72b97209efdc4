use crate::integration_tests::core::*;
use crate::{ContactStatus, MurmurError};
use async_trait::async_trait;

/// Responds to a pending request and checks that both sides agree on the outcome.
pub struct RespondContactRequestTestCase {
    responder: String,
    requester: String,
    accept: bool,
}

impl RespondContactRequestTestCase {
    pub fn accept(responder: &str, requester: &str) -> Self {
        Self {
            responder: responder.to_string(),
            requester: requester.to_string(),
            accept: true,
        }
    }

    pub fn reject(responder: &str, requester: &str) -> Self {
        Self {
            accept: false,
            ..Self::accept(responder, requester)
        }
    }
}

#[async_trait]
impl TestCase for RespondContactRequestTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        let responder = context.get_client(&self.responder)?;
        let requester = context.get_client(&self.requester)?;
        let responder_id = context.get_identity(&self.responder)?.id.clone();
        let requester_id = context.get_identity(&self.requester)?.id.clone();

        let pending = responder.pending_contact_requests().await?;
        assert!(
            pending.iter().any(|c| c.id == requester_id),
            "'{}' has no pending request from '{}'",
            self.responder,
            self.requester
        );

        let status = responder
            .respond_to_contact_request(&requester_id, self.accept)
            .await?;
        let expected = if self.accept {
            ContactStatus::Accepted
        } else {
            ContactStatus::Rejected
        };
        assert_eq!(status, expected);

        let on_responder = responder.contact(&requester_id).await?.ok_or(MurmurError::ContactNotFound)?;
        let on_requester = requester.contact(&responder_id).await?.ok_or(MurmurError::ContactNotFound)?;
        assert_eq!(on_responder.status, expected);
        assert_eq!(on_requester.status, expected);

        tracing::info!(
            "✓ '{}' {} '{}', both records now {}",
            self.responder,
            if self.accept { "accepted" } else { "rejected" },
            self.requester,
            expected
        );
        Ok(())
    }
}
