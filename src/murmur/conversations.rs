use serde::{Deserialize, Serialize};

use crate::murmur::Murmur;
use crate::murmur::error::Result;
use crate::types::{ConversationId, UserId};

/// Entry of the conversation list: one per accepted contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub contact_id: UserId,
    /// Display name of the other participant
    pub name: String,
}

impl Murmur {
    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        let identity = self.session().identity()?;
        Ok(self
            .accepted_contacts()
            .await?
            .into_iter()
            .map(|contact| ConversationSummary {
                conversation_id: ConversationId::for_participants(&identity.id, &contact.id),
                contact_id: contact.id,
                name: contact.display_name,
            })
            .collect())
    }

    /// Switches to the conversation shared with `contact_id` and returns its id.
    pub async fn open_conversation_with(&self, contact_id: &UserId) -> Result<ConversationId> {
        let identity = self.session().identity()?;
        let conversation_id = ConversationId::for_participants(&identity.id, contact_id);
        self.switch_conversation(conversation_id.clone()).await?;
        Ok(conversation_id)
    }
}
