use crate::integration_tests::core::*;
use crate::{ConversationId, DocumentStore, FieldValue, Fields, MurmurError, SetMode};
use async_trait::async_trait;
use chrono::{Duration, Utc};

/// Writes backdated messages straight into the store, as if sent long ago.
pub struct SeedHistoryTestCase {
    sender: String,
    recipient: String,
    count: usize,
    spacing: Duration,
}

impl SeedHistoryTestCase {
    pub fn new(sender: &str, recipient: &str, count: usize) -> Self {
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            count,
            spacing: Duration::hours(1),
        }
    }

    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }
}

#[async_trait]
impl TestCase for SeedHistoryTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        let sender = context.get_identity(&self.sender)?.clone();
        let recipient = context.get_identity(&self.recipient)?.id.clone();
        let conversation_id = ConversationId::for_participants(&sender.id, &recipient);
        let newest = Utc::now() - Duration::days(1);

        for i in 0..self.count {
            let sent_at = newest - self.spacing * i as i32;
            let mut fields = Fields::new();
            fields.insert("text".to_string(), format!("history #{}", self.count - i).into());
            fields.insert("sender".to_string(), sender.id.as_str().into());
            fields.insert("senderName".to_string(), sender.display_name.as_str().into());
            fields.insert("timestamp".to_string(), FieldValue::Timestamp(sent_at));

            context
                .store
                .set_document(
                    &conversation_id.messages_path(),
                    &format!("history-{:05}", self.count - i),
                    fields,
                    SetMode::Overwrite,
                )
                .await?;
        }

        tracing::info!(
            "✓ Seeded {} messages from '{}' into {}",
            self.count,
            self.sender,
            conversation_id
        );
        Ok(())
    }
}
