use crate::integration_tests::core::*;
use crate::MurmurError;
use async_trait::async_trait;

pub struct SendMessageTestCase {
    sender: String,
    text: String,
    message_id_key: Option<String>,
}

impl SendMessageTestCase {
    pub fn basic() -> Self {
        Self {
            sender: String::new(),
            text: "Hello from the integration tests".to_string(),
            message_id_key: None,
        }
    }

    pub fn with_sender(mut self, sender: &str) -> Self {
        self.sender = sender.to_string();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_message_id_key(mut self, key: &str) -> Self {
        self.message_id_key = Some(key.to_string());
        self
    }
}

#[async_trait]
impl TestCase for SendMessageTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        tracing::info!("Sending message from '{}'...", self.sender);

        let client = context.get_client(&self.sender)?;
        let message_id = client.send_message(&self.text).await?;

        tracing::info!("✓ Message {} sent by '{}'", message_id, self.sender);

        if let Some(key) = &self.message_id_key {
            context.add_message_id(key, message_id);
        }
        Ok(())
    }
}
