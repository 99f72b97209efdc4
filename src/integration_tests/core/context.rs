use crate::{ConversationId, Identity, InMemoryStore, Murmur, MurmurConfig, MurmurError, Session};
use std::collections::HashMap;
use std::sync::Arc;

/// State threaded through the test cases of one scenario.
///
/// Clients created here share the context's store and only see each other.
pub struct ScenarioContext {
    pub config: MurmurConfig,
    pub store: Arc<InMemoryStore>,
    pub clients: HashMap<String, Arc<Murmur>>,
    pub identities: HashMap<String, Identity>,
    pub conversations: HashMap<String, ConversationId>,
    pub messages_ids: HashMap<String, String>,
    pub tests_count: u32,
    pub tests_passed: u32,
}

impl ScenarioContext {
    pub fn new(config: MurmurConfig, store: Arc<InMemoryStore>) -> Self {
        Self {
            config,
            store,
            clients: HashMap::new(),
            identities: HashMap::new(),
            conversations: HashMap::new(),
            messages_ids: HashMap::new(),
            tests_count: 0,
            tests_passed: 0,
        }
    }

    /// Signs `identity` in on a new client bound to this scenario's store.
    pub fn add_client(&mut self, name: &str, identity: Identity) -> Result<Arc<Murmur>, MurmurError> {
        let client = Arc::new(Murmur::new(
            self.config.clone(),
            self.store.clone(),
            Session::authenticated(identity.clone()),
        )?);
        self.clients.insert(name.to_string(), client.clone());
        self.identities.insert(name.to_string(), identity);
        Ok(client)
    }

    pub fn get_client(&self, name: &str) -> Result<Arc<Murmur>, MurmurError> {
        self.clients.get(name).cloned().ok_or_else(|| {
            MurmurError::Configuration(format!("Client '{}' not found in context", name))
        })
    }

    pub fn get_identity(&self, name: &str) -> Result<&Identity, MurmurError> {
        self.identities.get(name).ok_or(MurmurError::UserNotFound)
    }

    pub fn add_conversation(&mut self, name: &str, conversation_id: ConversationId) {
        self.conversations.insert(name.to_string(), conversation_id);
    }

    pub fn get_conversation(&self, name: &str) -> Result<&ConversationId, MurmurError> {
        self.conversations.get(name).ok_or_else(|| {
            MurmurError::Configuration(format!("Conversation '{}' not found in context", name))
        })
    }

    pub fn add_message_id(&mut self, name: &str, message_id: String) {
        self.messages_ids.insert(name.to_string(), message_id);
    }

    pub fn get_message_id(&self, message_id: &str) -> Result<&String, MurmurError> {
        self.messages_ids.get(message_id).ok_or_else(|| {
            MurmurError::Configuration(format!(
                "Message ID '{}' not found in context",
                message_id
            ))
        })
    }

    /// Closes every client's conversation, then checks that no live feed is
    /// still attached to the store.
    pub async fn teardown(&self) -> Result<(), MurmurError> {
        for client in self.clients.values() {
            client.close_conversation().await;
        }

        match self.store.open_listener_count() {
            0 => Ok(()),
            leaked => Err(MurmurError::Other(anyhow::anyhow!(
                "{} live feeds still attached after closing all conversations",
                leaked
            ))),
        }
    }

    pub fn record_test(&mut self, passed: bool) {
        self.tests_count += 1;
        if passed {
            self.tests_passed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserId;

    fn context() -> (ScenarioContext, tempfile::TempDir) {
        let logs = tempfile::TempDir::new().unwrap();
        let config = MurmurConfig::new(logs.path());
        (ScenarioContext::new(config, Arc::new(InMemoryStore::new())), logs)
    }

    #[tokio::test]
    async fn teardown_detaches_every_live_feed() {
        let (mut context, _logs) = context();
        let alice = context
            .add_client("alice", Identity::new("alice", "Alice"))
            .unwrap();
        let bob = context.add_client("bob", Identity::new("bob", "Bob")).unwrap();

        let conversation = ConversationId::for_participants(&UserId::new("alice"), &UserId::new("bob"));
        alice.switch_conversation(conversation.clone()).await.unwrap();
        bob.switch_conversation(conversation).await.unwrap();
        assert_eq!(context.store.open_listener_count(), 2);

        context.teardown().await.unwrap();
        assert_eq!(context.store.open_listener_count(), 0);
        assert!(alice.active_conversation().await.is_none());
    }

    #[test]
    fn records_passed_and_failed_steps() {
        let (mut context, _logs) = context();
        context.record_test(true);
        context.record_test(false);
        assert_eq!(context.tests_count, 2);
        assert_eq!(context.tests_passed, 1);
    }
}
