//! In-process document store with live-query support.
//!
//! Listeners are kept per collection and pruned lazily: once a [`LiveQuery`]
//! handle is cancelled or dropped the next emission for that collection
//! removes it.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;

use super::{
    BackendError, Document, DocumentId, DocumentStore, FieldValue, Fields, LiveQuery,
    LiveQuerySender, Query, SetMode,
};

struct Listener {
    query: Query,
    sender: LiveQuerySender,
}

#[derive(Default)]
struct Faults {
    next_fetch: Option<BackendError>,
    next_subscribe: Option<BackendError>,
    next_write: Option<BackendError>,
    /// Writes still allowed through before `error` is returned
    delayed_write: Option<(usize, BackendError)>,
}

pub struct InMemoryStore {
    collections: DashMap<String, Vec<Document>>,
    listeners: DashMap<String, Vec<Listener>>,
    faults: Mutex<Faults>,
    fetch_gate: watch::Sender<bool>,
    fetch_count: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            listeners: DashMap::new(),
            faults: Mutex::new(Faults::default()),
            fetch_gate: watch::channel(false).0,
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Number of one-shot fetches issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Number of live listeners still attached to a collection.
    pub fn listener_count(&self, collection: &str) -> usize {
        self.listeners
            .get(collection)
            .map(|l| l.iter().filter(|l| !l.sender.is_closed()).count())
            .unwrap_or(0)
    }

    /// Number of live listeners still attached anywhere in the store.
    pub fn open_listener_count(&self) -> usize {
        self.listeners
            .iter()
            .map(|entry| entry.value().iter().filter(|l| !l.sender.is_closed()).count())
            .sum()
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| docs.value().clone())
            .unwrap_or_default()
    }

    /// Makes the next `fetch_once` call fail with `error`.
    pub fn fail_next_fetch(&self, error: BackendError) {
        self.with_faults(|f| f.next_fetch = Some(error));
    }

    /// Makes the next `subscribe` call fail with `error`.
    pub fn fail_next_subscribe(&self, error: BackendError) {
        self.with_faults(|f| f.next_subscribe = Some(error));
    }

    /// Makes the next document write fail with `error`.
    pub fn fail_next_write(&self, error: BackendError) {
        self.with_faults(|f| f.next_write = Some(error));
    }

    /// Lets `successful` writes through, then fails the one after them.
    pub fn fail_write_after(&self, successful: usize, error: BackendError) {
        self.with_faults(|f| f.delayed_write = Some((successful, error)));
    }

    /// Parks every `fetch_once` call until [`InMemoryStore::release_fetches`].
    pub fn hold_fetches(&self) {
        self.fetch_gate.send_replace(true);
    }

    pub fn release_fetches(&self) {
        self.fetch_gate.send_replace(false);
    }

    /// Drops every live query on `collection` with a `SubscriptionDropped` error.
    pub fn drop_subscriptions(&self, collection: &str, reason: &str) {
        if let Some((_, listeners)) = self.listeners.remove(collection) {
            for listener in listeners {
                listener
                    .sender
                    .emit(Err(BackendError::SubscriptionDropped(reason.to_string())));
            }
        }
    }

    fn take_write_fault(&self) -> Option<BackendError> {
        self.with_faults(|f| {
            if let Some(error) = f.next_write.take() {
                return Some(error);
            }
            match f.delayed_write.take() {
                Some((0, error)) => Some(error),
                Some((remaining, error)) => {
                    f.delayed_write = Some((remaining - 1, error));
                    None
                }
                None => None,
            }
        })
    }

    fn with_faults<T>(&self, f: impl FnOnce(&mut Faults) -> T) -> T {
        let mut faults = self
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut faults)
    }

    fn resolve_server_values(fields: Fields) -> Fields {
        let now = Utc::now();
        fields
            .into_iter()
            .map(|(k, v)| match v {
                FieldValue::ServerTimestamp => (k, FieldValue::Timestamp(now)),
                other => (k, other),
            })
            .collect()
    }

    fn write(&self, collection: &str, id: &str, fields: Fields, mode: SetMode) {
        let fields = Self::resolve_server_values(fields);
        {
            let mut docs = self.collections.entry(collection.to_string()).or_default();
            match docs.iter_mut().find(|d| d.id == id) {
                Some(existing) => match mode {
                    SetMode::Overwrite => existing.fields = fields,
                    SetMode::Merge => existing.fields.extend(fields),
                },
                None => docs.push(Document::new(id, fields)),
            }
        }
        self.notify(collection);
    }

    fn notify(&self, collection: &str) {
        let snapshot = self.documents(collection);
        if let Some(mut listeners) = self.listeners.get_mut(collection) {
            listeners.retain(|listener| listener.sender.emit(Ok(listener.query.evaluate(&snapshot))));
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn subscribe(&self, query: Query) -> Result<LiveQuery, BackendError> {
        if let Some(error) = self.with_faults(|f| f.next_subscribe.take()) {
            return Err(error);
        }

        let (sender, live_query) = LiveQuery::channel();
        let initial = query.evaluate(&self.documents(&query.collection));
        sender.emit(Ok(initial));

        self.listeners
            .entry(query.collection.clone())
            .or_default()
            .push(Listener { query, sender });

        Ok(live_query)
    }

    async fn fetch_once(&self, query: Query) -> Result<Vec<Document>, BackendError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.fetch_gate.subscribe();
        while *gate.borrow_and_update() {
            if gate.changed().await.is_err() {
                break;
            }
        }

        if let Some(error) = self.with_faults(|f| f.next_fetch.take()) {
            return Err(error);
        }

        Ok(query.evaluate(&self.documents(&query.collection)))
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, BackendError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    async fn create_document(&self, collection: &str, fields: Fields) -> Result<DocumentId, BackendError> {
        if let Some(error) = self.take_write_fault() {
            return Err(error);
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.write(collection, &id, fields, SetMode::Overwrite);
        Ok(id)
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        mode: SetMode,
    ) -> Result<(), BackendError> {
        if let Some(error) = self.take_write_fault() {
            return Err(error);
        }
        self.write(collection, id, fields, mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::murmur::backend::Direction;

    fn text_fields(text: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("text".to_string(), text.into());
        fields.insert("timestamp".to_string(), FieldValue::ServerTimestamp);
        fields
    }

    #[tokio::test]
    async fn subscribe_emits_initial_snapshot_and_updates() {
        let store = InMemoryStore::new();
        store.create_document("c", text_fields("one")).await.unwrap();

        let mut live = store
            .subscribe(Query::collection("c").order_by("timestamp", Direction::Descending))
            .await
            .unwrap();

        let initial = live.next().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        store.create_document("c", text_fields("two")).await.unwrap();
        let updated = live.next().await.unwrap().unwrap();
        assert_eq!(updated.len(), 2);
    }

    #[tokio::test]
    async fn delayed_write_fault_fails_only_the_selected_write() {
        let store = InMemoryStore::new();
        store.fail_write_after(1, BackendError::Unavailable("offline".to_string()));

        assert!(store.set_document("c", "a", text_fields("one"), SetMode::Overwrite).await.is_ok());
        assert!(matches!(
            store.set_document("c", "b", text_fields("two"), SetMode::Overwrite).await,
            Err(BackendError::Unavailable(_))
        ));
        assert!(store.set_document("c", "b", text_fields("two"), SetMode::Overwrite).await.is_ok());
        assert_eq!(store.documents("c").len(), 2);
    }

    #[tokio::test]
    async fn server_timestamp_is_resolved_on_write() {
        let store = InMemoryStore::new();
        let id = store.create_document("c", text_fields("hi")).await.unwrap();
        let doc = store.get_document("c", &id).await.unwrap().unwrap();
        assert!(matches!(doc.get("timestamp"), Some(FieldValue::Timestamp(_))));
    }

    #[tokio::test]
    async fn cancelled_listener_is_pruned_on_next_write() {
        let store = InMemoryStore::new();
        let live = store.subscribe(Query::collection("c")).await.unwrap();
        let _other = store.subscribe(Query::collection("d")).await.unwrap();
        assert_eq!(store.listener_count("c"), 1);
        assert_eq!(store.open_listener_count(), 2);

        live.cancel();
        assert_eq!(store.open_listener_count(), 1);
        assert_eq!(store.listener_count("c"), 0);

        store.create_document("c", text_fields("x")).await.unwrap();
        assert!(store.listeners.get("c").unwrap().is_empty());
    }

    #[tokio::test]
    async fn merge_keeps_existing_fields() {
        let store = InMemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("displayName".to_string(), "Bob".into());
        fields.insert("status".to_string(), "pending".into());
        store
            .set_document("users/a/contacts", "b", fields, SetMode::Overwrite)
            .await
            .unwrap();

        let mut update = Fields::new();
        update.insert("status".to_string(), "accepted".into());
        store
            .set_document("users/a/contacts", "b", update, SetMode::Merge)
            .await
            .unwrap();

        let doc = store
            .get_document("users/a/contacts", "b")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.get_str("displayName"), Some("Bob"));
        assert_eq!(doc.get_str("status"), Some("accepted"));
    }

    #[tokio::test]
    async fn injected_faults_fire_once() {
        let store = InMemoryStore::new();
        store.fail_next_fetch(BackendError::Unavailable("offline".to_string()));

        assert!(store.fetch_once(Query::collection("c")).await.is_err());
        assert!(store.fetch_once(Query::collection("c")).await.is_ok());
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn dropped_subscription_delivers_error() {
        let store = InMemoryStore::new();
        let mut live = store.subscribe(Query::collection("c")).await.unwrap();
        let _ = live.next().await;

        store.drop_subscriptions("c", "network lost");

        let event = live.next().await.unwrap();
        assert!(matches!(event, Err(BackendError::SubscriptionDropped(_))));
        assert!(live.next().await.is_none());
    }

    #[tokio::test]
    async fn held_fetches_wait_for_release() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        store.hold_fetches();

        let task = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_once(Query::collection("c")).await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        store.release_fetches();
        assert!(task.await.unwrap().is_ok());
    }
}
