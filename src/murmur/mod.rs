use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use anyhow::Context;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub mod backend;
pub mod contacts;
pub mod conversations;
pub mod error;
pub mod message_streaming;
pub mod message_sync;
pub mod messages;
pub mod session;
pub mod timestamps;
pub mod users;

use crate::init_tracing;
use backend::DocumentStore;
use error::{MurmurError, Result};
use message_streaming::MessageStreamManager;
use message_sync::{ConversationEngine, SyncConfig};
use session::Session;

#[derive(Clone, Debug)]
pub struct MurmurConfig {
    /// Directory for application logs
    pub logs_dir: PathBuf,

    /// Configuration for message synchronization
    pub sync: SyncConfig,
}

impl MurmurConfig {
    pub fn new(logs_dir: &Path) -> Self {
        Self::new_with_sync_config(logs_dir, SyncConfig::default())
    }

    /// Create a new configuration with custom synchronization settings
    pub fn new_with_sync_config(logs_dir: &Path, sync: SyncConfig) -> Self {
        let env_suffix = if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        };

        Self {
            logs_dir: logs_dir.join(env_suffix),
            sync,
        }
    }
}

/// The conversation currently shown, with the task pumping its live feed.
pub(crate) struct ActiveConversation {
    /// Bumped on every switch; responses carrying an older epoch are discarded
    pub(crate) epoch: u64,
    pub(crate) engine: ConversationEngine,
    pub(crate) feed_task: Option<JoinHandle<()>>,
}

impl ActiveConversation {
    /// Stops the live-feed task and waits until it has released its subscription.
    pub(crate) async fn shutdown(mut self) {
        if let Some(task) = self.feed_task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

/// State shared between the client and its live-feed tasks.
pub(crate) struct SyncShared {
    pub(crate) active: Mutex<Option<ActiveConversation>>,
    pub(crate) streams: MessageStreamManager,
}

/// A messaging client bound to one document store and one signed-in session.
pub struct Murmur {
    pub config: MurmurConfig,
    store: Arc<dyn DocumentStore>,
    session: Session,
    shared: Arc<SyncShared>,
    /// Serializes conversation switches
    switch_guard: Mutex<()>,
    epochs: AtomicU64,
}

impl std::fmt::Debug for Murmur {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Murmur")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("store", &"<REDACTED>")
            .finish()
    }
}

impl Murmur {
    /// Creates a client.
    ///
    /// This validates the synchronization settings, creates the logs directory
    /// and installs tracing (once per process).
    ///
    /// # Arguments
    ///
    /// * `config` - Log directory and synchronization settings.
    /// * `store` - Document store holding users, contacts and messages.
    /// * `session` - Authentication context used for every user-scoped operation.
    pub fn new(config: MurmurConfig, store: Arc<dyn DocumentStore>, session: Session) -> Result<Self> {
        config.sync.validate()?;

        let logs_dir = &config.logs_dir;
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))
            .map_err(MurmurError::from)?;

        init_tracing(logs_dir)?;

        tracing::debug!(target: "murmur::new", "Logging initialized in directory: {:?}", logs_dir);

        Ok(Self {
            config,
            store,
            session,
            shared: Arc::new(SyncShared {
                active: Mutex::new(None),
                streams: MessageStreamManager::new(),
            }),
            switch_guard: Mutex::new(()),
            epochs: AtomicU64::new(0),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}

impl Drop for Murmur {
    fn drop(&mut self) {
        if let Ok(mut active) = self.shared.active.try_lock() {
            if let Some(task) = active.take().and_then(|a| a.feed_task) {
                task.abort();
            }
        }
    }
}
