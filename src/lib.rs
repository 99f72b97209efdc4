use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt::Layer, prelude::*, registry::Registry};

use std::sync::Mutex;

mod murmur;
mod types;

#[cfg(feature = "integration-tests")]
pub mod integration_tests;

pub use crate::murmur::backend::{
    BackendError, Direction, Document, DocumentId, DocumentStore, FieldValue, Fields,
    InMemoryStore, LiveQuery, LiveQuerySender, Query, SetMode,
};
pub use crate::murmur::contacts::{Contact, ContactStatus};
pub use crate::murmur::conversations::ConversationSummary;
pub use crate::murmur::error::{MurmurError, Result};
pub use crate::murmur::message_streaming::{BatchUpdate, ConversationSubscription, UpdateTrigger};
pub use crate::murmur::message_sync::{
    BeginFetch, ConversationEngine, ConversationView, DayGroup, LiveFeed, MergeSummary, Message,
    PaginationController, PaginationState, ScrollAction, ScrollPolicy, SyncConfig, ViewError,
    ViewUpdate, Viewport, compare_messages, group_by_day, merge,
};
pub use crate::murmur::messages::LoadOlderOutcome;
pub use crate::murmur::session::{Identity, Session};
pub use crate::murmur::timestamps::{TimestampError, resolve_timestamp};
pub use crate::murmur::users::User;
pub use crate::murmur::{Murmur, MurmurConfig};
pub use crate::types::{ConversationId, UserId};

static TRACING_GUARDS: OnceCell<Mutex<Option<(WorkerGuard, WorkerGuard)>>> = OnceCell::new();
static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Installs the global subscriber: stdout plus a daily rolling file in `logs_dir`.
///
/// Only the first call has an effect. The filter comes from `RUST_LOG` and
/// defaults to `info`.
pub(crate) fn init_tracing(logs_dir: &std::path::Path) -> Result<()> {
    TRACING_INIT
        .get_or_try_init(|| {
            let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix("murmur")
                .filename_suffix("log")
                .build(logs_dir)
                .map_err(|e| MurmurError::LoggingSetup(e.to_string()))?;

            let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
            let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

            TRACING_GUARDS
                .set(Mutex::new(Some((file_guard, stdout_guard))))
                .ok();

            let stdout_layer = Layer::new()
                .with_writer(non_blocking_stdout)
                .with_ansi(true)
                .with_target(true);

            let file_layer = Layer::new()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true);

            // Another subscriber may already be installed by the host application.
            let _ = Registry::default()
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                .with(stdout_layer)
                .with(file_layer)
                .try_init();

            Ok::<(), MurmurError>(())
        })
        .map(|_| ())
}
