//! Application state wiring the relay together.
//!
//! The core services are generic over their ports; `AppState` pins them to
//! the concrete infra implementations. Used by both the CLI and the server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use relaydesk_core::directory::StoreDirectory;
use relaydesk_core::event::ChangeFeed;
use relaydesk_core::realtime::{FanoutBroker, RoomRegistry};
use relaydesk_core::relay::{MessageRelay, PlatformDelivery, RelayOptions};
use relaydesk_core::unread::UnreadEngine;
use relaydesk_infra::config::load_relay_config;
use relaydesk_infra::platform::HttpPlatformSender;
use relaydesk_infra::reply::ConfiguredReplyGenerator;
use relaydesk_infra::sqlite::conversation::SqliteConversationRepository;
use relaydesk_infra::sqlite::message::SqliteMessageStore;
use relaydesk_infra::sqlite::platform_bot::SqlitePlatformBotRepository;
use relaydesk_infra::sqlite::pool::{database_url, resolve_data_dir, DatabasePool};
use relaydesk_infra::sqlite::unread_snapshot::SqliteUnreadSnapshotStore;
use relaydesk_types::config::RelayConfig;
use tokio_util::sync::CancellationToken;

pub type ConcreteDelivery = PlatformDelivery<SqlitePlatformBotRepository, HttpPlatformSender>;

pub type ConcreteRelay = MessageRelay<
    SqliteMessageStore,
    SqliteConversationRepository,
    ConfiguredReplyGenerator,
    ConcreteDelivery,
>;

pub type ConcreteUnreadEngine = UnreadEngine<SqliteMessageStore, SqliteUnreadSnapshotStore>;

pub type ConcreteStoreDirectory =
    StoreDirectory<SqliteConversationRepository, SqliteMessageStore, SqliteUnreadSnapshotStore>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub messages: Arc<SqliteMessageStore>,
    pub conversations: Arc<SqliteConversationRepository>,
    pub bots: Arc<SqlitePlatformBotRepository>,
    pub broker: FanoutBroker,
    pub relay: ConcreteRelay,
    pub unread: ConcreteUnreadEngine,
    pub directory: Arc<ConcreteStoreDirectory>,
    /// Cancelled on shutdown: pending automated replies are dropped and
    /// open streams end.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Resolve the data directory, load config, open the database and wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let config = load_relay_config(&data_dir).await;

        let db_url = format!("{}?mode=rwc", database_url(&data_dir));
        let db_pool = DatabasePool::new(&db_url)
            .await
            .with_context(|| format!("failed to open database at {}", data_dir.display()))?;

        Ok(Self::build(config, data_dir, db_pool))
    }

    /// Wire services over an open pool.
    pub fn build(config: RelayConfig, data_dir: PathBuf, db_pool: DatabasePool) -> Self {
        let feed = ChangeFeed::new(config.change_feed_capacity());
        let messages = Arc::new(SqliteMessageStore::new(db_pool.clone(), feed));
        let conversations = Arc::new(SqliteConversationRepository::new(db_pool.clone()));
        let bots = Arc::new(SqlitePlatformBotRepository::new(db_pool.clone()));
        let snapshots = Arc::new(SqliteUnreadSnapshotStore::new(db_pool.clone()));

        let shutdown = CancellationToken::new();
        let broker = FanoutBroker::new(Arc::new(RoomRegistry::new()));

        let delivery = PlatformDelivery::new(
            SqlitePlatformBotRepository::new(db_pool.clone()),
            HttpPlatformSender::new(config.platforms.clone()),
        );
        let replies = ConfiguredReplyGenerator::from_config(&config);
        tracing::debug!(kind = replies.kind(), "automated reply generator selected");

        let relay = MessageRelay::new(
            messages.clone(),
            conversations.clone(),
            Arc::new(replies),
            Arc::new(delivery),
            broker.clone(),
            RelayOptions {
                reply_delay: config.bot_reply_delay(),
                shutdown: shutdown.clone(),
            },
        );

        let unread = UnreadEngine::new(messages.clone(), snapshots, config.unread_cache_horizon());
        let directory = Arc::new(StoreDirectory::new(conversations.clone(), unread.clone()));

        Self {
            config: Arc::new(config),
            data_dir,
            db_pool,
            messages,
            conversations,
            bots,
            broker,
            relay,
            unread,
            directory,
            shutdown,
        }
    }
}

#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let data_dir = dir.path().to_path_buf();
    // Leak tempdir so it lives for the test
    std::mem::forget(dir);
    let pool = DatabasePool::new(&url).await.unwrap();
    AppState::build(RelayConfig::default(), data_dir, pool)
}
