use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::config::Config;
use crate::error::Result;
use crate::repositories::store::{RecordStore, RedisStore};
use crate::repositories::token::TokenLedger;
use crate::services::download::DownloadService;
use crate::services::drive::DriveClient;
use crate::services::payment::{PaymentGateway, PaymentService};

/// The application's state.
///
/// Everything here is cheap to clone; the only coordination state across
/// requests lives in the record store.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// The durable record store.
    pub store: Arc<dyn RecordStore>,
    /// The download-token ledger.
    pub ledger: TokenLedger,
    /// Payment confirmation and checkout-intent creation.
    pub payments: PaymentService,
    /// Token redemption against the remote file host.
    pub downloads: DownloadService,
}

impl AppState {
    /// Creates a new `AppState` backed by Redis.
    pub async fn new(config: &Config) -> Result<Self> {
        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let conn = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis Connection Manager initialized (pooled)");

        let store: Arc<dyn RecordStore> = Arc::new(RedisStore::new(conn));
        Self::with_store(config, store)
    }

    /// Wires the components around an explicit record store. Tests use
    /// this with the in-memory backend.
    pub fn with_store(config: &Config, store: Arc<dyn RecordStore>) -> Result<Self> {
        let http = reqwest::Client::new();

        let ledger = TokenLedger::new(store.clone(), config.token_ttl_hours);
        let payments = PaymentService::new(
            PaymentGateway::new(http.clone(), config),
            ledger.clone(),
        );
        let drive = DriveClient::new(http, config)?;
        let downloads = DownloadService::new(ledger.clone(), drive);

        Ok(AppState {
            config: config.clone(),
            store,
            ledger,
            payments,
            downloads,
        })
    }
}
