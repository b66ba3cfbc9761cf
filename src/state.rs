use std::sync::Arc;

use crate::app::broker::amqp::AmqpBroker;
use crate::app::engine::StrategyRegistry;
use crate::app::events::EventBus;
use crate::app::send_client::HttpSendClient;
use crate::config::Config;
use crate::database::{self, DbPool};

/// Process-wide resources handed to schedulers, the worker pool, the CLI, and the thin
/// operational HTTP surface. Built once at startup via `bootstrap` — no implicit singletons.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: DbPool,
    pub registry: Arc<StrategyRegistry>,
    pub events: Arc<EventBus>,
}

impl AppState {
    pub fn bootstrap(config: Config) -> anyhow::Result<Self> {
        let pool = database::create_pool(&config)?;
        Ok(Self {
            config,
            pool,
            registry: Arc::new(StrategyRegistry::default()),
            events: EventBus::new(),
        })
    }

    pub async fn connect_broker(&self) -> anyhow::Result<AmqpBroker> {
        Ok(AmqpBroker::connect(&self.config.broker).await?)
    }

    pub fn send_client(&self) -> HttpSendClient {
        HttpSendClient::new(&self.config.send_api)
    }
}
