use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;

use crate::app::send_client::HttpSendClient;
use crate::app::worker::Worker;
use crate::config::Config;
use crate::state::AppState;

pub async fn handle(concurrency: usize) -> Result<()> {
    let config = Config::load()?;
    let state = AppState::bootstrap(config)?;
    crate::database::run_migrations(&state.pool)?;

    let broker = state.connect_broker().await?;
    let send_client: Arc<dyn crate::app::send_client::SendClient> = Arc::new(HttpSendClient::new(&state.config.send_api));
    let max_retries = state.config.scheduling.max_retries as i32;
    let prefetch = state.config.scheduling.prefetch;
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::new();
    for n in 0..concurrency {
        let consumer = broker.consumer(prefetch, &format!("enginectl-worker-{n}")).await?;
        let worker = Worker::new(state.pool.clone(), send_client.clone(), max_retries, state.events.clone());
        let shutdown_rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            worker.run(Box::new(consumer), shutdown_rx).await;
        }));
    }

    println!("running {concurrency} worker consumer(s) against {}, press Ctrl+C to stop", state.config.broker.queue);
    tokio::signal::ctrl_c().await?;
    println!("shutting down");

    Ok(())
}
