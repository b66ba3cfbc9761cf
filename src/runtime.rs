use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

use crate::app::broker::Broker;
use crate::app::scheduler::{enqueue, precalc, recovery, EnqueueGuard};
use crate::app::send_client::HttpSendClient;
use crate::app::worker::Worker;
use crate::state::AppState;

/// How many concurrent consumers to run against the main queue. Distinct from `PREFETCH`
/// (messages held in flight per consumer) — this is how many consumers this process runs.
fn worker_concurrency() -> usize {
    std::env::var("WORKER_CONCURRENCY").ok().and_then(|v| v.parse().ok()).unwrap_or(4)
}

/// Boots every long-running piece of the engine in one process: the three schedulers
/// (pre-calc, enqueue, recovery), a worker pool consuming the main queue, and the operational
/// HTTP surface. Used by both the `birthday-engine` service binary and `enginectl serve`.
pub async fn run_service(state: AppState) -> anyhow::Result<()> {
    crate::database::run_migrations(&state.pool)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    spawn_precalc(&state, shutdown_rx.clone());
    spawn_enqueue(&state, shutdown_rx.clone());
    spawn_recovery(&state, shutdown_rx.clone());
    spawn_workers(&state, shutdown_rx.clone()).await?;

    let app = crate::create_app(state.clone());
    let listener = tokio::net::TcpListener::bind(&state.config.server_addr()).await?;
    info!(addr = %state.config.server_addr(), "operational HTTP surface listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    server.await?;

    let _ = shutdown_tx.send(true);
    // Drain deadline for in-flight worker deliveries.
    tokio::time::sleep(StdDuration::from_secs(30)).await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, draining in-flight work");
}

fn spawn_precalc(state: &AppState, mut shutdown: watch::Receiver<bool>) {
    let pool = state.pool.clone();
    let registry = state.registry.clone();
    let events = state.events.clone();
    let precalc_grace = state.config.scheduling.precalc_grace;

    tokio::spawn(async move {
        // Run once on startup to catch late starts, then once per UTC day.
        run_precalc_once(&pool, &registry, &events);

        let mut ticker = interval(StdDuration::from_secs(24 * 3600).max(precalc_grace));
        loop {
            tokio::select! {
                _ = ticker.tick() => run_precalc_once(&pool, &registry, &events),
                changed = shutdown.changed() => { if changed.is_err() || *shutdown.borrow() { break; } }
            }
        }
    });
}

fn run_precalc_once(pool: &crate::database::DbPool, registry: &Arc<crate::app::engine::StrategyRegistry>, events: &Arc<crate::app::events::EventBus>) {
    match precalc::run(pool, registry, events) {
        Ok(stats) => info!(
            total_eligible = stats.total_eligible,
            scheduled = stats.messages_scheduled,
            duplicates_skipped = stats.duplicates_skipped,
            errors = stats.errors,
            "precalc tick complete"
        ),
        Err(err) => error!(error = %err, "precalc tick failed"),
    }
}

fn spawn_enqueue(state: &AppState, mut shutdown: watch::Receiver<bool>) {
    let pool = state.pool.clone();
    let events = state.events.clone();
    let window = state.config.scheduling.enqueue_window;
    let broker_config = state.config.broker.clone();
    let guard = EnqueueGuard::new();

    tokio::spawn(async move {
        let broker = match crate::app::broker::amqp::AmqpBroker::connect(&broker_config).await {
            Ok(broker) => broker,
            Err(err) => {
                error!(error = %err, "enqueue scheduler failed to connect to broker");
                return;
            }
        };

        let mut ticker = interval(StdDuration::from_secs(60));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !guard.try_acquire() {
                        continue; // previous tick still running
                    }
                    if let Err(err) = enqueue::run(&pool, &broker, window, &events).await {
                        error!(error = %err, "enqueue tick failed");
                    }
                    guard.release();
                }
                changed = shutdown.changed() => { if changed.is_err() || *shutdown.borrow() { break; } }
            }
        }
    });
}

fn spawn_recovery(state: &AppState, mut shutdown: watch::Receiver<bool>) {
    let pool = state.pool.clone();
    let events = state.events.clone();
    let max_retries = state.config.scheduling.max_retries as i32;
    let stuck_timeout = state.config.scheduling.stuck_timeout;
    let precalc_grace = state.config.scheduling.precalc_grace;
    let too_late = state.config.scheduling.recovery_too_late;
    let interval_duration = state.config.scheduling.recovery_interval;

    tokio::spawn(async move {
        let mut ticker = interval(interval_duration);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match recovery::run(&pool, max_retries, stuck_timeout, precalc_grace, too_late, &events) {
                        Ok(_) => {}
                        Err(err) => error!(error = %err, "recovery tick failed"),
                    }
                }
                changed = shutdown.changed() => { if changed.is_err() || *shutdown.borrow() { break; } }
            }
        }
    });
}

async fn spawn_workers(state: &AppState, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let broker = state.connect_broker().await?;
    let send_client: Arc<dyn crate::app::send_client::SendClient> = Arc::new(HttpSendClient::new(&state.config.send_api));
    let max_retries = state.config.scheduling.max_retries as i32;
    let prefetch = state.config.scheduling.prefetch;

    for n in 0..worker_concurrency() {
        let consumer = broker.consumer(prefetch, &format!("worker-{n}")).await?;
        let worker = Worker::new(state.pool.clone(), send_client.clone(), max_retries, state.events.clone());
        let shutdown_rx = shutdown.clone();
        tokio::spawn(async move {
            worker.run(Box::new(consumer), shutdown_rx).await;
        });
    }

    Ok(())
}
