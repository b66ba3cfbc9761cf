use anyhow::Result;

use crate::app::broker::amqp::AmqpBroker;
use crate::app::scheduler::{enqueue, precalc, recovery};
use crate::cli::ScheduleCommands;
use crate::config::Config;
use crate::state::AppState;

pub async fn handle(cmd: ScheduleCommands) -> Result<()> {
    let config = Config::load()?;
    let state = AppState::bootstrap(config)?;
    database_ready(&state)?;

    match cmd {
        ScheduleCommands::Precalc => {
            let stats = precalc::run(&state.pool, &state.registry, &state.events)?;
            println!(
                "precalc: eligible={} scheduled={} duplicates_skipped={} errors={}",
                stats.total_eligible, stats.messages_scheduled, stats.duplicates_skipped, stats.errors
            );
        }
        ScheduleCommands::Enqueue => {
            let broker = AmqpBroker::connect(&state.config.broker).await?;
            let stats = enqueue::run(&state.pool, &broker, state.config.scheduling.enqueue_window, &state.events).await?;
            println!("enqueue: advanced={} publish_failures={}", stats.advanced, stats.publish_failures);
        }
        ScheduleCommands::Recover => {
            let stats = recovery::run(
                &state.pool,
                state.config.scheduling.max_retries as i32,
                state.config.scheduling.stuck_timeout,
                state.config.scheduling.precalc_grace,
                state.config.scheduling.recovery_too_late,
                &state.events,
            )?;
            println!(
                "recovery: missed={} recovered={} failed={} errors={}",
                stats.total_missed, stats.recovered, stats.failed, stats.errors
            );
        }
    }

    Ok(())
}

fn database_ready(state: &AppState) -> Result<()> {
    crate::database::run_migrations(&state.pool)?;
    Ok(())
}
