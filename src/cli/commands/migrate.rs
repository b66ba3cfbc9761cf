use anyhow::Result;
use colored::Colorize;
use diesel::connection::SimpleConnection;
use diesel_migrations::MigrationHarness;

use crate::{config, database};

pub fn handle_migrate(fresh: bool) -> Result<()> {
    let config = config::Config::load()?;
    let pool = database::create_pool(&config)?;
    let mut conn = pool.get()?;

    if fresh {
        tracing::info!("dropping users and delivery_logs before re-running migrations");
        conn.batch_execute("DROP TABLE IF EXISTS delivery_logs, users CASCADE;")?;
    }

    conn.run_pending_migrations(database::MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("migration failed: {e}"))?;

    println!("{}", "migrations applied".green());
    Ok(())
}
