use anyhow::Result;
use diesel::prelude::*;

use crate::cli::QueueCommands;
use crate::config::Config;
use crate::database;
use crate::schema::delivery_logs::dsl as dl;

pub fn handle(cmd: QueueCommands) -> Result<()> {
    let config = Config::load()?;
    let pool = database::create_pool(&config)?;
    let mut conn = pool.get()?;

    match cmd {
        QueueCommands::Stats => {
            let rows: Vec<(String, i64)> = dl::delivery_logs
                .group_by(dl::status)
                .select((dl::status, diesel::dsl::count_star()))
                .load(&mut conn)?;

            println!("{:<12} {:>8}", "status", "count");
            for (status, count) in rows {
                println!("{status:<12} {count:>8}");
            }
        }
        QueueCommands::Dlq { limit } => {
            let rows = dl::delivery_logs
                .filter(dl::status.eq("FAILED"))
                .order(dl::updated_at.desc())
                .limit(limit)
                .select((dl::id, dl::user_id, dl::message_type, dl::reason, dl::error_message))
                .load::<(crate::app::models::DieselUlid, crate::app::models::DieselUlid, String, Option<String>, Option<String>)>(&mut conn)?;

            for (id, user_id, message_type, reason, error_message) in rows {
                println!(
                    "{id} user={user_id} type={message_type} reason={} error={}",
                    reason.unwrap_or_else(|| "-".to_string()),
                    error_message.unwrap_or_else(|| "-".to_string())
                );
            }
        }
    }

    Ok(())
}
