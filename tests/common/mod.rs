use chrono::Utc;
use diesel::prelude::*;

use birthday_engine::app::models::{DieselUlid, NewUser, User};
use birthday_engine::app::services::user_service;
use birthday_engine::config::Config;
use birthday_engine::database::{self, DbPool};

/// Connects to the Postgres instance these integration tests exercise against and runs pending
/// migrations. Reads the same `DATABASE_URL` (or `DB_*`) environment variables as the service
/// itself — point it at a disposable test database before running this suite.
pub fn test_pool() -> DbPool {
    let config = Config::load().expect("failed to load config from environment");
    let pool = database::create_pool(&config).expect("failed to create test db pool");
    database::run_migrations(&pool).expect("failed to run migrations against test db");
    pool
}

/// Inserts a throwaway user with a unique email so parallel test runs don't collide on the
/// `email` column, and returns it for use as the owner of a scheduling scenario.
pub fn insert_user(
    pool: &DbPool,
    timezone: &str,
    birthday_date: Option<chrono::NaiveDate>,
    anniversary_date: Option<chrono::NaiveDate>,
) -> User {
    let mut conn = pool.get().expect("db connection");
    let id = DieselUlid::new();
    user_service::create(
        &mut conn,
        NewUser {
            id,
            first_name: "Test".to_string(),
            last_name: None,
            email: format!("{id}@example.test"),
            timezone: timezone.to_string(),
            birthday_date,
            anniversary_date,
        },
    )
    .expect("failed to insert test user")
}

/// Deletes a test user (and, via `ON DELETE CASCADE`, every delivery_logs row it owns) so the
/// suite leaves no residue behind in a shared test database.
pub fn cleanup_user(pool: &DbPool, user_id: DieselUlid) {
    use birthday_engine::schema::users::dsl as u;
    let mut conn = pool.get().expect("db connection");
    let _ = diesel::delete(u::users.filter(u::id.eq(user_id))).execute(&mut conn);
}

pub fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
