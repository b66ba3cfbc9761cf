use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::app::models::diesel_ulid::DieselUlid;
use crate::schema::users;

/// Read-only mirror of the user record this engine needs to schedule deliveries.
///
/// In production this table is fed by change-data-capture from the system of record; this
/// crate never writes to it except via `enginectl db-seed` for local development.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: DieselUlid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub timezone: String,
    pub birthday_date: Option<NaiveDate>,
    pub anniversary_date: Option<NaiveDate>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: DieselUlid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub timezone: String,
    pub birthday_date: Option<NaiveDate>,
    pub anniversary_date: Option<NaiveDate>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}
