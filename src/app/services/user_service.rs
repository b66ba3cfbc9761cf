use diesel::prelude::*;
use diesel::PgConnection;

use crate::app::error::SchedulingError;
use crate::app::models::{DieselUlid, NewUser, User};
use crate::schema::users::dsl as u;

pub fn active_users(conn: &mut PgConnection) -> Result<Vec<User>, SchedulingError> {
    Ok(u::users.filter(u::deleted_at.is_null()).load::<User>(conn)?)
}

pub fn find(conn: &mut PgConnection, id: DieselUlid) -> Result<Option<User>, SchedulingError> {
    Ok(u::users.filter(u::id.eq(id)).first::<User>(conn).optional()?)
}

pub fn create(conn: &mut PgConnection, new_user: NewUser) -> Result<User, SchedulingError> {
    Ok(diesel::insert_into(u::users).values(&new_user).get_result::<User>(conn)?)
}
