pub mod delivery_log;
pub mod diesel_ulid;
pub mod user;

pub use delivery_log::{DeliveryLog, DeliveryStatus, EventType, FailureReason, NewDeliveryLog};
pub use diesel_ulid::DieselUlid;
pub use user::{NewUser, User};
