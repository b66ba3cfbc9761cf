pub mod delivery_log_service;
pub mod user_service;
