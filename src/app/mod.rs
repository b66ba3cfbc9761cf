pub mod broker;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod scheduler;
pub mod send_client;
pub mod services;
pub mod worker;
