pub mod strategy;
pub mod timezone;

pub use strategy::{EventStrategy, StrategyRegistry};
pub use timezone::EngineError;
