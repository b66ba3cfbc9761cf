pub mod migrate;
pub mod queue;
pub mod schedule;
pub mod seed;
pub mod serve;
pub mod worker;
