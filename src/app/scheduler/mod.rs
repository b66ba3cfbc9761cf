pub mod enqueue;
pub mod precalc;
pub mod recovery;

pub use enqueue::{EnqueueGuard, EnqueueStats};
pub use precalc::PrecalcStats;
pub use recovery::RecoveryStats;
