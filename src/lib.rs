mod builder;
mod ring;
mod stats;
mod tracker;
pub mod listener;
pub mod scheduler;

pub use builder::{ConfigError, TrackerBuilder};
pub use stats::TrackerStats;
pub use tracker::UnackedTracker;
