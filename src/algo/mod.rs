pub mod snapshot_engine;

pub use snapshot_engine::{calculate_momentum, SnapshotEngine};
