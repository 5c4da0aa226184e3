pub mod sweep;

pub use sweep::{oldest_indices, RetentionReport, RetentionSweep};
