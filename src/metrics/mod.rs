pub mod performance;

pub use performance::PerformanceStats;
