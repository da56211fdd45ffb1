pub mod gpu_monitor;
pub mod report;
pub mod thresholds;

// Re-export commonly used items
pub use gpu_monitor::*;
pub use report::{OutputFormat, Reading};
pub use thresholds::{Exceeded, Sensor, Thresholds};
