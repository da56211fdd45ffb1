pub mod config;
pub mod error;
pub mod globals;
pub mod modules;
pub mod native;
pub mod privilege;
pub mod sensor;
pub mod session;
pub mod shutdown;

// Re-exports
pub use config::{find_config_file, Settings, CONFIG};
pub use error::{MonitorError, Result};
pub use sensor::{TemperatureSource, Temperatures};
