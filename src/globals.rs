// src/globals.rs

use std::time::Duration;

/// Shared object resolved through the dynamic loader search path.
pub const DEFAULT_LIBRARY: &str = "libgpumonitor.so";

pub const DEFAULT_INTERVAL_SECS: u64 = 1;

pub const SYSTEM_CONFIG_FILE: &str = "/etc/gpu-monitor.conf";

/// Relative to `$XDG_CONFIG_HOME` (or `~/.config`).
pub const USER_CONFIG_FILE: &str = "gpu-monitor/gpu-monitor.conf";

/// Size of `GpuTemperatures::error_message` in the native library.
pub const ERROR_MESSAGE_LEN: usize = 256;

pub const SYM_INIT: &str = "gpu_monitor_init";
pub const SYM_CLEANUP: &str = "gpu_monitor_cleanup";
pub const SYM_DEVICE_COUNT: &str = "gpu_monitor_get_device_count";
pub const SYM_TEMPERATURES: &str = "gpu_monitor_get_temperatures";

pub fn default_interval() -> Duration {
    Duration::from_secs(DEFAULT_INTERVAL_SECS)
}
