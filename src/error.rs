// src/error.rs
// Error types for the monitor library.

use thiserror::Error;

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors raised while setting up or polling the native library.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Effective user is not root.
    #[error("This program requires root privileges to access GPU registers. Please run with sudo.")]
    NotRoot,

    /// The shared library could not be opened.
    #[error("Error loading the library: {reason}\nMake sure you've installed the library correctly.")]
    LibraryLoad {
        path: String,
        reason: libloading::Error,
    },

    /// The shared library does not export a required function.
    #[error("symbol `{symbol}` not found in {path}: {reason}")]
    MissingSymbol {
        symbol: &'static str,
        path: String,
        reason: libloading::Error,
    },

    /// `gpu_monitor_init` returned NULL or the device count was negative.
    #[error("Failed to initialize GPU monitoring")]
    InitFailed,

    #[error("No GPUs detected")]
    NoDevices,

    /// A single device query failed. Not fatal to the polling loop.
    #[error("Failed to get temperatures for GPU {}{}", .device, detail(.message))]
    Query { device: u32, message: String },

    /// Blocking or waiting for termination signals failed.
    #[error("signal handling failed: {0}")]
    Signal(#[from] nix::errno::Errno),

    /// Writing readings to the output failed.
    #[error("failed to write readings")]
    Output(#[from] std::io::Error),

    #[error("failed to spawn polling thread")]
    Spawn(#[source] std::io::Error),

    #[error("polling thread panicked")]
    PollerPanicked,

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn detail(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_message_without_details() {
        let err = MonitorError::Query { device: 2, message: String::new() };
        assert_eq!(err.to_string(), "Failed to get temperatures for GPU 2");
    }

    #[test]
    fn test_query_message_with_details() {
        let err = MonitorError::Query { device: 0, message: "sensor offline".into() };
        assert_eq!(err.to_string(), "Failed to get temperatures for GPU 0: sensor offline");
    }
}
