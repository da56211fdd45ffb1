// src/sensor.rs
// The seam between the polling loop and whatever produces readings.

use crate::error::Result;

/// Temperatures of one device, in °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Temperatures {
    pub core: u32,
    pub junction: u32,
    pub vram: u32,
}

/// Anything that can enumerate GPUs and read their sensors.
///
/// The native library keeps per-call state in its context, so queries take
/// `&mut self`.
pub trait TemperatureSource {
    /// Number of devices detected when the source was opened.
    fn device_count(&self) -> u32;

    /// Reads all three sensors of `device`.
    ///
    /// Returns `MonitorError::Query` when the device cannot be read.
    fn temperatures(&mut self, device: u32) -> Result<Temperatures>;
}
