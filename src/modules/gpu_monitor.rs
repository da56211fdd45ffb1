// src/modules/gpu_monitor.rs
use std::io::{self, Write};
use std::time::Duration;

use chrono::Local;

use crate::config::Settings;
use crate::error::{MonitorError, Result};
use crate::modules::report::{write_failure, write_reading, OutputFormat, Reading};
use crate::modules::thresholds::Thresholds;
use crate::sensor::TemperatureSource;
use crate::shutdown::Shutdown;

/// Outcome of one pass over all devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoundSummary {
    pub ok: u32,
    pub failed: u32,
}

/// Polls every device of a [`TemperatureSource`] on a fixed interval and
/// writes the readings to `out`.
pub struct GpuMonitor<S, W> {
    source: S,
    out: W,
    format: OutputFormat,
    thresholds: Thresholds,
    interval: Duration,
    device_count: u32,
}

impl<S: TemperatureSource, W: Write> GpuMonitor<S, W> {
    /// Fails with [`MonitorError::NoDevices`] when the source reports no GPUs.
    pub fn new(source: S, out: W, settings: &Settings) -> Result<Self> {
        let device_count = source.device_count();
        if device_count == 0 {
            return Err(MonitorError::NoDevices);
        }

        Ok(Self {
            source,
            out,
            format: settings.format,
            thresholds: settings.thresholds,
            interval: settings.interval,
            device_count,
        })
    }

    /// One pass over every device. A failed device is reported and skipped.
    ///
    /// Only output errors abort the round.
    pub fn poll_round(&mut self) -> io::Result<RoundSummary> {
        let mut summary = RoundSummary::default();

        for device in 0..self.device_count {
            match self.source.temperatures(device) {
                Ok(temperatures) => {
                    summary.ok += 1;
                    for hit in self.thresholds.exceeded(&temperatures) {
                        tracing::warn!(
                            "GPU {} {} temperature {}°C at or above limit {}°C",
                            device,
                            hit.sensor,
                            hit.value,
                            hit.limit
                        );
                    }
                    let reading = Reading {
                        device,
                        temperatures,
                        taken_at: Local::now(),
                    };
                    write_reading(&mut self.out, self.format, &reading)?;
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::debug!("{}", e);
                    let message = match &e {
                        MonitorError::Query { message, .. } => message.clone(),
                        other => other.to_string(),
                    };
                    write_failure(&mut self.out, self.format, device, &message, Local::now())?;
                }
            }
        }

        self.out.flush()?;
        Ok(summary)
    }

    /// Polls until `shutdown` is triggered. The flag is checked before every
    /// round and the wait between rounds wakes as soon as it is set, so the
    /// loop ends at most one round after the trigger.
    ///
    /// Returns the number of completed rounds.
    pub fn run(&mut self, shutdown: &Shutdown) -> io::Result<u64> {
        let mut rounds = 0u64;
        tracing::info!(
            "polling {} device(s) every {:?}",
            self.device_count,
            self.interval
        );

        while !shutdown.is_triggered() {
            let summary = self.poll_round()?;
            rounds += 1;
            if summary.failed > 0 {
                tracing::debug!(
                    "round {}: {} ok, {} failed",
                    rounds,
                    summary.ok,
                    summary.failed
                );
            }

            if shutdown.wait_timeout(self.interval) {
                break;
            }
        }

        tracing::debug!("polling stopped after {} round(s)", rounds);
        Ok(rounds)
    }

    /// Hands the source back so the caller decides where it is released.
    pub fn into_parts(self) -> (S, W) {
        (self.source, self.out)
    }
}
