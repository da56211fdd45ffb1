// src/modules/report.rs
//
// Rendering of readings to stdout (or any writer).

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde_json::json;

use crate::error::MonitorError;
use crate::sensor::Temperatures;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per device per round.
    Json,
}

impl FromStr for OutputFormat {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(MonitorError::Config(format!(
                "unknown output format \"{}\" (expected text or json)",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// A successful sample of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device: u32,
    pub temperatures: Temperatures,
    pub taken_at: DateTime<Local>,
}

pub fn write_reading<W: Write>(out: &mut W, format: OutputFormat, reading: &Reading) -> io::Result<()> {
    let t = &reading.temperatures;
    match format {
        OutputFormat::Text => {
            writeln!(out, "\nGPU {}:", reading.device)?;
            writeln!(out, "  Core Temperature:     {}°C", t.core)?;
            writeln!(out, "  Junction Temperature: {}°C", t.junction)?;
            writeln!(out, "  VRAM Temperature:     {}°C", t.vram)
        }
        OutputFormat::Json => {
            let line = json!({
                "timestamp": reading.taken_at.to_rfc3339(),
                "device": reading.device,
                "core": t.core,
                "junction": t.junction,
                "vram": t.vram,
            });
            writeln!(out, "{}", line)
        }
    }
}

/// `message` is the library's explanation and may be empty.
pub fn write_failure<W: Write>(
    out: &mut W,
    format: OutputFormat,
    device: u32,
    message: &str,
    at: DateTime<Local>,
) -> io::Result<()> {
    match format {
        OutputFormat::Text if message.is_empty() => {
            writeln!(out, "Failed to get temperatures for GPU {}", device)
        }
        OutputFormat::Text => {
            writeln!(out, "Failed to get temperatures for GPU {}: {}", device, message)
        }
        OutputFormat::Json => {
            let error = if message.is_empty() { "no details" } else { message };
            let line = json!({
                "timestamp": at.to_rfc3339(),
                "device": device,
                "error": error,
            });
            writeln!(out, "{}", line)
        }
    }
}
