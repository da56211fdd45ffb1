// src/modules/thresholds.rs

use std::fmt;

use crate::sensor::Temperatures;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensor {
    Core,
    Junction,
    Vram,
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sensor::Core => write!(f, "core"),
            Sensor::Junction => write!(f, "junction"),
            Sensor::Vram => write!(f, "VRAM"),
        }
    }
}

/// Optional warning limits in °C. Unset limits never fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Thresholds {
    pub core: Option<u32>,
    pub junction: Option<u32>,
    pub vram: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exceeded {
    pub sensor: Sensor,
    pub value: u32,
    pub limit: u32,
}

impl Thresholds {
    /// Every sensor at or above its limit.
    pub fn exceeded(&self, temps: &Temperatures) -> Vec<Exceeded> {
        [
            (Sensor::Core, temps.core, self.core),
            (Sensor::Junction, temps.junction, self.junction),
            (Sensor::Vram, temps.vram, self.vram),
        ]
        .into_iter()
        .filter_map(|(sensor, value, limit)| match limit {
            Some(limit) if value >= limit => Some(Exceeded { sensor, value, limit }),
            _ => None,
        })
        .collect()
    }
}
