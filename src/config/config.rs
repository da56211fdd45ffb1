// src/config/config.rs

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use configparser::ini::Ini;
use nix::unistd::User;

use crate::error::{MonitorError, Result};
use crate::globals::{
    default_interval, DEFAULT_LIBRARY, SYSTEM_CONFIG_FILE, USER_CONFIG_FILE,
};
use crate::modules::report::OutputFormat;
use crate::modules::thresholds::Thresholds;

/// Everything the monitor needs to run, after config file and CLI flags
/// have been merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub interval: Duration,
    pub library: PathBuf,
    pub format: OutputFormat,
    pub thresholds: Thresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            library: PathBuf::from(DEFAULT_LIBRARY),
            format: OutputFormat::Text,
            thresholds: Thresholds::default(),
        }
    }
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub interval_secs: Option<u64>,
    pub library: Option<PathBuf>,
    pub json: bool,
}

impl Settings {
    pub fn with_overrides(mut self, overrides: &Overrides) -> Result<Self> {
        if let Some(secs) = overrides.interval_secs {
            self.interval = interval_from_secs(secs)?;
        }
        if let Some(library) = &overrides.library {
            self.library = library.clone();
        }
        if overrides.json {
            self.format = OutputFormat::Json;
        }
        Ok(self)
    }
}

fn interval_from_secs(secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(MonitorError::Config("interval must be at least 1 second".into()));
    }
    Ok(Duration::from_secs(secs))
}

pub struct Config {
    path: Mutex<PathBuf>,
    config: Mutex<Ini>,
}

impl Config {
    pub fn new() -> Self {
        Config {
            path: Mutex::new(PathBuf::new()),
            config: Mutex::new(Ini::new()),
        }
    }

    pub fn set_path(&self, path: PathBuf) -> Result<()> {
        *self.path.lock().unwrap_or_else(PoisonError::into_inner) = path.clone();

        if path.exists() {
            self.update_config()?;
        }

        Ok(())
    }

    pub fn has_config(&self) -> bool {
        self.get_path().exists()
    }

    pub fn get_path(&self) -> PathBuf {
        self.path.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Reloads the file. A file that fails to parse is reported and the
    /// previous values (defaults on first load) stay in effect.
    pub fn update_config(&self) -> Result<()> {
        let path = self.get_path();

        let mut new_config = Ini::new();
        match new_config.load(path.to_str().unwrap_or("")) {
            Ok(_) => {
                *self.config.lock().unwrap_or_else(PoisonError::into_inner) = new_config;
            }
            Err(e) => {
                tracing::warn!("failed to parse {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    pub fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn get_u32(&self, section: &str, key: &str) -> Result<Option<u32>> {
        self.get_u64(section, key)?
            .map(|v| {
                u32::try_from(v).map_err(|_| {
                    MonitorError::Config(format!("[{}] {} = {} is out of range", section, key, v))
                })
            })
            .transpose()
    }

    pub fn get_u64(&self, section: &str, key: &str) -> Result<Option<u64>> {
        match self.get_string(section, key) {
            Some(s) => s.parse().map(Some).map_err(|_| {
                MonitorError::Config(format!(
                    "[{}] {} = \"{}\" is not a non-negative integer",
                    section, key, s
                ))
            }),
            None => Ok(None),
        }
    }

    /// Builds [`Settings`] from the loaded file, defaults for missing keys.
    pub fn settings(&self) -> Result<Settings> {
        let defaults = Settings::default();

        let interval = match self.get_u64("monitor", "interval")? {
            Some(secs) => interval_from_secs(secs)?,
            None => defaults.interval,
        };
        let library = self
            .get_string("monitor", "library")
            .map(PathBuf::from)
            .unwrap_or(defaults.library);
        let format = match self.get_string("monitor", "format") {
            Some(s) => s.parse()?,
            None => defaults.format,
        };
        let thresholds = Thresholds {
            core: self.get_u32("thresholds", "core")?,
            junction: self.get_u32("thresholds", "junction")?,
            vram: self.get_u32("thresholds", "vram")?,
        };

        Ok(Settings {
            interval,
            library,
            format,
            thresholds,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

// Global config instance
lazy_static::lazy_static! {
    pub static ref CONFIG: Config = Config::new();
}

/// Find the config file to use
///
/// Look for a config file in the following prioritization order:
/// 1. Command line argument
/// 2. User config file
/// 3. System config file
///
/// The system path is returned even when it does not exist; a missing file
/// means defaults.
pub fn find_config_file(args_config_file: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = args_config_file {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(MonitorError::Config(format!(
            "config file specified with '--config {}' not found",
            path.display()
        )));
    }

    let user_config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| get_home_dir().join(".config"));
    let user_config_file = user_config_dir.join(USER_CONFIG_FILE);
    if user_config_file.is_file() {
        return Ok(user_config_file);
    }

    Ok(PathBuf::from(SYSTEM_CONFIG_FILE))
}

/// Home of the invoking user, so `sudo gpu-monitor` still finds the
/// caller's config rather than root's.
fn get_home_dir() -> PathBuf {
    std::env::var("SUDO_USER")
        .or_else(|_| std::env::var("USER"))
        .ok()
        .and_then(|name| User::from_name(&name).ok().flatten())
        .map(|user| user.dir)
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("/root"))
}
