// src/privilege.rs

use nix::unistd::Uid;

use crate::error::{MonitorError, Result};

pub fn is_root() -> bool {
    Uid::effective().is_root()
}

/// Fails unless the effective user is root. Register access in the native
/// library needs it, so this runs before the library is even loaded.
pub fn root_check() -> Result<()> {
    if !is_root() {
        eprintln!("\n{}\n", "-".repeat(33) + " Root check " + &"-".repeat(34));
        return Err(MonitorError::NotRoot);
    }
    Ok(())
}
