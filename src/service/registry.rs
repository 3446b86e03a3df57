//! Systemd service control operations.
//!
//! The registry trait keeps the reconciler testable; the real
//! implementation shells out to `systemctl` and maps non-zero exits to
//! errors with the captured stderr. Callers that can tolerate a failure
//! (stopping a unit that was never installed) handle it at the call site.

use std::process::Command;

use crate::error::InstallError;

pub trait ServiceRegistry {
    fn daemon_reload(&self) -> Result<(), InstallError>;
    fn enable(&self, unit: &str) -> Result<(), InstallError>;
    fn disable(&self, unit: &str) -> Result<(), InstallError>;
    fn start(&self, unit: &str) -> Result<(), InstallError>;
    fn stop(&self, unit: &str) -> Result<(), InstallError>;
    fn is_active(&self, unit: &str) -> Result<bool, InstallError>;
}

/// System-scope `systemctl`.
pub struct Systemctl;

fn systemctl(args: &[&str]) -> Result<(), InstallError> {
    let output = Command::new("systemctl")
        .args(args)
        .output()
        .map_err(|e| InstallError::System(format!("failed to execute systemctl: {e}")))?;

    if !output.status.success() {
        return Err(InstallError::System(format!(
            "systemctl {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(())
}

impl ServiceRegistry for Systemctl {
    fn daemon_reload(&self) -> Result<(), InstallError> {
        systemctl(&["daemon-reload"])
    }

    fn enable(&self, unit: &str) -> Result<(), InstallError> {
        systemctl(&["enable", unit])
    }

    fn disable(&self, unit: &str) -> Result<(), InstallError> {
        systemctl(&["disable", unit])
    }

    fn start(&self, unit: &str) -> Result<(), InstallError> {
        systemctl(&["start", unit])
    }

    fn stop(&self, unit: &str) -> Result<(), InstallError> {
        systemctl(&["stop", unit])
    }

    fn is_active(&self, unit: &str) -> Result<bool, InstallError> {
        // is-active exits 0 when active, 3 when inactive.
        let output = Command::new("systemctl")
            .args(["is-active", unit])
            .output()
            .map_err(|e| InstallError::System(format!("failed to execute systemctl: {e}")))?;
        Ok(output.status.success())
    }
}
