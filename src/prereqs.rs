//! Prerequisite verification.
//!
//! Everything here runs before the first artifact is written, so a
//! missing tool aborts the installation cleanly instead of leaving a
//! unit that can never start.

use std::path::PathBuf;

use log::warn;

use crate::error::InstallError;
use crate::service::descriptor::ClientLayout;

/// Locate a required external tool on PATH.
pub fn require_tool(name: &str) -> Result<PathBuf, InstallError> {
    which::which(name).map_err(|_| InstallError::MissingTool(name.to_string()))
}

/// The client executable must exist and be executable before a unit
/// points at it.
pub fn check_client(layout: &ClientLayout) -> Result<(), InstallError> {
    if !layout.exec.exists() {
        return Err(InstallError::Config(format!(
            "client executable not found: {}",
            layout.exec.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&layout.exec)
            .map_err(|e| {
                InstallError::System(format!(
                    "failed to stat {}: {e}",
                    layout.exec.display()
                ))
            })?
            .permissions()
            .mode();
        if mode & 0o111 == 0 {
            return Err(InstallError::Config(format!(
                "client executable is not executable: {} (run: chmod +x {})",
                layout.exec.display(),
                layout.exec.display()
            )));
        }
    }

    Ok(())
}

/// The client plays media through ffplay; it degrades without it, so
/// absence is a warning with an install hint rather than an abort.
pub fn warn_if_ffplay_missing() {
    if which::which("ffplay").is_err() {
        warn!("ffplay not found; the client cannot play media content until FFmpeg is installed");
        warn!("install it with: sudo apt-get install ffmpeg");
    }
}

/// Identity switching for account-scoped probes needs runuser when the
/// installer runs as root.
pub fn check_identity_switch(target_is_current_user: bool) -> Result<(), InstallError> {
    if target_is_current_user {
        return Ok(());
    }
    require_tool("runuser").map(|_| ())
}
