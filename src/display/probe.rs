//! Account-scoped display liveness probe.
//!
//! A probe asks one question: can this account talk to this display right
//! now? It is read-only, completes within `xset`'s own connection timeout,
//! and reports "not usable" as a normal `false`. Only a broken probe
//! mechanism (missing tool, failed identity switch) is an error.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::debug;

use crate::account::Account;
use crate::display::endpoint::DisplayEndpoint;
use crate::error::InstallError;

pub trait DisplayProbe {
    /// `Ok(true)` if `account` can use `endpoint` right now.
    fn probe(&self, endpoint: DisplayEndpoint, account: &Account) -> Result<bool, InstallError>;
}

/// Probes by running `xset -display :N q` under the target account.
pub struct XsetProbe {
    xset: PathBuf,
}

impl XsetProbe {
    /// Locate `xset` on PATH. Its absence is fatal: without it no display
    /// can ever be declared ready.
    pub fn locate() -> Result<Self, InstallError> {
        let xset = which::which("xset")
            .map_err(|_| InstallError::MissingTool("xset".to_string()))?;
        Ok(Self { xset })
    }
}

impl DisplayProbe for XsetProbe {
    fn probe(&self, endpoint: DisplayEndpoint, account: &Account) -> Result<bool, InstallError> {
        let display = endpoint.to_string();
        let xauthority = account.home.join(".Xauthority");

        // Display access is account-scoped: when the installer runs as
        // root the check must still happen under the client's identity.
        let mut cmd = if account.is_current_user() {
            let mut c = Command::new(&self.xset);
            c.args(["-display", display.as_str(), "q"]);
            c
        } else {
            let mut c = Command::new("runuser");
            c.args(["-u", account.name.as_str(), "--"])
                .arg(&self.xset)
                .args(["-display", display.as_str(), "q"]);
            c
        };

        let status = cmd
            .env("XAUTHORITY", &xauthority)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| InstallError::System(format!("failed to execute xset probe: {e}")))?;

        debug!(
            "probe {} as {}: {}",
            display,
            account.name,
            if status.success() { "usable" } else { "not usable" }
        );

        Ok(status.success())
    }
}
