//! Startup strategy variants.
//!
//! Exactly one strategy is active per installation. Each variant decides
//! how display readiness is coupled to process start: wait for it, sleep
//! past it, defer the start, or leave supervision to the login session.
//! The artifact sets are mutually exclusive; the reconciler supersedes
//! whichever variant was installed before.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::display::selector::Selection;
use crate::service::descriptor::{CLIENT_SERVICE, ClientLayout};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupStrategy {
    /// Pre-start hook polls the display until ready; a timeout fails the
    /// pre-start phase and hands control to the restart policy.
    SynchronousWait { max_attempts: u32, interval: Duration },
    /// Pre-start hook is a flat sleep. Simpler and deliberately less
    /// correct: it trades readiness tracking for removing the polling
    /// dependency.
    FixedDelay { delay: Duration },
    /// The unit is not started at boot; a one-shot timer starts it a
    /// fixed offset after boot instead.
    DeferredTimer { boot_offset: Duration },
    /// No supervisor at all: an XDG autostart entry plus a login-shell
    /// block launch the client at session login.
    SessionAutostart,
}

/// Strategy tag, used for supersede logging and status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    SynchronousWait,
    FixedDelay,
    DeferredTimer,
    SessionAutostart,
}

impl StrategyKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::SynchronousWait => "synchronous-wait",
            Self::FixedDelay => "fixed-delay",
            Self::DeferredTimer => "deferred-timer",
            Self::SessionAutostart => "session-autostart",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl StartupStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::SynchronousWait { .. } => StrategyKind::SynchronousWait,
            Self::FixedDelay { .. } => StrategyKind::FixedDelay,
            Self::DeferredTimer { .. } => StrategyKind::DeferredTimer,
            Self::SessionAutostart => StrategyKind::SessionAutostart,
        }
    }

    /// The pre-start hook this strategy puts in the client unit.
    pub fn exec_start_pre(
        &self,
        installer_exe: &Path,
        selection: &Selection,
        account_name: &str,
    ) -> Option<String> {
        match self {
            Self::SynchronousWait {
                max_attempts,
                interval,
            } => {
                let mut cmd = format!(
                    "{} await-display --display {} --account {} --max-attempts {} --interval {}",
                    installer_exe.display(),
                    selection.endpoint,
                    account_name,
                    max_attempts,
                    interval.as_secs()
                );
                if selection.needs_virtual {
                    cmd.push_str(" --virtual");
                }
                Some(cmd)
            }
            Self::FixedDelay { delay } => Some(format!("/bin/sleep {}", delay.as_secs())),
            Self::DeferredTimer { .. } | Self::SessionAutostart => None,
        }
    }

    /// Whether the client unit itself is enabled for boot-time start.
    pub fn enables_client_at_boot(&self) -> bool {
        matches!(
            self,
            Self::SynchronousWait { .. } | Self::FixedDelay { .. }
        )
    }

    /// Timer unit text, for the variant that has one.
    pub fn timer_unit(&self) -> Option<String> {
        let Self::DeferredTimer { boot_offset } = self else {
            return None;
        };

        let mut content = String::with_capacity(256);
        content.push_str("[Unit]\n");
        content.push_str("Description=Deferred start of the LED wall display client\n");
        content.push('\n');
        content.push_str("[Timer]\n");
        content.push_str(&format!("OnBootSec={}\n", boot_offset.as_secs()));
        content.push_str(&format!("Unit={CLIENT_SERVICE}\n"));
        content.push('\n');
        content.push_str("[Install]\n");
        content.push_str("WantedBy=timers.target\n");
        Some(content)
    }
}

/// XDG autostart entry launching the client at session login, guarded by
/// a process-pattern check so a second login does not start a second
/// copy.
pub fn autostart_entry(layout: &ClientLayout, selection: &Selection) -> String {
    let pattern = layout.process_pattern();
    let mut content = String::with_capacity(384);
    content.push_str("[Desktop Entry]\n");
    content.push_str("Type=Application\n");
    content.push_str("Name=LED Wall Client\n");
    content.push_str("Comment=Starts the LED wall display client at session login\n");
    content.push_str(&format!("Path={}\n", layout.workdir.display()));
    content.push_str(&format!(
        "Exec=/bin/sh -c 'pgrep -f {pattern} >/dev/null || exec env DISPLAY={} {}'\n",
        selection.endpoint,
        layout.exec.display()
    ));
    content.push_str("X-GNOME-Autostart-enabled=true\n");
    content
}

/// Login-shell fallback for sessions that skip the XDG autostart path.
/// Same process-pattern guard, same deliberate weakness.
pub fn shell_login_block(layout: &ClientLayout, selection: &Selection) -> String {
    let pattern = layout.process_pattern();
    format!(
        "if [ -n \"$DISPLAY\" ] && ! pgrep -f {pattern} >/dev/null 2>&1; then\n    (cd {} && DISPLAY={} nohup {} >/dev/null 2>&1 &)\nfi",
        layout.workdir.display(),
        selection.endpoint,
        layout.exec.display()
    )
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::display::endpoint::DisplayEndpoint;

    fn layout() -> ClientLayout {
        ClientLayout {
            exec: PathBuf::from("/opt/ledwall/ledwall-client"),
            workdir: PathBuf::from("/opt/ledwall"),
        }
    }

    fn physical() -> Selection {
        Selection {
            endpoint: DisplayEndpoint::PRIMARY,
            needs_virtual: false,
        }
    }

    const EXE: &str = "/usr/local/bin/ledwall-install";

    #[test]
    fn sync_wait_invokes_the_gate_subcommand() {
        let strategy = StartupStrategy::SynchronousWait {
            max_attempts: 30,
            interval: Duration::from_secs(2),
        };
        let pre = strategy
            .exec_start_pre(Path::new(EXE), &physical(), "pi")
            .unwrap();

        assert_eq!(
            pre,
            "/usr/local/bin/ledwall-install await-display --display :0 --account pi \
             --max-attempts 30 --interval 2"
        );
    }

    #[test]
    fn sync_wait_marks_virtual_endpoints() {
        let strategy = StartupStrategy::SynchronousWait {
            max_attempts: 10,
            interval: Duration::from_secs(1),
        };
        let selection = Selection {
            endpoint: DisplayEndpoint::VIRTUAL,
            needs_virtual: true,
        };
        let pre = strategy
            .exec_start_pre(Path::new(EXE), &selection, "pi")
            .unwrap();

        assert!(pre.contains("--display :1"));
        assert!(pre.ends_with("--virtual"));
    }

    #[test]
    fn fixed_delay_is_a_flat_sleep() {
        let strategy = StartupStrategy::FixedDelay {
            delay: Duration::from_secs(30),
        };
        assert_eq!(
            strategy.exec_start_pre(Path::new(EXE), &physical(), "pi"),
            Some("/bin/sleep 30".to_string())
        );
    }

    #[test]
    fn only_the_timer_variant_has_a_timer_unit() {
        let timer = StartupStrategy::DeferredTimer {
            boot_offset: Duration::from_secs(120),
        };
        let content = timer.timer_unit().unwrap();
        assert!(content.contains("OnBootSec=120\n"));
        assert!(content.contains("Unit=ledwall-client.service\n"));
        assert!(content.contains("WantedBy=timers.target\n"));

        assert!(StartupStrategy::SessionAutostart.timer_unit().is_none());
        assert!(
            StartupStrategy::FixedDelay {
                delay: Duration::from_secs(5)
            }
            .timer_unit()
            .is_none()
        );
    }

    #[test]
    fn boot_enablement_per_variant() {
        assert!(
            StartupStrategy::SynchronousWait {
                max_attempts: 1,
                interval: Duration::ZERO
            }
            .enables_client_at_boot()
        );
        assert!(
            StartupStrategy::FixedDelay {
                delay: Duration::ZERO
            }
            .enables_client_at_boot()
        );
        assert!(
            !StartupStrategy::DeferredTimer {
                boot_offset: Duration::ZERO
            }
            .enables_client_at_boot()
        );
        assert!(!StartupStrategy::SessionAutostart.enables_client_at_boot());
    }

    #[test]
    fn autostart_artifacts_carry_the_process_guard() {
        let entry = autostart_entry(&layout(), &physical());
        assert!(entry.contains("pgrep -f ledwall-client"));
        assert!(entry.contains("Path=/opt/ledwall\n"));
        assert!(entry.contains("DISPLAY=:0"));

        let block = shell_login_block(&layout(), &physical());
        assert!(block.contains("pgrep -f ledwall-client"));
        assert!(block.contains("[ -n \"$DISPLAY\" ]"));
        assert!(block.contains("nohup /opt/ledwall/ledwall-client"));
    }
}
