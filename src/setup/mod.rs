//! Installation reconciliation.
//!
//! The reconciler treats the set of artifacts on disk as the persisted
//! installation state: every install is a transition from whatever set
//! exists to exactly the set the chosen strategy requires, and uninstall
//! removes the full set. Re-running install with the same inputs leaves
//! byte-identical artifacts behind.

pub mod artifacts;

use std::fs;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::account::Account;
use crate::display::selector::Selection;
use crate::error::InstallError;
use crate::service::descriptor::{
    CLIENT_SERVICE, CLIENT_TIMER, ClientLayout, XVFB_SERVICE, build_descriptors,
};
use crate::service::registry::ServiceRegistry;
use crate::service::strategy::{StartupStrategy, StrategyKind, autostart_entry, shell_login_block};

/// Everything any strategy can leave on the machine. Enumerable so that
/// supersede and teardown are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    StartTimer,
    ClientUnit,
    VdisplayUnit,
    AutostartEntry,
    ShellRcBlock,
}

impl Artifact {
    /// Teardown order: the timer before the unit it fires, the client
    /// before the display it requires.
    pub const ALL: [Artifact; 5] = [
        Artifact::StartTimer,
        Artifact::ClientUnit,
        Artifact::VdisplayUnit,
        Artifact::AutostartEntry,
        Artifact::ShellRcBlock,
    ];

    /// Registered unit name, for artifacts the service registry knows.
    pub fn unit_name(self) -> Option<&'static str> {
        match self {
            Self::StartTimer => Some(CLIENT_TIMER),
            Self::ClientUnit => Some(CLIENT_SERVICE),
            Self::VdisplayUnit => Some(XVFB_SERVICE),
            Self::AutostartEntry | Self::ShellRcBlock => None,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::StartTimer => "start timer",
            Self::ClientUnit => "client unit",
            Self::VdisplayUnit => "virtual display unit",
            Self::AutostartEntry => "autostart entry",
            Self::ShellRcBlock => "shell login block",
        }
    }

    fn home_scoped(self) -> bool {
        matches!(self, Self::AutostartEntry | Self::ShellRcBlock)
    }
}

/// Resolved filesystem locations for one installation target.
#[derive(Debug, Clone)]
pub struct InstallPaths {
    pub unit_dir: PathBuf,
    pub autostart_dir: PathBuf,
    pub shell_rc: PathBuf,
    /// uid/gid the home-scoped artifacts belong to.
    pub owner: Option<(u32, u32)>,
}

impl InstallPaths {
    pub fn system(account: &Account) -> Self {
        Self {
            unit_dir: PathBuf::from("/etc/systemd/system"),
            autostart_dir: account.home.join(".config/autostart"),
            shell_rc: account.home.join(".bashrc"),
            owner: Some((account.uid, account.gid)),
        }
    }

    pub fn artifact_path(&self, artifact: Artifact) -> PathBuf {
        match artifact {
            Artifact::StartTimer => self.unit_dir.join(CLIENT_TIMER),
            Artifact::ClientUnit => self.unit_dir.join(CLIENT_SERVICE),
            Artifact::VdisplayUnit => self.unit_dir.join(XVFB_SERVICE),
            Artifact::AutostartEntry => self.autostart_dir.join("ledwall-client.desktop"),
            Artifact::ShellRcBlock => self.shell_rc.clone(),
        }
    }
}

/// Fully materialized install transaction: artifact contents plus the
/// registry operations the strategy requires.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub strategy: StrategyKind,
    pub files: Vec<(Artifact, String)>,
    pub enable: Vec<&'static str>,
    pub disable: Vec<&'static str>,
    pub start: Vec<&'static str>,
}

impl InstallPlan {
    pub fn contains(&self, artifact: Artifact) -> bool {
        self.files.iter().any(|(a, _)| *a == artifact)
    }
}

/// Materialize the artifact set for one strategy and selection.
pub fn plan(
    strategy: &StartupStrategy,
    selection: &Selection,
    account: &Account,
    layout: &ClientLayout,
    installer_exe: &std::path::Path,
    xvfb: Option<&std::path::Path>,
) -> Result<InstallPlan, InstallError> {
    if *strategy == StartupStrategy::SessionAutostart {
        if selection.needs_virtual {
            return Err(InstallError::Config(
                "session autostart runs at interactive login and cannot drive a provisioned \
                 virtual display; choose a supervisor-backed strategy instead"
                    .to_string(),
            ));
        }
        return Ok(InstallPlan {
            strategy: StrategyKind::SessionAutostart,
            files: vec![
                (
                    Artifact::AutostartEntry,
                    autostart_entry(layout, selection),
                ),
                (
                    Artifact::ShellRcBlock,
                    shell_login_block(layout, selection),
                ),
            ],
            enable: Vec::new(),
            disable: Vec::new(),
            start: Vec::new(),
        });
    }

    let set = build_descriptors(selection, account, layout, strategy, installer_exe, xvfb);

    let mut files = vec![(Artifact::ClientUnit, set.client.render())];
    if let Some(vdisplay) = &set.vdisplay {
        files.push((Artifact::VdisplayUnit, vdisplay.render()));
    }

    let (enable, disable, start) = match strategy {
        StartupStrategy::SynchronousWait { .. } | StartupStrategy::FixedDelay { .. } => {
            (vec![CLIENT_SERVICE], Vec::new(), vec![CLIENT_SERVICE])
        }
        StartupStrategy::DeferredTimer { .. } => {
            files.push((
                Artifact::StartTimer,
                strategy.timer_unit().expect("deferred timer unit"),
            ));
            // Boot-time enablement moves to the timer.
            (vec![CLIENT_TIMER], vec![CLIENT_SERVICE], vec![CLIENT_TIMER])
        }
        StartupStrategy::SessionAutostart => unreachable!("handled above"),
    };

    Ok(InstallPlan {
        strategy: strategy.kind(),
        files,
        enable,
        disable,
        start,
    })
}

/// Infer the strategy of whatever installation is currently on disk.
pub fn detect_strategy(paths: &InstallPaths) -> Option<StrategyKind> {
    if paths.artifact_path(Artifact::StartTimer).exists() {
        return Some(StrategyKind::DeferredTimer);
    }
    if paths.artifact_path(Artifact::AutostartEntry).exists()
        || artifacts::has_rc_block(&paths.shell_rc)
    {
        return Some(StrategyKind::SessionAutostart);
    }

    let unit = paths.artifact_path(Artifact::ClientUnit);
    if unit.exists() {
        let content = fs::read_to_string(&unit).ok()?;
        if content.contains("await-display") {
            return Some(StrategyKind::SynchronousWait);
        }
        if content.contains("ExecStartPre=/bin/sleep") {
            return Some(StrategyKind::FixedDelay);
        }
    }
    None
}

pub struct Reconciler<'a> {
    paths: InstallPaths,
    registry: &'a dyn ServiceRegistry,
}

impl<'a> Reconciler<'a> {
    pub fn new(paths: InstallPaths, registry: &'a dyn ServiceRegistry) -> Self {
        Self { paths, registry }
    }

    /// Apply `plan`: supersede any prior strategy's artifacts, write the
    /// new set, then register and start what the strategy calls for.
    pub fn install(&self, plan: &InstallPlan) -> Result<(), InstallError> {
        if let Some(previous) = detect_strategy(&self.paths) {
            if previous != plan.strategy {
                info!("superseding existing {previous} installation with {}", plan.strategy);
            }
        }

        for artifact in Artifact::ALL {
            if !plan.contains(artifact) {
                self.remove_artifact(artifact)?;
            }
        }

        for (artifact, content) in &plan.files {
            let path = self.paths.artifact_path(*artifact);
            match artifact {
                Artifact::ShellRcBlock => artifacts::upsert_rc_block(&path, content)?,
                _ => artifacts::write_file_atomic(&path, content)?,
            }
            if artifact.home_scoped() {
                if let Some((uid, gid)) = self.paths.owner {
                    if *artifact == Artifact::AutostartEntry {
                        artifacts::chown_if_root(&self.paths.autostart_dir, uid, gid)?;
                    }
                    artifacts::chown_if_root(&path, uid, gid)?;
                }
            }
            info!("wrote {} ({})", path.display(), artifact.describe());
        }

        self.registry.daemon_reload()?;

        for unit in &plan.disable {
            if let Err(e) = self.registry.disable(unit) {
                debug!("disable {unit}: {e}");
            }
        }
        for unit in &plan.enable {
            self.registry.enable(unit)?;
        }
        for unit in &plan.start {
            // A failed start here is typically the readiness gate timing
            // out; the unit's restart policy keeps retrying, so it is
            // reported rather than treated as an installation failure.
            if let Err(e) = self.registry.start(unit) {
                warn!("{unit} did not start cleanly: {e}");
            }
        }
        for unit in &plan.start {
            match self.registry.is_active(unit) {
                Ok(true) => info!("{unit} is active"),
                Ok(false) => warn!("{unit} is not active yet; the supervisor will keep retrying"),
                Err(e) => warn!("could not query {unit}: {e}"),
            }
        }

        Ok(())
    }

    /// Remove every artifact any strategy could have created.
    pub fn uninstall(&self) -> Result<(), InstallError> {
        for artifact in Artifact::ALL {
            self.remove_artifact(artifact)?;
        }
        self.registry.daemon_reload()?;
        info!("all LED wall client artifacts removed");
        Ok(())
    }

    fn remove_artifact(&self, artifact: Artifact) -> Result<(), InstallError> {
        let path = self.paths.artifact_path(artifact);

        if let Some(unit) = artifact.unit_name() {
            if path.exists() {
                // Stop/disable failures are tolerable: the unit may
                // never have been registered.
                if let Err(e) = self.registry.stop(unit) {
                    debug!("stop {unit}: {e}");
                }
                if let Err(e) = self.registry.disable(unit) {
                    debug!("disable {unit}: {e}");
                }
            }
        }

        match artifact {
            Artifact::ShellRcBlock => {
                if artifacts::remove_rc_block(&path)? {
                    info!("removed {} from {}", artifact.describe(), path.display());
                }
            }
            _ => {
                if path.exists() {
                    fs::remove_file(&path).map_err(|e| {
                        InstallError::System(format!(
                            "failed to remove {}: {e}",
                            path.display()
                        ))
                    })?;
                    info!("removed {}", path.display());
                }
            }
        }

        Ok(())
    }
}

/// Live view of one installation, for status reporting.
#[derive(Debug)]
pub struct InstallStatus {
    pub strategy: Option<StrategyKind>,
    pub artifacts: Vec<(Artifact, PathBuf, bool)>,
    pub units: Vec<(&'static str, bool)>,
}

pub fn status(
    paths: &InstallPaths,
    registry: &dyn ServiceRegistry,
) -> Result<InstallStatus, InstallError> {
    let mut artifact_states = Vec::new();
    let mut units = Vec::new();

    for artifact in Artifact::ALL {
        let path = paths.artifact_path(artifact);
        let present = match artifact {
            Artifact::ShellRcBlock => artifacts::has_rc_block(&path),
            _ => path.exists(),
        };
        if present {
            if let Some(unit) = artifact.unit_name() {
                units.push((unit, registry.is_active(unit)?));
            }
        }
        artifact_states.push((artifact, path, present));
    }

    Ok(InstallStatus {
        strategy: detect_strategy(paths),
        artifacts: artifact_states,
        units,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::*;
    use crate::account;
    use crate::display::endpoint::DisplayEndpoint;

    #[derive(Default)]
    struct RecordingRegistry {
        calls: RefCell<Vec<String>>,
        active: RefCell<HashSet<String>>,
    }

    impl RecordingRegistry {
        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }

        fn called(&self, call: &str) -> bool {
            self.calls.borrow().iter().any(|c| c == call)
        }
    }

    impl ServiceRegistry for RecordingRegistry {
        fn daemon_reload(&self) -> Result<(), InstallError> {
            self.record("daemon-reload".to_string());
            Ok(())
        }

        fn enable(&self, unit: &str) -> Result<(), InstallError> {
            self.record(format!("enable {unit}"));
            Ok(())
        }

        fn disable(&self, unit: &str) -> Result<(), InstallError> {
            self.record(format!("disable {unit}"));
            Ok(())
        }

        fn start(&self, unit: &str) -> Result<(), InstallError> {
            self.record(format!("start {unit}"));
            self.active.borrow_mut().insert(unit.to_string());
            Ok(())
        }

        fn stop(&self, unit: &str) -> Result<(), InstallError> {
            self.record(format!("stop {unit}"));
            self.active.borrow_mut().remove(unit);
            Ok(())
        }

        fn is_active(&self, unit: &str) -> Result<bool, InstallError> {
            Ok(self.active.borrow().contains(unit))
        }
    }

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

    fn virtual_selection() -> Selection {
        Selection {
            endpoint: DisplayEndpoint::VIRTUAL,
            needs_virtual: true,
        }
    }

    fn sync_strategy() -> StartupStrategy {
        StartupStrategy::SynchronousWait {
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }

    fn timer_strategy() -> StartupStrategy {
        StartupStrategy::DeferredTimer {
            boot_offset: Duration::from_secs(120),
        }
    }

    fn make_plan(strategy: &StartupStrategy, selection: Selection) -> InstallPlan {
        plan(
            strategy,
            &selection,
            &account::fixture(),
            &layout(),
            Path::new("/usr/local/bin/ledwall-install"),
            Some(Path::new("/usr/bin/Xvfb")),
        )
        .unwrap()
    }

    fn temp_paths(dir: &tempfile::TempDir) -> InstallPaths {
        InstallPaths {
            unit_dir: dir.path().join("units"),
            autostart_dir: dir.path().join("autostart"),
            shell_rc: dir.path().join(".bashrc"),
            owner: None,
        }
    }

    #[test]
    fn sync_plan_installs_one_unit_and_starts_it() {
        let p = make_plan(&sync_strategy(), physical());

        assert_eq!(p.files.len(), 1);
        assert!(p.contains(Artifact::ClientUnit));
        assert_eq!(p.enable, vec![CLIENT_SERVICE]);
        assert_eq!(p.start, vec![CLIENT_SERVICE]);
        assert!(p.disable.is_empty());
    }

    #[test]
    fn virtual_plan_carries_the_framebuffer_unit() {
        let p = make_plan(&sync_strategy(), virtual_selection());

        assert!(p.contains(Artifact::ClientUnit));
        assert!(p.contains(Artifact::VdisplayUnit));
        // Only the client is registered; its Requires= pulls the rest.
        assert_eq!(p.enable, vec![CLIENT_SERVICE]);
    }

    #[test]
    fn timer_plan_moves_enablement_to_the_timer() {
        let p = make_plan(&timer_strategy(), physical());

        assert!(p.contains(Artifact::StartTimer));
        assert_eq!(p.enable, vec![CLIENT_TIMER]);
        assert_eq!(p.start, vec![CLIENT_TIMER]);
        assert_eq!(p.disable, vec![CLIENT_SERVICE]);
    }

    #[test]
    fn autostart_plan_has_no_units() {
        let p = make_plan(&StartupStrategy::SessionAutostart, physical());

        assert!(p.contains(Artifact::AutostartEntry));
        assert!(p.contains(Artifact::ShellRcBlock));
        assert!(!p.contains(Artifact::ClientUnit));
        assert!(p.enable.is_empty());
        assert!(p.start.is_empty());
    }

    #[test]
    fn autostart_rejects_a_virtual_display() {
        let err = plan(
            &StartupStrategy::SessionAutostart,
            &virtual_selection(),
            &account::fixture(),
            &layout(),
            Path::new("/usr/local/bin/ledwall-install"),
            None,
        )
        .unwrap_err();

        assert!(matches!(err, InstallError::Config(_)));
    }

    #[test]
    fn install_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RecordingRegistry::default();
        let reconciler = Reconciler::new(temp_paths(&dir), &registry);
        let p = make_plan(&timer_strategy(), physical());

        reconciler.install(&p).unwrap();
        let unit_path = reconciler.paths.artifact_path(Artifact::ClientUnit);
        let timer_path = reconciler.paths.artifact_path(Artifact::StartTimer);
        let first_unit = std::fs::read(&unit_path).unwrap();
        let first_timer = std::fs::read(&timer_path).unwrap();

        reconciler.install(&p).unwrap();
        assert_eq!(std::fs::read(&unit_path).unwrap(), first_unit);
        assert_eq!(std::fs::read(&timer_path).unwrap(), first_timer);
        assert_eq!(
            std::fs::read_dir(&reconciler.paths.unit_dir).unwrap().count(),
            2
        );
    }

    #[test]
    fn switching_autostart_to_sync_supersedes_session_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RecordingRegistry::default();
        let paths = temp_paths(&dir);
        std::fs::write(&paths.shell_rc, "export EDITOR=vi\n").unwrap();
        let reconciler = Reconciler::new(paths, &registry);

        reconciler
            .install(&make_plan(&StartupStrategy::SessionAutostart, physical()))
            .unwrap();
        assert!(reconciler.paths.artifact_path(Artifact::AutostartEntry).exists());
        assert!(artifacts::has_rc_block(&reconciler.paths.shell_rc));

        reconciler.install(&make_plan(&sync_strategy(), physical())).unwrap();

        assert!(!reconciler.paths.artifact_path(Artifact::AutostartEntry).exists());
        assert!(!artifacts::has_rc_block(&reconciler.paths.shell_rc));
        assert!(reconciler.paths.artifact_path(Artifact::ClientUnit).exists());
        assert!(!reconciler.paths.artifact_path(Artifact::StartTimer).exists());
        // The user's own shell init content survives the switch.
        let rc = std::fs::read_to_string(&reconciler.paths.shell_rc).unwrap();
        assert_eq!(rc, "export EDITOR=vi\n");
    }

    #[test]
    fn switching_sync_to_timer_disables_boot_start() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RecordingRegistry::default();
        let reconciler = Reconciler::new(temp_paths(&dir), &registry);

        reconciler.install(&make_plan(&sync_strategy(), physical())).unwrap();
        reconciler.install(&make_plan(&timer_strategy(), physical())).unwrap();

        assert!(registry.called("disable ledwall-client.service"));
        assert!(registry.called("enable ledwall-client.timer"));
        assert!(reconciler.paths.artifact_path(Artifact::StartTimer).exists());
    }

    #[test]
    fn uninstall_removes_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RecordingRegistry::default();
        let paths = temp_paths(&dir);
        std::fs::write(&paths.shell_rc, "alias ll='ls -l'\n").unwrap();
        let reconciler = Reconciler::new(paths, &registry);

        reconciler
            .install(&make_plan(&StartupStrategy::SessionAutostart, physical()))
            .unwrap();
        reconciler.uninstall().unwrap();

        for artifact in Artifact::ALL {
            let path = reconciler.paths.artifact_path(artifact);
            match artifact {
                Artifact::ShellRcBlock => assert!(!artifacts::has_rc_block(&path)),
                _ => assert!(!path.exists(), "{} still present", artifact.describe()),
            }
        }
        let rc = std::fs::read_to_string(&reconciler.paths.shell_rc).unwrap();
        assert_eq!(rc, "alias ll='ls -l'\n");
    }

    #[test]
    fn uninstall_stops_units_before_removal() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RecordingRegistry::default();
        let reconciler = Reconciler::new(temp_paths(&dir), &registry);

        reconciler.install(&make_plan(&sync_strategy(), virtual_selection())).unwrap();
        reconciler.uninstall().unwrap();

        assert!(registry.called("stop ledwall-client.service"));
        assert!(registry.called("stop ledwall-xvfb.service"));
        assert!(!registry.is_active("ledwall-client.service").unwrap());
    }

    #[test]
    fn detects_the_installed_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RecordingRegistry::default();
        let reconciler = Reconciler::new(temp_paths(&dir), &registry);

        assert_eq!(detect_strategy(&reconciler.paths), None);

        reconciler.install(&make_plan(&sync_strategy(), physical())).unwrap();
        assert_eq!(
            detect_strategy(&reconciler.paths),
            Some(StrategyKind::SynchronousWait)
        );

        reconciler
            .install(&make_plan(
                &StartupStrategy::FixedDelay {
                    delay: Duration::from_secs(30),
                },
                physical(),
            ))
            .unwrap();
        assert_eq!(
            detect_strategy(&reconciler.paths),
            Some(StrategyKind::FixedDelay)
        );

        reconciler.install(&make_plan(&timer_strategy(), physical())).unwrap();
        assert_eq!(
            detect_strategy(&reconciler.paths),
            Some(StrategyKind::DeferredTimer)
        );

        reconciler
            .install(&make_plan(&StartupStrategy::SessionAutostart, physical()))
            .unwrap();
        assert_eq!(
            detect_strategy(&reconciler.paths),
            Some(StrategyKind::SessionAutostart)
        );
    }

    #[test]
    fn status_reports_presence_and_activity() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RecordingRegistry::default();
        let reconciler = Reconciler::new(temp_paths(&dir), &registry);

        reconciler.install(&make_plan(&sync_strategy(), physical())).unwrap();
        let report = status(&reconciler.paths, &registry).unwrap();

        assert_eq!(report.strategy, Some(StrategyKind::SynchronousWait));
        assert!(report.units.contains(&(CLIENT_SERVICE, true)));
        let client = report
            .artifacts
            .iter()
            .find(|(a, _, _)| *a == Artifact::ClientUnit)
            .unwrap();
        assert!(client.2);
    }
}
