//! Service descriptor generation and systemd unit rendering.
//!
//! A descriptor is a pure value; rendering it to unit text has no side
//! effects. The client descriptor always restarts on failure with a
//! bounded backoff: an unconditional restart-always with no delay would
//! amplify a crash loop into a pinned CPU on the kind of small host the
//! client runs on.

use std::path::{Path, PathBuf};

use crate::account::Account;
use crate::display::endpoint::EndpointKind;
use crate::display::selector::Selection;
use crate::service::strategy::StartupStrategy;

pub const CLIENT_SERVICE: &str = "ledwall-client.service";
pub const XVFB_SERVICE: &str = "ledwall-xvfb.service";
pub const CLIENT_TIMER: &str = "ledwall-client.timer";

/// Fixed LED wall panel resolution the client renders at.
pub const PANEL_WIDTH: u32 = 256;
pub const PANEL_HEIGHT: u32 = 160;

const SEARCH_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Where the client executable lives and runs.
#[derive(Debug, Clone)]
pub struct ClientLayout {
    pub exec: PathBuf,
    pub workdir: PathBuf,
}

impl ClientLayout {
    /// Pattern the session-autostart liveness check greps running
    /// processes for. Weaker than unit-level supervision and kept that
    /// way: it matches on the executable name only.
    pub fn process_pattern(&self) -> String {
        self.exec
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledwall-client".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Never,
    OnFailure,
    Always,
}

impl RestartPolicy {
    fn unit_value(self) -> &'static str {
        match self {
            Self::Never => "no",
            Self::OnFailure => "on-failure",
            Self::Always => "always",
        }
    }
}

/// Durable specification for one supervised process.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub description: String,
    pub user: String,
    pub group: String,
    pub working_directory: Option<PathBuf>,
    pub environment: Vec<(String, String)>,
    pub exec_start_pre: Option<String>,
    pub exec_start: String,
    pub restart: RestartPolicy,
    pub restart_sec: u32,
    /// (interval seconds, burst) rate limit on start attempts.
    pub start_limit: Option<(u32, u32)>,
    pub wants: Vec<String>,
    pub after: Vec<String>,
    pub requires: Vec<String>,
    pub wanted_by: Option<String>,
}

impl ServiceDescriptor {
    pub fn unit_file_name(&self) -> String {
        format!("{}.service", self.name)
    }

    /// Render to systemd unit file text.
    pub fn render(&self) -> String {
        let mut content = String::with_capacity(1024);

        content.push_str("[Unit]\n");
        content.push_str(&format!("Description={}\n", self.description));
        for want in &self.wants {
            content.push_str(&format!("Wants={want}\n"));
        }
        for after in &self.after {
            content.push_str(&format!("After={after}\n"));
        }
        for requires in &self.requires {
            content.push_str(&format!("Requires={requires}\n"));
        }
        if let Some((interval, burst)) = self.start_limit {
            content.push_str(&format!("StartLimitIntervalSec={interval}\n"));
            content.push_str(&format!("StartLimitBurst={burst}\n"));
        }
        content.push('\n');

        content.push_str("[Service]\n");
        content.push_str("Type=simple\n");
        content.push_str(&format!("User={}\n", self.user));
        content.push_str(&format!("Group={}\n", self.group));
        if let Some(dir) = &self.working_directory {
            content.push_str(&format!("WorkingDirectory={}\n", dir.display()));
        }
        for (key, value) in &self.environment {
            content.push_str(&format!("Environment=\"{key}={value}\"\n"));
        }
        if let Some(pre) = &self.exec_start_pre {
            content.push_str(&format!("ExecStartPre={pre}\n"));
        }
        content.push_str(&format!("ExecStart={}\n", self.exec_start));
        content.push_str(&format!("Restart={}\n", self.restart.unit_value()));
        if self.restart != RestartPolicy::Never {
            content.push_str(&format!("RestartSec={}\n", self.restart_sec));
        }
        content.push_str("StandardOutput=journal\n");
        content.push_str("StandardError=journal\n");

        if let Some(target) = &self.wanted_by {
            content.push('\n');
            content.push_str("[Install]\n");
            content.push_str(&format!("WantedBy={target}\n"));
        }

        content
    }
}

/// The descriptors one installation needs: the client, plus the virtual
/// display service when the selection calls for one.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    pub client: ServiceDescriptor,
    pub vdisplay: Option<ServiceDescriptor>,
}

/// Pure function of the selection, account, layout, and strategy.
pub fn build_descriptors(
    selection: &Selection,
    account: &Account,
    layout: &ClientLayout,
    strategy: &StartupStrategy,
    installer_exe: &Path,
    xvfb: Option<&Path>,
) -> DescriptorSet {
    let vdisplay = selection.needs_virtual.then(|| {
        let xvfb = xvfb.map_or_else(|| PathBuf::from("/usr/bin/Xvfb"), Path::to_path_buf);
        ServiceDescriptor {
            name: "ledwall-xvfb".to_string(),
            description: "Virtual framebuffer display for the LED wall client".to_string(),
            user: account.name.clone(),
            group: account.group.clone(),
            working_directory: None,
            environment: Vec::new(),
            exec_start_pre: None,
            exec_start: format!(
                "{} {} -screen 0 {}x{}x24",
                xvfb.display(),
                selection.endpoint,
                PANEL_WIDTH,
                PANEL_HEIGHT
            ),
            restart: RestartPolicy::OnFailure,
            restart_sec: 10,
            start_limit: None,
            wants: Vec::new(),
            after: Vec::new(),
            requires: Vec::new(),
            // Pulled up via the client's Requires=, never enabled alone.
            wanted_by: None,
        }
    });

    let mut environment = vec![
        ("DISPLAY".to_string(), selection.endpoint.to_string()),
        ("PATH".to_string(), SEARCH_PATH.to_string()),
    ];
    if selection.endpoint.kind == EndpointKind::Physical {
        environment.insert(
            1,
            (
                "XAUTHORITY".to_string(),
                account.home.join(".Xauthority").display().to_string(),
            ),
        );
    }

    let mut after = vec!["network-online.target".to_string()];
    let mut requires = Vec::new();
    if vdisplay.is_some() {
        // The virtual display must be up strictly before the client.
        after.push(XVFB_SERVICE.to_string());
        requires.push(XVFB_SERVICE.to_string());
    }

    let client = ServiceDescriptor {
        name: "ledwall-client".to_string(),
        description: "LED wall display client".to_string(),
        user: account.name.clone(),
        group: account.group.clone(),
        working_directory: Some(layout.workdir.clone()),
        environment,
        exec_start_pre: strategy.exec_start_pre(installer_exe, selection, &account.name),
        exec_start: layout.exec.display().to_string(),
        restart: RestartPolicy::OnFailure,
        restart_sec: 10,
        start_limit: Some((60, 3)),
        wants: vec!["network-online.target".to_string()],
        after,
        requires,
        wanted_by: strategy
            .enables_client_at_boot()
            .then(|| "multi-user.target".to_string()),
    };

    DescriptorSet { client, vdisplay }
}
