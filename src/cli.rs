//! CLI argument parsing for the LED wall installer.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::service::strategy::StartupStrategy;

#[derive(Parser)]
#[command(name = "ledwall-install")]
#[command(version, about = "Provision the LED wall display client as a supervised service")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Install (or re-install) the client, superseding any previous
    /// startup strategy.
    Install(InstallArgs),
    /// Stop the client and remove every artifact any strategy created.
    Uninstall(TargetArgs),
    /// Report installed artifacts, the detected strategy, and unit state.
    Status(TargetArgs),
    /// Wait for a display to become usable; used as the generated unit's
    /// pre-start hook. Exits non-zero on timeout.
    AwaitDisplay(AwaitArgs),
}

#[derive(clap::Args)]
pub struct TargetArgs {
    /// Account the client runs as
    #[arg(long, default_value = "pi")]
    pub account: String,
}

#[derive(clap::Args)]
pub struct InstallArgs {
    /// Account the client runs as
    #[arg(long, default_value = "pi")]
    pub account: String,

    /// Startup strategy (prompted interactively when omitted)
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Path to the client executable
    #[arg(long, default_value = "/opt/ledwall/ledwall-client")]
    pub client: PathBuf,

    /// Client working directory (also receives config.json)
    #[arg(long, default_value = "/opt/ledwall")]
    pub workdir: PathBuf,

    /// Server URL written into the client configuration
    #[arg(long)]
    pub server_url: Option<String>,

    /// Readiness gate probe budget (synchronous-wait strategy)
    #[arg(long, default_value_t = 30)]
    pub max_attempts: u32,

    /// Seconds between readiness probes
    #[arg(long, default_value_t = 2)]
    pub interval: u64,

    /// Pre-start sleep in seconds (fixed-delay strategy)
    #[arg(long, default_value_t = 30)]
    pub delay: u64,

    /// Seconds after boot the timer fires (deferred-timer strategy)
    #[arg(long, default_value_t = 120)]
    pub boot_offset: u64,

    /// Non-interactive mode: no prompts, virtual display fallback
    #[arg(long)]
    pub no_interaction: bool,

    /// Register units but do not start anything
    #[arg(long)]
    pub no_start: bool,

    /// Show what would be installed without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Pre-start hook polls the display until ready
    Sync,
    /// Pre-start hook sleeps a fixed duration
    Delay,
    /// One-shot timer starts the unit after boot
    Timer,
    /// XDG autostart + login shell, no supervisor
    Autostart,
}

impl StrategyArg {
    pub fn to_strategy(self, args: &InstallArgs) -> StartupStrategy {
        match self {
            Self::Sync => StartupStrategy::SynchronousWait {
                max_attempts: args.max_attempts,
                interval: Duration::from_secs(args.interval),
            },
            Self::Delay => StartupStrategy::FixedDelay {
                delay: Duration::from_secs(args.delay),
            },
            Self::Timer => StartupStrategy::DeferredTimer {
                boot_offset: Duration::from_secs(args.boot_offset),
            },
            Self::Autostart => StartupStrategy::SessionAutostart,
        }
    }
}

#[derive(clap::Args)]
pub struct AwaitArgs {
    /// X display to wait for (e.g. :0)
    #[arg(long)]
    pub display: String,

    /// The display is a provisioned virtual framebuffer
    #[arg(long = "virtual")]
    pub virtual_display: bool,

    /// Account whose access is probed
    #[arg(long, default_value = "pi")]
    pub account: String,

    /// Give up after this many probes
    #[arg(long, default_value_t = 30)]
    pub max_attempts: u32,

    /// Seconds between probes
    #[arg(long, default_value_t = 2)]
    pub interval: u64,
}
