use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use ledwall_install::account::{self, Account};
use ledwall_install::cli::{Args, AwaitArgs, Cmd, InstallArgs, StrategyArg, TargetArgs};
use ledwall_install::client_config;
use ledwall_install::display::endpoint::{DisplayEndpoint, EndpointKind};
use ledwall_install::display::probe::XsetProbe;
use ledwall_install::display::readiness::{ReadinessOutcome, await_ready};
use ledwall_install::display::selector::{AssumeVirtual, DEFAULT_CANDIDATES, select_endpoint};
use ledwall_install::error::InstallError;
use ledwall_install::prereqs;
use ledwall_install::service::descriptor::ClientLayout;
use ledwall_install::service::registry::Systemctl;
use ledwall_install::setup::{self, InstallPaths, Reconciler};
use ledwall_install::wizard;

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {}] {}",
                buf.timestamp(),
                record.level(),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(e) = real_main() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    match Args::parse().cmd {
        Cmd::Install(args) => run_install(args),
        Cmd::Uninstall(args) => run_uninstall(args),
        Cmd::Status(args) => run_status(&args),
        Cmd::AwaitDisplay(args) => run_await_display(&args),
    }
}

fn run_install(args: InstallArgs) -> Result<()> {
    if !args.dry_run {
        account::require_root().context("installation aborted")?;
    }
    let account = Account::lookup(&args.account)?;
    let layout = ClientLayout {
        exec: args.client.clone(),
        workdir: args.workdir.clone(),
    };

    prereqs::check_client(&layout)?;
    prereqs::check_identity_switch(account.is_current_user())?;
    prereqs::warn_if_ffplay_missing();

    let probe = XsetProbe::locate()?;
    let selection = if args.no_interaction {
        select_endpoint(&probe, &AssumeVirtual, &account, &DEFAULT_CANDIDATES)?
    } else {
        select_endpoint(
            &probe,
            &wizard::InteractivePrompt,
            &account,
            &DEFAULT_CANDIDATES,
        )?
    };
    info!("rendering on the {}", selection.endpoint.describe());

    let strategy = match args.strategy {
        Some(choice) => choice.to_strategy(&args),
        None if args.no_interaction => StrategyArg::Sync.to_strategy(&args),
        None => wizard::choose_strategy(&args)?,
    };
    info!("startup strategy: {}", strategy.kind());

    let xvfb = if selection.needs_virtual {
        Some(prereqs::require_tool("Xvfb")?)
    } else {
        None
    };

    let installer_exe =
        std::env::current_exe().context("cannot resolve the installer executable path")?;
    let mut plan = setup::plan(
        &strategy,
        &selection,
        &account,
        &layout,
        &installer_exe,
        xvfb.as_deref(),
    )?;

    let paths = InstallPaths::system(&account);
    if args.dry_run {
        wizard::show_plan(&plan, &paths);
        return Ok(());
    }

    if args.no_start {
        plan.start.clear();
    }

    client_config::write_client_config(&args.workdir, &account, args.server_url.as_deref())?;

    let registry = Systemctl;
    Reconciler::new(paths.clone(), &registry)
        .install(&plan)
        .context("installation failed")?;

    let report = setup::status(&paths, &registry)?;
    wizard::show_completion(&selection, plan.strategy, &report);
    Ok(())
}

fn run_uninstall(args: TargetArgs) -> Result<()> {
    account::require_root().context("uninstall aborted")?;
    let account = Account::lookup(&args.account)?;

    let registry = Systemctl;
    Reconciler::new(InstallPaths::system(&account), &registry)
        .uninstall()
        .context("uninstall failed")?;
    Ok(())
}

fn run_status(args: &TargetArgs) -> Result<()> {
    let account = Account::lookup(&args.account)?;
    let registry = Systemctl;
    let report = setup::status(&InstallPaths::system(&account), &registry)?;
    wizard::show_status(&report);
    Ok(())
}

fn run_await_display(args: &AwaitArgs) -> Result<()> {
    let account = Account::lookup(&args.account)?;
    let probe = XsetProbe::locate()?;

    let kind = if args.virtual_display {
        EndpointKind::Virtual
    } else {
        EndpointKind::Physical
    };
    let endpoint = DisplayEndpoint::from_display_str(&args.display, kind).ok_or_else(|| {
        InstallError::Config(format!("invalid display identifier: {}", args.display))
    })?;

    match await_ready(
        &probe,
        endpoint,
        &account,
        args.max_attempts,
        Duration::from_secs(args.interval),
    )? {
        ReadinessOutcome::Ready { .. } => Ok(()),
        ReadinessOutcome::TimedOut { attempts } => {
            // Reported, not fatal to the installation: the exit status
            // hands the decision to the supervisor's restart policy.
            warn!("display {endpoint} not usable after {attempts} attempt(s), giving up");
            std::process::exit(1);
        }
    }
}
