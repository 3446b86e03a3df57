//! Interactive prompts and operator-facing output.
//!
//! Orchestration logic never talks to a terminal directly: the selector
//! takes an `OperatorPrompt`, and this module provides the inquire-backed
//! implementation plus the non-prompt summaries printed around an
//! install run.

use std::io::Write;

use inquire::{Confirm, InquireError, Select};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::cli::{InstallArgs, StrategyArg};
use crate::display::endpoint::DisplayEndpoint;
use crate::display::selector::{OperatorPrompt, Selection};
use crate::error::InstallError;
use crate::service::strategy::{StartupStrategy, StrategyKind};
use crate::setup::{InstallPaths, InstallPlan, InstallStatus};

/// Asks the operator which usable display the client should render on.
/// Cancelling counts as declining: the virtual fallback takes over.
pub struct InteractivePrompt;

impl OperatorPrompt for InteractivePrompt {
    fn confirm(
        &self,
        candidates: &[DisplayEndpoint],
    ) -> Result<Option<DisplayEndpoint>, InstallError> {
        if candidates.len() == 1 {
            let endpoint = candidates[0];
            return match Confirm::new(&format!("Use the {}?", endpoint.describe()))
                .with_default(true)
                .with_help_message(
                    "Declining provisions a virtual framebuffer display instead",
                )
                .prompt()
            {
                Ok(true) => Ok(Some(endpoint)),
                Ok(false) => Ok(None),
                Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                    Ok(None)
                }
                Err(e) => Err(InstallError::System(format!("prompt failed: {e}"))),
            };
        }

        let mut options: Vec<String> =
            candidates.iter().map(|c| c.describe()).collect();
        options.push("none of these (provision a virtual display)".to_string());

        match Select::new("Which display should the client render on?", options).prompt() {
            Ok(choice) => Ok(candidates.iter().copied().find(|c| c.describe() == choice)),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
            Err(e) => Err(InstallError::System(format!("prompt failed: {e}"))),
        }
    }
}

const STRATEGY_OPTIONS: [&str; 4] = [
    "synchronous wait - poll the display before each start",
    "fixed delay - sleep a flat duration before start",
    "deferred timer - start once, a fixed offset after boot",
    "session autostart - start at desktop login, no supervisor",
];

/// Pick the startup strategy interactively. Cancelling aborts the
/// install: the strategy decision has no safe default worth guessing.
pub fn choose_strategy(args: &InstallArgs) -> Result<StartupStrategy, InstallError> {
    let choice = Select::new(
        "How should startup handle display readiness?",
        STRATEGY_OPTIONS.to_vec(),
    )
    .prompt()
    .map_err(|e| InstallError::Config(format!("installation cancelled: {e}")))?;

    let arg = match STRATEGY_OPTIONS
        .iter()
        .position(|o| *o == choice)
        .unwrap_or(0)
    {
        0 => StrategyArg::Sync,
        1 => StrategyArg::Delay,
        2 => StrategyArg::Timer,
        _ => StrategyArg::Autostart,
    };
    Ok(arg.to_strategy(args))
}

/// Dry-run output: every artifact the plan would write, plus the
/// registry operations it would perform.
pub fn show_plan(plan: &InstallPlan, paths: &InstallPaths) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
    let _ = writeln!(stdout, "Dry run - {} strategy", plan.strategy);
    let _ = stdout.reset();

    let _ = writeln!(stdout, "\nWould write:");
    for (artifact, _) in &plan.files {
        let _ = writeln!(
            stdout,
            "  {} ({})",
            paths.artifact_path(*artifact).display(),
            artifact.describe()
        );
    }
    if !plan.enable.is_empty() {
        let _ = writeln!(stdout, "Would enable: {}", plan.enable.join(", "));
    }
    if !plan.disable.is_empty() {
        let _ = writeln!(stdout, "Would disable: {}", plan.disable.join(", "));
    }
    if !plan.start.is_empty() {
        let _ = writeln!(stdout, "Would start: {}", plan.start.join(", "));
    }
}

/// Post-install summary.
pub fn show_completion(selection: &Selection, strategy: StrategyKind, report: &InstallStatus) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = writeln!(stdout, "\nInstallation complete");
    let _ = stdout.reset();

    let _ = writeln!(stdout, "  Display:  {}", selection.endpoint.describe());
    let _ = writeln!(stdout, "  Strategy: {strategy}");

    let _ = writeln!(stdout, "\nArtifacts:");
    for (artifact, path, present) in &report.artifacts {
        if *present {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
            let _ = writeln!(stdout, "  + {} ({})", path.display(), artifact.describe());
            let _ = stdout.reset();
        }
    }

    if !report.units.is_empty() {
        let _ = writeln!(stdout, "\nUnits:");
        for (unit, active) in &report.units {
            if *active {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                let _ = writeln!(stdout, "  + {unit} active");
            } else {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
                let _ = writeln!(stdout, "  ! {unit} not active yet");
            }
            let _ = stdout.reset();
        }
    }

    if strategy == StrategyKind::SessionAutostart {
        let _ = writeln!(
            stdout,
            "\nThe client starts at the next desktop login for the target account."
        );
    }
}

/// `status` subcommand output.
pub fn show_status(report: &InstallStatus) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    match report.strategy {
        Some(strategy) => {
            let _ = writeln!(stdout, "Installed strategy: {strategy}");
        }
        None => {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
            let _ = writeln!(stdout, "No installation detected");
            let _ = stdout.reset();
        }
    }

    let _ = writeln!(stdout, "\nArtifacts:");
    for (artifact, path, present) in &report.artifacts {
        if *present {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
            let _ = writeln!(stdout, "  + {} ({})", path.display(), artifact.describe());
        } else {
            let _ = writeln!(stdout, "  - {} ({})", path.display(), artifact.describe());
        }
        let _ = stdout.reset();
    }

    if !report.units.is_empty() {
        let _ = writeln!(stdout, "\nUnits:");
        for (unit, active) in &report.units {
            let state = if *active { "active" } else { "inactive" };
            let _ = writeln!(stdout, "  {unit}: {state}");
        }
    }
}
