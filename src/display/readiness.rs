//! Bounded pre-start readiness wait.
//!
//! The gate polls the probe at a fixed cadence (probe, sleep, repeat) and
//! holds no state across invocations: every supervisor restart re-runs
//! the full budget from zero, since display availability can change
//! between attempts (a user logging in, Xvfb coming up).

use std::thread;
use std::time::Duration;

use log::info;

use crate::account::Account;
use crate::display::endpoint::DisplayEndpoint;
use crate::display::probe::DisplayProbe;
use crate::error::InstallError;

/// Result of one gate run. A timeout is reported, not raised: the caller
/// (normally systemd via the pre-start hook's exit code) decides whether
/// the unit is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessOutcome {
    Ready { attempts: u32 },
    TimedOut { attempts: u32 },
}

/// Poll `probe` until `endpoint` is usable by `account` or the attempt
/// budget runs out. `max_attempts == 0` times out immediately without
/// probing.
pub fn await_ready(
    probe: &dyn DisplayProbe,
    endpoint: DisplayEndpoint,
    account: &Account,
    max_attempts: u32,
    interval: Duration,
) -> Result<ReadinessOutcome, InstallError> {
    for attempt in 1..=max_attempts {
        if probe.probe(endpoint, account)? {
            info!(
                "display {endpoint} ready for {} after {attempt} attempt(s)",
                account.name
            );
            return Ok(ReadinessOutcome::Ready { attempts: attempt });
        }

        info!(
            "display {endpoint} not ready (attempt {attempt}/{max_attempts}, {} remaining)",
            max_attempts - attempt
        );
        thread::sleep(interval);
    }

    Ok(ReadinessOutcome::TimedOut {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::account;

    struct ScriptedProbe {
        outcomes: RefCell<Vec<bool>>,
        calls: Cell<u32>,
    }

    impl ScriptedProbe {
        fn new(outcomes: &[bool]) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.to_vec()),
                calls: Cell::new(0),
            }
        }
    }

    impl DisplayProbe for ScriptedProbe {
        fn probe(&self, _: DisplayEndpoint, _: &Account) -> Result<bool, InstallError> {
            self.calls.set(self.calls.get() + 1);
            let mut outcomes = self.outcomes.borrow_mut();
            if outcomes.is_empty() {
                Ok(false)
            } else {
                Ok(outcomes.remove(0))
            }
        }
    }

    #[test]
    fn zero_budget_times_out_without_probing() {
        let probe = ScriptedProbe::new(&[true]);
        let outcome = await_ready(
            &probe,
            DisplayEndpoint::PRIMARY,
            &account::fixture(),
            0,
            Duration::ZERO,
        )
        .unwrap();

        assert_eq!(outcome, ReadinessOutcome::TimedOut { attempts: 0 });
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn reports_the_attempt_that_succeeded() {
        let probe = ScriptedProbe::new(&[false, false, true]);
        let outcome = await_ready(
            &probe,
            DisplayEndpoint::PRIMARY,
            &account::fixture(),
            30,
            Duration::ZERO,
        )
        .unwrap();

        assert_eq!(outcome, ReadinessOutcome::Ready { attempts: 3 });
        assert_eq!(probe.calls.get(), 3);
    }

    #[test]
    fn exhausts_exactly_the_budget() {
        let probe = ScriptedProbe::new(&[]);
        let outcome = await_ready(
            &probe,
            DisplayEndpoint::VIRTUAL,
            &account::fixture(),
            5,
            Duration::ZERO,
        )
        .unwrap();

        assert_eq!(outcome, ReadinessOutcome::TimedOut { attempts: 5 });
        assert_eq!(probe.calls.get(), 5);
    }
}
