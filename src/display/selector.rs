//! Candidate endpoint selection.
//!
//! Probes the candidate displays once, up front, in order, then defers to
//! the operator when anything is usable. With nothing usable, or with the
//! operator declining or absent, the installer provisions its own virtual
//! framebuffer display instead of guessing which physical endpoint is the
//! one somebody can actually see.

use log::{info, warn};

use crate::account::Account;
use crate::display::endpoint::{DisplayEndpoint, EndpointKind};
use crate::display::probe::DisplayProbe;
use crate::error::InstallError;

/// The endpoints an installation considers, probed in this order.
pub const DEFAULT_CANDIDATES: [DisplayEndpoint; 2] =
    [DisplayEndpoint::PRIMARY, DisplayEndpoint::VIRTUAL];

/// Operator decision over the usable candidates. `Ok(None)` means
/// declined (or no interactive operator present).
pub trait OperatorPrompt {
    fn confirm(
        &self,
        candidates: &[DisplayEndpoint],
    ) -> Result<Option<DisplayEndpoint>, InstallError>;
}

/// Non-interactive default policy: never confirm a physical endpoint.
pub struct AssumeVirtual;

impl OperatorPrompt for AssumeVirtual {
    fn confirm(
        &self,
        _candidates: &[DisplayEndpoint],
    ) -> Result<Option<DisplayEndpoint>, InstallError> {
        Ok(None)
    }
}

/// The chosen endpoint, plus whether a virtual display service must be
/// provisioned alongside the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub endpoint: DisplayEndpoint,
    pub needs_virtual: bool,
}

/// Probe `candidates` in order and settle on one endpoint.
pub fn select_endpoint(
    probe: &dyn DisplayProbe,
    prompt: &dyn OperatorPrompt,
    account: &Account,
    candidates: &[DisplayEndpoint],
) -> Result<Selection, InstallError> {
    let mut usable = Vec::new();
    for &endpoint in candidates {
        if probe.probe(endpoint, account)? {
            info!("{} is usable by {}", endpoint.describe(), account.name);
            usable.push(endpoint);
        } else {
            info!("{} is not usable by {}", endpoint.describe(), account.name);
        }
    }

    if usable.is_empty() {
        warn!("no usable display found, a virtual framebuffer display will be provisioned");
        return Ok(Selection {
            endpoint: DisplayEndpoint::VIRTUAL,
            needs_virtual: true,
        });
    }

    match prompt.confirm(&usable)? {
        Some(endpoint) => Ok(Selection {
            endpoint,
            needs_virtual: endpoint.kind == EndpointKind::Virtual,
        }),
        None => {
            info!("no endpoint confirmed, falling back to a virtual framebuffer display");
            Ok(Selection {
                endpoint: DisplayEndpoint::VIRTUAL,
                needs_virtual: true,
            })
        }
    }
}
