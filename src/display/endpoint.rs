//! Display endpoint identifiers.

use std::fmt;

/// Whether an endpoint is backed by real hardware or by a virtual
/// framebuffer server the installer provisions itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Physical,
    Virtual,
}

/// One X display (`:0`, `:1`, ...). Immutable once probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayEndpoint {
    pub index: u32,
    pub kind: EndpointKind,
}

impl DisplayEndpoint {
    /// The display the desktop session is expected to own.
    pub const PRIMARY: Self = Self {
        index: 0,
        kind: EndpointKind::Physical,
    };

    /// The display a provisioned Xvfb serves.
    pub const VIRTUAL: Self = Self {
        index: 1,
        kind: EndpointKind::Virtual,
    };

    pub const fn new(index: u32, kind: EndpointKind) -> Self {
        Self { index, kind }
    }

    /// Parse an X display string (`:0` or bare `0`).
    pub fn from_display_str(s: &str, kind: EndpointKind) -> Option<Self> {
        let index = s.strip_prefix(':').unwrap_or(s).parse().ok()?;
        Some(Self { index, kind })
    }

    pub fn describe(&self) -> String {
        match self.kind {
            EndpointKind::Physical => format!("physical display :{}", self.index),
            EndpointKind::Virtual => format!("virtual display :{}", self.index),
        }
    }
}

impl fmt::Display for DisplayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.index)
    }
}
