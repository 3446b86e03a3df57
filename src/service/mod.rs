//! Service supervision artifacts.
//!
//! - `descriptor` - the durable unit model and its systemd rendering
//! - `strategy` - the startup strategy variants and their extra artifacts
//! - `registry` - systemctl operations behind a trait

pub mod descriptor;
pub mod registry;
pub mod strategy;

pub use descriptor::{ClientLayout, DescriptorSet, RestartPolicy, ServiceDescriptor};
pub use registry::ServiceRegistry;
pub use strategy::{StartupStrategy, StrategyKind};
