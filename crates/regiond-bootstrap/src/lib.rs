//! Bootstrap coordinator for co-located region service workers.
//!
//! A process supervisor starts N workers concurrently and hands each a
//! distinct zero-based index. The worker with index zero becomes the leader:
//! it seeds the node configuration, provisions the colocated database when the
//! host runs in standalone mode, migrates the schema, creates the runtime
//! directories and finally publishes a readiness marker. Every other worker is
//! a follower and polls for that marker. Both roles end by replacing the
//! process with the region service, passing the one-based worker ordinal.
//!
//! Coordination uses nothing but filesystem presence and the supervisor's
//! index assignment; there is no lock service and no election. Each stage
//! reports through [`HealthReporter`] so the supervisor's journal shows where a
//! worker stopped.

pub mod address;
pub mod barrier;
mod bootstrap;
pub mod command;
mod coordinator;
pub mod database;
mod health;
pub mod identity;
pub mod launch;
pub mod mode;
pub mod node_config;
pub mod sequence;
mod telemetry;

pub use bootstrap::{
    Bootstrap, BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use coordinator::{
    Collaborators, CoordinatorError, CoordinatorPlan, Handoff, Stage, run_coordinator,
    run_coordinator_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
