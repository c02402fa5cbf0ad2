//! Worker identity: the supervisor's zero-based index, the internal one-based
//! ordinal, and the role it implies.
//!
//! Leadership is not contended for. The supervisor guarantees that exactly one
//! running worker receives index zero, and that worker alone initialises the
//! shared state.

use std::fmt;
use std::num::NonZeroU64;

/// Zero-based worker index assigned by the external supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerIndex(u32);

impl WorkerIndex {
    /// Wraps the supervisor-assigned index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Converts the external index into the internal one-based ordinal.
    #[must_use]
    pub fn resolve(self) -> WorkerOrdinal {
        WorkerOrdinal(NonZeroU64::MIN.saturating_add(u64::from(self.0)))
    }
}

impl From<u32> for WorkerIndex {
    fn from(index: u32) -> Self {
        Self::new(index)
    }
}

/// One-based worker ordinal, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerOrdinal(NonZeroU64);

impl WorkerOrdinal {
    /// Numeric value of the ordinal, never zero.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Role implied by the ordinal: the first worker leads.
    #[must_use]
    pub const fn role(self) -> Role {
        if self.0.get() == 1 {
            Role::Leader
        } else {
            Role::Follower
        }
    }
}

impl fmt::Display for WorkerOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Part a worker plays during bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// Initialises shared state, then releases the followers.
    Leader,
    /// Waits for the leader's readiness marker.
    Follower,
}
