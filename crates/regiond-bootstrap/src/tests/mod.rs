//! Test suites for the bootstrap coordinator.

mod support;
