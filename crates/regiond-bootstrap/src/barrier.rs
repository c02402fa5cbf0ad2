//! Presence-based readiness barrier between the leader and its followers.
//!
//! The barrier is a one-way happens-before edge: the leader resets it before
//! doing any work and signals it once shared state is complete; followers
//! poll until they observe the signal. It provides no mutual exclusion.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

pub(crate) const BARRIER_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::barrier");

/// Errors raised by barrier operations.
#[derive(Debug, Clone, Error)]
pub enum BarrierError {
    /// The marker could not be removed.
    #[error("failed to reset readiness marker '{path}': {source}")]
    Reset {
        /// Marker path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The marker could not be created or flushed.
    #[error("failed to publish readiness marker '{path}': {source}")]
    Signal {
        /// Marker path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The marker's presence could not be determined.
    #[error("failed to inspect readiness marker '{path}': {source}")]
    Inspect {
        /// Marker path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Durable flag whose presence means "leader initialisation complete".
pub trait ReadinessBarrier: Send + Sync {
    /// Clears the flag. Clearing an absent flag succeeds.
    fn reset(&self) -> Result<(), BarrierError>;

    /// Sets the flag durably so every observer sees it.
    fn signal_and_publish(&self) -> Result<(), BarrierError>;

    /// Reports whether the flag is currently set.
    fn is_signaled(&self) -> Result<bool, BarrierError>;
}

/// Barrier backed by the presence of an empty marker file.
#[derive(Debug, Clone)]
pub struct MarkerFileBarrier {
    path: PathBuf,
}

impl MarkerFileBarrier {
    /// Uses `path` as the marker.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Marker location.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl ReadinessBarrier for MarkerFileBarrier {
    fn reset(&self) -> Result<(), BarrierError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(target: BARRIER_TARGET, path = %self.path.display(), "stale marker removed");
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BarrierError::Reset {
                path: self.path.clone(),
                source: Arc::new(source),
            }),
        }
    }

    fn signal_and_publish(&self) -> Result<(), BarrierError> {
        let signal_error = |source: io::Error| BarrierError::Signal {
            path: self.path.clone(),
            source: Arc::new(source),
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)
            .map_err(signal_error)?;
        file.sync_all().map_err(signal_error)?;
        debug!(target: BARRIER_TARGET, path = %self.path.display(), "marker published");
        Ok(())
    }

    fn is_signaled(&self) -> Result<bool, BarrierError> {
        self.path
            .try_exists()
            .map_err(|source| BarrierError::Inspect {
                path: self.path.clone(),
                source: Arc::new(source),
            })
    }
}

/// Blocks until `barrier` is signalled, polling every `interval`.
///
/// There is no timeout. Inspection errors are logged and treated as "not yet"
/// so a transient filesystem hiccup cannot release a follower early.
/// Returns the number of polls that observed the barrier unset.
#[must_use]
pub fn wait_for_release(barrier: &dyn ReadinessBarrier, interval: Duration) -> u64 {
    let mut pending = 0_u64;
    loop {
        match barrier.is_signaled() {
            Ok(true) => return pending,
            Ok(false) => {}
            Err(error) => {
                warn!(target: BARRIER_TARGET, %error, "readiness check failed; retrying");
            }
        }
        pending = pending.saturating_add(1);
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    struct Marker {
        _dir: TempDir,
        barrier: MarkerFileBarrier,
    }

    #[fixture]
    fn marker() -> Marker {
        let dir = TempDir::new().expect("create temp dir");
        let barrier = MarkerFileBarrier::new(dir.path().join("regiond.ready"));
        Marker { _dir: dir, barrier }
    }

    #[rstest]
    fn reset_of_an_absent_marker_succeeds(marker: Marker) {
        marker.barrier.reset().expect("reset should tolerate absence");
        assert!(!marker.barrier.is_signaled().expect("inspect"));
    }

    #[rstest]
    fn signal_then_reset_round_trip(marker: Marker) {
        marker.barrier.signal_and_publish().expect("signal");
        assert!(marker.barrier.is_signaled().expect("inspect"));
        marker.barrier.signal_and_publish().expect("signal is repeatable");
        marker.barrier.reset().expect("reset");
        assert!(!marker.barrier.is_signaled().expect("inspect"));
    }

    #[rstest]
    fn signal_fails_when_parent_is_missing() {
        let dir = TempDir::new().expect("create temp dir");
        let barrier = MarkerFileBarrier::new(dir.path().join("missing").join("regiond.ready"));
        let error = barrier.signal_and_publish().expect_err("parent is absent");
        assert!(matches!(error, BarrierError::Signal { .. }));
    }

    /// Signals after a fixed number of checks, failing the first one.
    struct Countdown {
        remaining: AtomicU32,
    }

    impl ReadinessBarrier for Countdown {
        fn reset(&self) -> Result<(), BarrierError> {
            Ok(())
        }

        fn signal_and_publish(&self) -> Result<(), BarrierError> {
            self.remaining.store(0, Ordering::SeqCst);
            Ok(())
        }

        fn is_signaled(&self) -> Result<bool, BarrierError> {
            let before = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .unwrap_or(0);
            match before {
                0 => Ok(true),
                3 => Err(BarrierError::Inspect {
                    path: PathBuf::from("/countdown"),
                    source: Arc::new(io::Error::other("transient")),
                }),
                _ => Ok(false),
            }
        }
    }

    #[test]
    fn waits_through_errors_until_signalled() {
        let barrier = Countdown {
            remaining: AtomicU32::new(3),
        };
        let pending = wait_for_release(&barrier, Duration::from_millis(1));
        assert_eq!(pending, 3);
    }

    #[rstest]
    fn follower_blocks_until_marker_appears(marker: Marker) {
        let observed = thread::scope(|scope| {
            let follower = scope.spawn(|| wait_for_release(&marker.barrier, Duration::from_millis(2)));
            thread::sleep(Duration::from_millis(30));
            marker.barrier.signal_and_publish().expect("signal");
            follower.join().expect("follower thread panicked")
        });
        assert!(observed > 0, "follower should have polled before release");
    }
}
