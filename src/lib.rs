//! Coordinates all-or-nothing commits across remote two-phase-commit
//! databases: one host transaction runtime drives a set of remote
//! members through PREPARE TRANSACTION / COMMIT PREPARED / ROLLBACK
//! PREPARED, with a durable write-ahead log backing crash recovery.
//!
//! The entry points a host embeds are [`Coordinator`] (register members,
//! drive to commit or rollback) and [`bridge::dispatch`] (translate the
//! host's own transaction-lifecycle events into coordinator calls).
//! [`admin::AdminSurface`] exposes the operational surface: list sets
//! left in flight, and kick off recovery for one by hand.

pub mod admin;
pub mod bridge;
pub mod coordinator;
pub mod error;
pub mod log;
pub mod member;
pub mod phase;
pub mod prefix;
pub mod recovery;
pub mod remote;
pub mod set;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use coordinator::Coordinator;
pub use error::{GxactError, Result};
pub use phase::Phase;
pub use remote::{RemoteConnection, RemoteConnector, RemoteEndpoint};

use log::LogStore;
use recovery::ThreadedLauncher;

/// Process-wide configuration: where the log directory lives and how
/// aggressively the recovery worker retries.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory under which the `extglobalxact` log directory is
    /// created, mirroring a database's own data directory convention.
    pub data_root: PathBuf,
    /// Pacing sleep between reconciliation passes in the recovery worker.
    pub recovery_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            recovery_poll_interval: recovery::DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Config {
    pub fn data_root(mut self, path: impl AsRef<Path>) -> Self {
        self.data_root = path.as_ref().to_path_buf();
        self
    }

    pub fn recovery_poll_interval(mut self, interval: Duration) -> Self {
        self.recovery_poll_interval = interval;
        self
    }
}

/// Build a [`Coordinator`] wired to a [`ThreadedLauncher`] over `config`,
/// using `connector` to reopen remote connections during recovery. This
/// is the construction path a host embeds; direct construction via
/// [`Coordinator::new`] with a custom [`coordinator::RecoveryLauncher`]
/// is for tests.
pub fn coordinator(config: &Config, connector: Arc<dyn RemoteConnector>) -> Result<Coordinator> {
    let store = LogStore::open(&config.data_root)?;
    let launcher = Arc::new(
        ThreadedLauncher::new(store.clone(), connector)
            .with_poll_interval(config.recovery_poll_interval),
    );
    Ok(Coordinator::new(store, launcher))
}

/// Build an [`admin::AdminSurface`] over the same log directory `config`
/// points at.
pub fn admin_surface(
    config: &Config,
    connector: Arc<dyn RemoteConnector>,
) -> Result<admin::AdminSurface> {
    let store = LogStore::open(&config.data_root)?;
    let launcher = Arc::new(
        ThreadedLauncher::new(store.clone(), connector)
            .with_poll_interval(config.recovery_poll_interval),
    );
    Ok(admin::AdminSurface::new(store, launcher))
}
