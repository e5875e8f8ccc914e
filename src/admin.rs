//! The administrative surface: list sets left in flight, and trigger
//! cleanup of one of them by hand. Per the design notes, both operations
//! are intended to be gated to a superuser-equivalent caller; this crate
//! does not itself implement that check; whoever embeds it must do so
//! before calling either of these.

use std::sync::Arc;

use crate::coordinator::RecoveryLauncher;
use crate::error::{GxactError, Result};
use crate::log::LogStore;

/// One in-flight set as reported to an administrator.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InFlightSet {
    pub prefix: String,
}

pub struct AdminSurface {
    store: LogStore,
    launcher: Arc<dyn RecoveryLauncher>,
}

impl AdminSurface {
    pub fn new(store: LogStore, launcher: Arc<dyn RecoveryLauncher>) -> Self {
        Self { store, launcher }
    }

    /// Every set currently left on disk, whether INCOMPLETE or merely
    /// abandoned mid-PREPARE by a crashed host session.
    pub fn list_in_flight(&self) -> Result<Vec<InFlightSet>> {
        Ok(self
            .store
            .list_in_flight()?
            .into_iter()
            .map(|prefix| InFlightSet { prefix })
            .collect())
    }

    /// Render [`Self::list_in_flight`] as a JSON array, for a CLI `--list`
    /// flag or an admin HTTP endpoint.
    pub fn list_in_flight_json(&self) -> Result<String> {
        let sets = self.list_in_flight()?;
        serde_json::to_string_pretty(&sets)
            .map_err(|e| GxactError::Internal(format!("failed to render JSON: {}", e)))
    }

    /// Launch a recovery worker against a specific on-disk file name, as
    /// reported by [`Self::list_in_flight`]. Returns once the worker has
    /// been launched, not once it has finished (reconciliation for a
    /// set with unreachable members can run indefinitely).
    pub fn cleanup(&self, filename: &str) -> Result<()> {
        self.launcher.launch(self.store.dir().join(filename))
    }
}
