//! Reconciles a set left at INCOMPLETE (or a crash abandoned before it
//! ever reached a terminal phase) against the actual state of its
//! remote members, one probe-and-resolve pass at a time, until every
//! member is accounted for.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::coordinator::RecoveryLauncher;
use crate::error::Result;
use crate::log::{LogRecord, LogStore};
use crate::member::Member;
use crate::phase::Phase;
use crate::remote::{RemoteConnector, RemoteEndpoint};

/// Pacing between reconciliation passes. One second balances prompt
/// recovery against hammering an unreachable remote; production
/// deployments with many abandoned sets may want this configurable per
/// [`Config`](crate::Config).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
enum Terminal {
    Commit,
    Rollback,
}

impl Terminal {
    fn sql(self, member_name: &str) -> String {
        match self {
            Terminal::Commit => format!("COMMIT PREPARED '{}'", member_name),
            Terminal::Rollback => format!("ROLLBACK PREPARED '{}'", member_name),
        }
    }
}

/// Reloads one set's log and reconciles its members against the remote
/// databases until the member list is empty, then unlinks the log file.
pub struct RecoveryWorker {
    connector: Arc<dyn RemoteConnector>,
    poll_interval: Duration,
}

impl RecoveryWorker {
    pub fn new(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            connector,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run reconciliation for the set named `prefix` to completion.
    pub fn run(&self, store: &LogStore, prefix: &str) -> Result<()> {
        let _lock = store.acquire_recovery_lock(prefix)?;
        let mut handle = store.open_existing(prefix)?;
        let records = handle.read_all()?;

        let (mut members, terminal, last_phase, saw_incomplete) = self.reload(records)?;

        if saw_incomplete {
            log::warn!("resuming recovery for set '{}' left at INCOMPLETE", prefix);
        } else {
            log::warn!(
                "recovering set '{}' abandoned at {:?} before it ever reached INCOMPLETE",
                prefix,
                last_phase
            );
        }

        let mut phase = last_phase;
        loop {
            if phase == Phase::Incomplete {
                thread::sleep(self.poll_interval);
            }

            let mut retained = Vec::with_capacity(members.len());
            for mut member in members.drain(..) {
                if member.connection.is_broken() {
                    if let Err(e) = member.connection.reset() {
                        log::warn!(
                            "could not reset connection to {} while recovering '{}': {}",
                            member.endpoint,
                            prefix,
                            e
                        );
                        retained.push(member);
                        continue;
                    }
                }

                match member.connection.probe_prepared(&member.name) {
                    Ok(false) => {
                        log::info!(
                            "member {} of set '{}' already resolved, dropping from recovery",
                            member.name,
                            prefix
                        );
                    }
                    Ok(true) => {
                        let sql = terminal.sql(&member.name);
                        match member.connection.execute(&sql) {
                            Ok(()) => log::info!(
                                "recovered member {} of set '{}' via {:?}",
                                member.name,
                                prefix,
                                terminal
                            ),
                            Err(e) => {
                                log::warn!(
                                    "terminal command failed for member {} of set '{}': {}",
                                    member.name,
                                    prefix,
                                    e
                                );
                                retained.push(member);
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!(
                            "probe failed for member {} of set '{}': {}",
                            member.name,
                            prefix,
                            e
                        );
                        retained.push(member);
                    }
                }
            }
            members = retained;
            phase = Phase::Incomplete;

            if members.is_empty() {
                break;
            }
        }

        drop(handle);
        store.remove(prefix)
    }

    /// Rebuild the member roster and determine the terminal command from
    /// a set's parsed log records. Members are derived from PREPARE-phase
    /// action lines, in file order, deduplicated by name: later action
    /// lines for the same member (a recorded COMMIT/ROLLBACK outcome)
    /// don't change membership, since reconciliation is a safe no-op for
    /// an already-resolved member.
    fn reload(
        &self,
        records: Vec<LogRecord>,
    ) -> Result<(Vec<Member>, Terminal, Phase, bool)> {
        let mut members = Vec::new();
        let mut seen = HashSet::new();
        let mut last_phase = Phase::Begin;
        let mut last_non_incomplete = Phase::Begin;
        let mut saw_incomplete = false;

        for record in records {
            match record {
                LogRecord::Phase(p) => {
                    last_phase = p;
                    if p == Phase::Incomplete {
                        saw_incomplete = true;
                    } else {
                        last_non_incomplete = p;
                    }
                }
                LogRecord::Action {
                    phase: Phase::Prepare,
                    endpoint,
                    member_name,
                    ..
                } => {
                    if seen.insert(member_name.clone()) {
                        let connection = self.connect(&endpoint)?;
                        members.push(Member::new(member_name, endpoint, connection));
                    }
                }
                LogRecord::Action { .. } => {}
            }
        }

        let terminal = match last_non_incomplete {
            Phase::Commit => Terminal::Commit,
            _ => Terminal::Rollback,
        };

        Ok((members, terminal, last_phase, saw_incomplete))
    }

    fn connect(&self, endpoint: &RemoteEndpoint) -> Result<Box<dyn crate::remote::RemoteConnection>> {
        self.connector.connect(endpoint)
    }
}

/// A [`RecoveryLauncher`] that spawns a detached thread running a
/// [`RecoveryWorker`] against the coordinator's log store, mirroring the
/// teacher's background-worker-handle pattern of owning a clone of
/// whatever state the thread needs rather than borrowing it.
pub struct ThreadedLauncher {
    store: LogStore,
    connector: Arc<dyn RemoteConnector>,
    poll_interval: Duration,
}

impl ThreadedLauncher {
    pub fn new(store: LogStore, connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            store,
            connector,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl RecoveryLauncher for ThreadedLauncher {
    fn launch(&self, log_path: PathBuf) -> Result<()> {
        let prefix = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let store = self.store.clone();
        let connector = Arc::clone(&self.connector);
        let poll_interval = self.poll_interval;

        thread::Builder::new()
            .name(format!("gxact-recovery-{}", prefix))
            .spawn(move || {
                let worker = RecoveryWorker::new(connector).with_poll_interval(poll_interval);
                if let Err(e) = worker.run(&store, &prefix) {
                    log::error!("recovery worker for '{}' exited with an error: {}", prefix, e);
                }
            })
            .map_err(crate::error::GxactError::Io)?;
        Ok(())
    }
}
