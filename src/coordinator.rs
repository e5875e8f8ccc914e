//! Drives a single transaction set from registration through a terminal
//! phase. One `Coordinator` is owned by one host session; it is not a
//! process-wide singleton (see the design note in the crate root).

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{GxactError, Result};
use crate::log::{ActionStatus, LogStore};
use crate::member::Member;
use crate::phase::Phase;
use crate::prefix;
use crate::remote::RemoteConnection;
use crate::set::TransactionSet;

/// Launches a recovery worker for a set that finalized to INCOMPLETE.
/// Pulled out as a trait so tests can observe a launch without spawning a
/// real thread.
pub trait RecoveryLauncher: Send + Sync {
    fn launch(&self, log_path: PathBuf) -> Result<()>;
}

/// Owns at most one in-flight transaction set for the session it belongs
/// to. `register` lazily creates the set on first use; `cleanup` clears
/// the slot once the host is done with it.
pub struct Coordinator {
    store: LogStore,
    launcher: Arc<dyn RecoveryLauncher>,
    current: Option<TransactionSet>,
}

impl Coordinator {
    pub fn new(store: LogStore, launcher: Arc<dyn RecoveryLauncher>) -> Self {
        Self {
            store,
            launcher,
            current: None,
        }
    }

    /// The phase of the current set, if one exists.
    pub fn current_phase(&self) -> Option<Phase> {
        self.current.as_ref().map(|s| s.phase)
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Register one already-open remote connection with the current set,
    /// creating the set on the first call. The caller retains ownership
    /// of issuing PREPARE TRANSACTION's prerequisites; this call issues
    /// PREPARE TRANSACTION itself once the name is durably intended.
    pub fn register(&mut self, mut connection: Box<dyn RemoteConnection>) -> Result<()> {
        if self.current.is_none() {
            let prefix = prefix::generate();
            let set = TransactionSet::begin(&self.store, prefix)?;
            self.current = Some(set);
        }

        let set = self
            .current
            .as_mut()
            .expect("current set was just created if absent");

        let endpoint = connection.endpoint().clone();
        let name = set.next_member_name()?;
        set.enter_prepare()?;
        set.write_action(Phase::Prepare, &endpoint, &name, ActionStatus::Todo)?;

        let sql = format!("PREPARE TRANSACTION '{}'", name);
        connection.execute(&sql).map_err(|e| {
            GxactError::InvalidTransactionState(format!(
                "remote rejected PREPARE TRANSACTION for {}: {}",
                name, e
            ))
        })?;

        set.push_member(Member::new(name, endpoint, connection));
        Ok(())
    }

    /// Drive every registered member to COMMIT PREPARED. Requires the set
    /// to be in PREPARE. Returns the terminal phase reached.
    pub fn drive_to_commit(&mut self) -> Result<Phase> {
        let can_complete = {
            let set = self.require_current()?;
            if set.phase != Phase::Prepare {
                return Err(GxactError::InvalidTransactionState(format!(
                    "drive_to_commit requires phase Prepare, found {:?}",
                    set.phase
                )));
            }
            set.transition_to(Phase::Commit)?;
            Self::settle_members(set, Terminal::Commit)?
        };
        self.finalize(can_complete)
    }

    /// Drive every registered member to ROLLBACK PREPARED. Legal from
    /// either PREPARE or BEGIN is rejected: a set with no prepared
    /// members never needed a rollback drive, but one with members
    /// always does, so this requires PREPARE just like commit.
    pub fn drive_to_rollback(&mut self) -> Result<Phase> {
        let can_complete = {
            let set = self.require_current()?;
            if set.phase != Phase::Prepare {
                return Err(GxactError::InvalidTransactionState(format!(
                    "drive_to_rollback requires phase Prepare, found {:?}",
                    set.phase
                )));
            }
            set.transition_to(Phase::Rollback)?;
            Self::settle_members(set, Terminal::Rollback)?
        };
        self.finalize(can_complete)
    }

    fn settle_members(set: &mut TransactionSet, terminal: Terminal) -> Result<bool> {
        let mut can_complete = true;
        for i in 0..set.members.len() {
            let name = set.members[i].name.clone();
            let endpoint = set.members[i].endpoint.clone();
            let sql = terminal.sql(&name);
            let outcome = set.members[i].connection.execute(&sql);
            let status = match outcome {
                Ok(()) => ActionStatus::Ok,
                Err(e) => {
                    log::warn!("terminal command failed for member {}: {}", name, e);
                    can_complete = false;
                    ActionStatus::Bad
                }
            };
            if let Err(e) = set.write_action(terminal.phase(), &endpoint, &name, status) {
                log::warn!(
                    "failed to durably record outcome for member {}: {} (marking set incomplete)",
                    name, e
                );
                can_complete = false;
            }
        }
        Ok(can_complete)
    }

    /// Transition to the final phase, close the log, and either unlink it
    /// (COMPLETE) or hand it to a recovery worker (INCOMPLETE). Does not
    /// clear the current-set slot: that is `cleanup`'s job, so a caller
    /// can still observe the terminal phase on the current set afterward.
    fn finalize(&mut self, can_complete: bool) -> Result<Phase> {
        let mut can_complete = can_complete;
        let set = self.require_current()?;

        let mut terminal = if can_complete {
            Phase::Complete
        } else {
            Phase::Incomplete
        };
        if let Err(e) = set.transition_to(terminal) {
            log::warn!(
                "failed to durably record terminal phase {:?} for set '{}': {} (forcing incomplete)",
                terminal, set.prefix, e
            );
            can_complete = false;
            if terminal != Phase::Incomplete {
                terminal = Phase::Incomplete;
                if let Err(e2) = set.transition_to(terminal) {
                    log::warn!(
                        "failed to also record INCOMPLETE phase for set '{}': {}",
                        set.prefix, e2
                    );
                    set.phase = Phase::Incomplete;
                }
            } else {
                set.phase = Phase::Incomplete;
            }
        }
        set.close();
        let prefix = set.prefix.clone();
        let log_path = set.log_path().to_path_buf();

        if can_complete {
            self.store.remove(&prefix)?;
        } else if let Err(e) = self.launcher.launch(log_path.clone()) {
            log::warn!(
                "failed to launch recovery worker for {}: {} (administrative cleanup can retry)",
                log_path.display(),
                e
            );
        }

        Ok(terminal)
    }

    /// Unsubscribe from host-lifecycle events and clear the current-set
    /// slot. Does not close or touch any remote connection.
    pub fn cleanup(&mut self) {
        self.current = None;
    }

    fn require_current(&mut self) -> Result<&mut TransactionSet> {
        self.current
            .as_mut()
            .ok_or_else(|| GxactError::InvalidTransactionState("no active transaction set".into()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Terminal {
    Commit,
    Rollback,
}

impl Terminal {
    fn phase(self) -> Phase {
        match self {
            Terminal::Commit => Phase::Commit,
            Terminal::Rollback => Phase::Rollback,
        }
    }

    fn sql(self, member_name: &str) -> String {
        match self {
            Terminal::Commit => format!("COMMIT PREPARED '{}'", member_name),
            Terminal::Rollback => format!("ROLLBACK PREPARED '{}'", member_name),
        }
    }
}
