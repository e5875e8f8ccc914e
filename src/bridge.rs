//! Maps host transaction-runtime lifecycle events onto `Coordinator`
//! operations. Grounded in the `XactCallback` event-to-action table of a
//! Postgres foreign-data-wrapper's remote-transaction registry: the same
//! small set of events (pre-commit, commit, abort, pre-prepare/prepare)
//! drives the same small set of actions here.

use crate::coordinator::Coordinator;
use crate::error::{GxactError, Result};

/// One host transaction-runtime lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    PreCommit,
    ParallelPreCommit,
    Commit,
    ParallelCommit,
    Abort,
    ParallelAbort,
    PrePrepare,
    Prepare,
    /// Any event this bridge does not act on.
    Other,
}

/// Dispatch one host event to the coordinator. No-op if the coordinator
/// has no active set: a transaction that never registered a remote
/// member has nothing for this bridge to drive.
pub fn dispatch(coordinator: &mut Coordinator, event: HostEvent) -> Result<()> {
    match event {
        HostEvent::PreCommit | HostEvent::ParallelPreCommit => {
            if coordinator.is_active() {
                coordinator.drive_to_commit()?;
                coordinator.cleanup();
            }
            Ok(())
        }
        HostEvent::Commit | HostEvent::ParallelCommit => {
            if coordinator.is_active() {
                log::warn!(
                    "driving commit from the COMMIT event instead of PRE_COMMIT; \
                     a crash between this event and COMMIT PREPARED leaves \
                     members prepared with no chance to roll back"
                );
                coordinator.drive_to_commit()?;
                coordinator.cleanup();
            }
            Ok(())
        }
        HostEvent::Abort | HostEvent::ParallelAbort => {
            if coordinator.is_active() {
                coordinator.drive_to_rollback()?;
                coordinator.cleanup();
            }
            Ok(())
        }
        HostEvent::PrePrepare | HostEvent::Prepare => Err(GxactError::FeatureNotSupported(
            "nesting this coordinator's two-phase commit inside the host's own PREPARE \
             TRANSACTION is not supported"
                .into(),
        )),
        HostEvent::Other => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::RecoveryLauncher;
    use crate::log::LogStore;
    use crate::remote::{RemoteConnection, RemoteEndpoint};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct NoopLauncher;
    impl RecoveryLauncher for NoopLauncher {
        fn launch(&self, _log_path: PathBuf) -> Result<()> {
            Ok(())
        }
    }

    struct FakeConnection {
        endpoint: RemoteEndpoint,
    }

    impl RemoteConnection for FakeConnection {
        fn execute(&mut self, _sql: &str) -> Result<()> {
            Ok(())
        }
        fn probe_prepared(&mut self, _member_name: &str) -> Result<bool> {
            Ok(false)
        }
        fn is_broken(&self) -> bool {
            false
        }
        fn reset(&mut self) -> Result<()> {
            Ok(())
        }
        fn endpoint(&self) -> &RemoteEndpoint {
            &self.endpoint
        }
    }

    #[test]
    fn pre_prepare_is_unsupported() {
        let tmp = tempdir().unwrap();
        let store = LogStore::open(tmp.path()).unwrap();
        let mut c = Coordinator::new(store, Arc::new(NoopLauncher));
        let err = dispatch(&mut c, HostEvent::PrePrepare).unwrap_err();
        assert!(matches!(err, GxactError::FeatureNotSupported(_)));
    }

    #[test]
    fn other_event_without_active_set_is_a_no_op() {
        let tmp = tempdir().unwrap();
        let store = LogStore::open(tmp.path()).unwrap();
        let mut c = Coordinator::new(store, Arc::new(NoopLauncher));
        dispatch(&mut c, HostEvent::Other).unwrap();
        assert!(!c.is_active());
    }

    #[test]
    fn pre_commit_with_no_active_set_is_a_no_op() {
        let tmp = tempdir().unwrap();
        let store = LogStore::open(tmp.path()).unwrap();
        let mut c = Coordinator::new(store, Arc::new(NoopLauncher));
        dispatch(&mut c, HostEvent::PreCommit).unwrap();
        assert!(!c.is_active());
    }

    #[test]
    fn abort_drives_rollback_and_clears_the_slot() {
        let tmp = tempdir().unwrap();
        let store = LogStore::open(tmp.path()).unwrap();
        let mut c = Coordinator::new(store, Arc::new(NoopLauncher));
        c.register(Box::new(FakeConnection {
            endpoint: RemoteEndpoint {
                host: "remote-a".into(),
                port: 5432,
                database: "db".into(),
            },
        }))
        .unwrap();

        dispatch(&mut c, HostEvent::Abort).unwrap();
        assert!(!c.is_active());
    }
}
