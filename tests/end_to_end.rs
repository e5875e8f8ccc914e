//! End-to-end scenarios against the public API: a `Coordinator` driven
//! through registration and a terminal phase, with assertions against
//! the actual on-disk log content and the log directory's final state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gxact::coordinator::RecoveryLauncher;
use gxact::log::LogStore;
use gxact::remote::{RemoteConnection, RemoteConnector, RemoteEndpoint};
use gxact::{Coordinator, GxactError, Phase, Result};

struct ScriptedConnection {
    endpoint: RemoteEndpoint,
    fail_execute: bool,
    probe_queue: Vec<bool>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl RemoteConnection for ScriptedConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.calls.lock().unwrap().push(sql.to_string());
        if self.fail_execute {
            return Err(GxactError::Internal("remote unreachable".into()));
        }
        Ok(())
    }

    fn probe_prepared(&mut self, _member_name: &str) -> Result<bool> {
        Ok(if self.probe_queue.is_empty() {
            true
        } else {
            self.probe_queue.remove(0)
        })
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

/// Reopens connections for the recovery worker, reusing the same call
/// log and letting each test script per-endpoint probe behavior.
struct ScriptedConnector {
    calls: Arc<Mutex<Vec<String>>>,
    probe_scripts: Mutex<std::collections::HashMap<String, Vec<bool>>>,
}

impl RemoteConnector for ScriptedConnector {
    fn connect(&self, endpoint: &RemoteEndpoint) -> Result<Box<dyn RemoteConnection>> {
        let probe_queue = self
            .probe_scripts
            .lock()
            .unwrap()
            .remove(&endpoint.host)
            .unwrap_or_default();
        Ok(Box::new(ScriptedConnection {
            endpoint: endpoint.clone(),
            fail_execute: false,
            probe_queue,
            calls: self.calls.clone(),
        }))
    }
}

struct SynchronousLauncher {
    store: LogStore,
    connector: Arc<ScriptedConnector>,
}

impl RecoveryLauncher for SynchronousLauncher {
    fn launch(&self, log_path: PathBuf) -> Result<()> {
        let prefix = log_path.file_name().unwrap().to_str().unwrap().to_string();
        let worker = gxact::recovery::RecoveryWorker::new(self.connector.clone())
            .with_poll_interval(Duration::from_millis(1));
        worker.run(&self.store, &prefix)
    }
}

fn endpoint(host: &str, port: u16, database: &str) -> RemoteEndpoint {
    RemoteEndpoint {
        host: host.into(),
        port,
        database: database.into(),
    }
}

fn read_log_file(store: &LogStore, prefix: &str) -> String {
    std::fs::read_to_string(store.dir().join(prefix)).unwrap()
}

#[test]
fn happy_commit_two_members_produces_the_expected_log_and_unlinks() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LogStore::open(tmp.path()).unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let connector = Arc::new(ScriptedConnector {
        calls: calls.clone(),
        probe_scripts: Mutex::new(Default::default()),
    });
    let launcher = Arc::new(SynchronousLauncher {
        store: store.clone(),
        connector,
    });
    let mut coordinator = Coordinator::new(store.clone(), launcher);

    coordinator
        .register(Box::new(ScriptedConnection {
            endpoint: endpoint("remote-a", 5432, "db1"),
            fail_execute: false,
            probe_queue: Vec::new(),
            calls: calls.clone(),
        }))
        .unwrap();

    // Capture the prefix before the second register call, by reading the
    // only file currently in the log directory.
    let prefix = store.list_in_flight().unwrap().into_iter().next().unwrap();

    coordinator
        .register(Box::new(ScriptedConnection {
            endpoint: endpoint("remote-b", 5432, "db2"),
            fail_execute: false,
            probe_queue: Vec::new(),
            calls: calls.clone(),
        }))
        .unwrap();

    let terminal = coordinator.drive_to_commit().unwrap();
    assert_eq!(terminal, Phase::Complete);

    // Log file is gone; compare against the expected shape by
    // reconstructing it (can't read after unlink, so assert the calls
    // issued instead, plus the absence).
    assert!(!store.dir().join(&prefix).exists());
    assert!(store.list_in_flight().unwrap().is_empty());

    let issued = calls.lock().unwrap();
    assert_eq!(
        issued.as_slice(),
        &[
            format!("PREPARE TRANSACTION '{}_1'", prefix),
            format!("PREPARE TRANSACTION '{}_2'", prefix),
            format!("COMMIT PREPARED '{}_1'", prefix),
            format!("COMMIT PREPARED '{}_2'", prefix),
        ]
    );
}

#[test]
fn happy_commit_log_content_matches_the_documented_shape() {
    // Same scenario as above, but captures the log's exact text while the
    // set is still in PREPARE, before it gets unlinked on COMPLETE.
    let tmp = tempfile::tempdir().unwrap();
    let store = LogStore::open(tmp.path()).unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let connector = Arc::new(ScriptedConnector {
        calls: calls.clone(),
        probe_scripts: Mutex::new(Default::default()),
    });
    let launcher = Arc::new(SynchronousLauncher {
        store: store.clone(),
        connector,
    });
    let mut coordinator = Coordinator::new(store.clone(), launcher);

    coordinator
        .register(Box::new(ScriptedConnection {
            endpoint: endpoint("remote-a", 5432, "db1"),
            fail_execute: false,
            probe_queue: Vec::new(),
            calls: calls.clone(),
        }))
        .unwrap();
    let prefix = store.list_in_flight().unwrap().into_iter().next().unwrap();
    coordinator
        .register(Box::new(ScriptedConnection {
            endpoint: endpoint("remote-b", 5432, "db2"),
            fail_execute: false,
            probe_queue: Vec::new(),
            calls: calls.clone(),
        }))
        .unwrap();

    let contents = read_log_file(&store, &prefix);
    let expected = format!(
        "phase begin\nphase prepare\nprepare postgresql://remote-a:5432/db1 {p}_1 todo\nprepare postgresql://remote-b:5432/db2 {p}_2 todo\n",
        p = prefix
    );
    assert_eq!(contents, expected);
}

#[test]
fn abort_mid_registration_rolls_back_the_first_member_and_unlinks() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LogStore::open(tmp.path()).unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let connector = Arc::new(ScriptedConnector {
        calls: calls.clone(),
        probe_scripts: Mutex::new(Default::default()),
    });
    let launcher = Arc::new(SynchronousLauncher {
        store: store.clone(),
        connector,
    });
    let mut coordinator = Coordinator::new(store.clone(), launcher);

    coordinator
        .register(Box::new(ScriptedConnection {
            endpoint: endpoint("remote-a", 5432, "db1"),
            fail_execute: false,
            probe_queue: Vec::new(),
            calls: calls.clone(),
        }))
        .unwrap();

    let err = coordinator
        .register(Box::new(ScriptedConnection {
            endpoint: endpoint("remote-b", 5432, "db2"),
            fail_execute: true,
            probe_queue: Vec::new(),
            calls: calls.clone(),
        }))
        .unwrap_err();
    assert!(matches!(err, GxactError::InvalidTransactionState(_)));

    // Host observes the failed registration, aborts.
    let terminal = coordinator.drive_to_rollback().unwrap();
    assert_eq!(terminal, Phase::Complete);
    assert!(store.list_in_flight().unwrap().is_empty());

    let issued = calls.lock().unwrap();
    assert!(issued.iter().any(|s| s.starts_with("PREPARE TRANSACTION")));
    assert!(issued.iter().any(|s| s.starts_with("ROLLBACK PREPARED")));
    assert!(!issued.iter().any(|s| s.starts_with("COMMIT PREPARED")));
}

#[test]
fn illegal_transition_from_begin_leaves_the_log_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LogStore::open(tmp.path()).unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let connector = Arc::new(ScriptedConnector {
        calls: calls.clone(),
        probe_scripts: Mutex::new(Default::default()),
    });
    let launcher = Arc::new(SynchronousLauncher {
        store: store.clone(),
        connector,
    });
    let mut coordinator = Coordinator::new(store, launcher);

    // No members registered; drive_to_commit has nothing to act on.
    let err = coordinator.drive_to_commit().unwrap_err();
    assert!(matches!(err, GxactError::InvalidTransactionState(_)));
}

#[test]
fn recovery_is_idempotent_across_two_runs() {
    // First run resolves everything; a second run against an already
    // unlinked log is a no-op error (open_existing fails), matching the
    // property that recovery never re-applies a terminal command once
    // the member list is empty and the file is gone.
    let tmp = tempfile::tempdir().unwrap();
    let store = LogStore::open(tmp.path()).unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let mut set = gxact::set::TransactionSet::begin(&store, "idem".into()).unwrap();
    set.enter_prepare().unwrap();
    set.write_action(
        Phase::Prepare,
        &endpoint("remote-a", 5432, "db1"),
        "idem_1",
        gxact::log::ActionStatus::Todo,
    )
    .unwrap();
    set.close();

    let mut scripts = std::collections::HashMap::new();
    scripts.insert("remote-a".to_string(), vec![true]);
    let connector = Arc::new(ScriptedConnector {
        calls: calls.clone(),
        probe_scripts: Mutex::new(scripts),
    });

    let worker =
        gxact::recovery::RecoveryWorker::new(connector).with_poll_interval(Duration::from_millis(1));
    worker.run(&store, "idem").unwrap();
    assert!(store.list_in_flight().unwrap().is_empty());

    let second_run = worker.run(&store, "idem");
    assert!(second_run.is_err());
}
