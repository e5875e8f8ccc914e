//! The in-memory model of a transaction set: one local session's work
//! paired with one prepared transaction on each participating remote node.

use crate::error::{GxactError, Result};
use crate::log::{LogHandle, LogRecord, LogStore};
use crate::member::Member;
use crate::phase::{is_valid_transition, Phase};
use crate::remote::RemoteEndpoint;

/// Bound on the derived member name (`<prefix>_<counter>`), matching the
/// maximum identifier length remote 2PC gids are typically restricted to.
pub const MAX_MEMBER_NAME_LEN: usize = 64;

/// The unit of atomicity: a prefix, an ordered member list, a phase, and
/// an open log handle.
pub struct TransactionSet {
    pub prefix: String,
    pub phase: Phase,
    pub members: Vec<Member>,
    counter: u64,
    path: std::path::PathBuf,
    log: Option<LogHandle>,
}

impl TransactionSet {
    /// Begin a new set: allocate a prefix, create and open its log file,
    /// and write the initial BEGIN phase line.
    pub fn begin(store: &LogStore, prefix: String) -> Result<Self> {
        let mut log = store.create_set_file(&prefix)?;
        log.write_phase(&LogRecord::Phase(Phase::Begin))?;
        let path = log.path().to_path_buf();

        Ok(Self {
            prefix,
            phase: Phase::Begin,
            members: Vec::new(),
            counter: 0,
            path,
            log: Some(log),
        })
    }

    /// Enter PREPARE. The first registration performs the BEGIN -> PREPARE
    /// transition and writes one phase line; every later registration in
    /// the same set is already in PREPARE and is a no-op here (the log
    /// carries exactly one `phase prepare` line per set, not one per
    /// member).
    pub fn enter_prepare(&mut self) -> Result<()> {
        match self.phase {
            Phase::Begin => self.transition_to(Phase::Prepare),
            Phase::Prepare => Ok(()),
            other => Err(GxactError::InvalidTransactionState(format!(
                "cannot register a new member while in phase {:?}",
                other
            ))),
        }
    }

    fn log_mut(&mut self) -> Result<&mut LogHandle> {
        self.log
            .as_mut()
            .ok_or_else(|| GxactError::InvalidTransactionState("log file already closed".into()))
    }

    /// Close the log file handle. Idempotent.
    pub fn close(&mut self) {
        self.log = None;
    }

    /// Derive the next member name (`<prefix>_<counter>`), verifying it
    /// fits within [`MAX_MEMBER_NAME_LEN`].
    pub fn next_member_name(&mut self) -> Result<String> {
        self.counter += 1;
        let name = format!("{}_{}", self.prefix, self.counter);
        if name.len() > MAX_MEMBER_NAME_LEN {
            return Err(GxactError::InvalidTransactionState(format!(
                "member name '{}' exceeds {} bytes",
                name, MAX_MEMBER_NAME_LEN
            )));
        }
        Ok(name)
    }

    /// Move to `new`, failing if the transition is illegal. The in-memory
    /// phase and the last phase record in the log stay equal.
    pub fn transition_to(&mut self, new: Phase) -> Result<()> {
        if !is_valid_transition(self.phase, new) {
            return Err(GxactError::InvalidTransactionState(format!(
                "illegal transition {:?} -> {:?}",
                self.phase, new
            )));
        }
        self.log_mut()?.write_phase(&LogRecord::Phase(new))?;
        self.phase = new;
        Ok(())
    }

    /// Write a durable action line. Must be called before the
    /// corresponding SQL command is issued.
    pub fn write_action(
        &mut self,
        phase: Phase,
        endpoint: &RemoteEndpoint,
        member_name: &str,
        status: crate::log::ActionStatus,
    ) -> Result<()> {
        self.log_mut()?.write_action_durable(&LogRecord::Action {
            phase,
            endpoint: endpoint.clone(),
            member_name: member_name.to_string(),
            status,
        })
    }

    pub fn push_member(&mut self, member: Member) {
        self.members.push(member);
    }

    pub fn log_path(&self) -> &std::path::Path {
        &self.path
    }
}
