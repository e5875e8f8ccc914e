//! Log record shapes and the ASCII line codec.
//!
//! Two record shapes, one per line, newline-terminated, ASCII:
//! - a *phase line*: `phase <label>\n`
//! - an *action line*: `<phase-label> postgresql://<host>:<port>/<db> <txn-name> <status>\n`
//!
//! A phase line is a prediction of intent; an action line is evidence that
//! a remote command has been issued and must survive a crash. See
//! [`crate::log::store::LogStore`] for the fsync discipline that backs
//! that distinction.

use crate::error::{GxactError, Result};
use crate::phase::Phase;
use crate::remote::RemoteEndpoint;

/// Maximum length, in bytes, of a single log line (including the
/// terminating newline). A line exceeding this is reported as corrupt
/// rather than silently truncated.
pub const MAX_LINE_LEN: usize = 512;

/// The outcome recorded for one member's terminal command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// The command has been decided but not yet issued/acknowledged.
    Todo,
    Ok,
    Bad,
}

impl ActionStatus {
    fn label(&self) -> &'static str {
        match self {
            ActionStatus::Todo => "todo",
            ActionStatus::Ok => "OK",
            ActionStatus::Bad => "BAD",
        }
    }

    fn from_label(label: &str) -> Option<ActionStatus> {
        match label {
            "todo" => Some(ActionStatus::Todo),
            "OK" => Some(ActionStatus::Ok),
            "BAD" => Some(ActionStatus::Bad),
            _ => None,
        }
    }
}

/// One parsed log record.
#[derive(Debug, Clone)]
pub enum LogRecord {
    /// `phase <label>`
    Phase(Phase),
    /// `<phase-label> <url> <member-name> <status>`
    Action {
        phase: Phase,
        endpoint: RemoteEndpoint,
        member_name: String,
        status: ActionStatus,
    },
}

impl LogRecord {
    /// Encode this record as a single line, including the trailing `\n`.
    pub fn encode(&self) -> String {
        match self {
            LogRecord::Phase(p) => format!("phase {}\n", p.label()),
            LogRecord::Action {
                phase,
                endpoint,
                member_name,
                status,
            } => format!(
                "{} {} {} {}\n",
                phase.label(),
                endpoint,
                member_name,
                status.label()
            ),
        }
    }

    /// Parse one line (without its trailing newline).
    ///
    /// The first whitespace-delimited token classifies the line: `phase`
    /// introduces a phase record; anything else is treated as an action
    /// record whose first token is a phase label. A mismatch between that
    /// label and the set's current phase is the caller's concern to warn
    /// about; this function only rejects lines it cannot parse at all.
    /// A connection string that does not start with `postgresql://` is
    /// rejected so the caller can warn and skip it.
    pub fn parse_line(line: &str) -> Result<LogRecord> {
        if line.len() + 1 > MAX_LINE_LEN {
            return Err(GxactError::CorruptLog(format!(
                "line exceeds {} bytes",
                MAX_LINE_LEN
            )));
        }

        let mut parts = line.split_whitespace();
        let first = parts
            .next()
            .ok_or_else(|| GxactError::CorruptLog("empty line".into()))?;

        if first == "phase" {
            let label = parts
                .next()
                .ok_or_else(|| GxactError::CorruptLog("phase line missing label".into()))?;
            return Ok(LogRecord::Phase(Phase::from_label(label)?));
        }

        // Action line: first token is itself a phase label.
        let phase = Phase::from_label(first)?;
        let url = parts
            .next()
            .ok_or_else(|| GxactError::CorruptLog("action line missing url".into()))?;
        let member_name = parts
            .next()
            .ok_or_else(|| GxactError::CorruptLog("action line missing member name".into()))?;
        let status_label = parts
            .next()
            .ok_or_else(|| GxactError::CorruptLog("action line missing status".into()))?;

        let endpoint: RemoteEndpoint = url.parse()?;
        let status = ActionStatus::from_label(status_label).ok_or_else(|| {
            GxactError::CorruptLog(format!("unknown status '{}'", status_label))
        })?;

        Ok(LogRecord::Action {
            phase,
            endpoint,
            member_name: member_name.to_string(),
            status,
        })
    }
}
