//! The coordinator's phase automaton.
//!
//! A [`Phase`] is the coordinator's state value for a transaction set.
//! Transitions are restricted to the table below; nothing else is legal.

use crate::error::{GxactError, Result};

/// One of the six phases a transaction set can occupy.
///
/// Totally ordered only with respect to the legal-transition relation
/// (see [`is_valid_transition`]), not numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Begin,
    Prepare,
    Commit,
    Rollback,
    Complete,
    Incomplete,
}

/// The legal `(from, to)` transitions. No transition targets [`Phase::Begin`];
/// it is only an initial value assigned at set creation.
const TRANSITIONS: &[(Phase, Phase)] = &[
    (Phase::Begin, Phase::Prepare),
    (Phase::Prepare, Phase::Commit),
    (Phase::Prepare, Phase::Rollback),
    (Phase::Commit, Phase::Complete),
    (Phase::Commit, Phase::Incomplete),
    (Phase::Rollback, Phase::Complete),
    (Phase::Rollback, Phase::Incomplete),
    (Phase::Incomplete, Phase::Complete),
];

impl Phase {
    /// The on-disk label for this phase (`phase <label>` / action lines).
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Begin => "begin",
            Phase::Prepare => "prepare",
            Phase::Commit => "commit",
            Phase::Rollback => "rollback",
            Phase::Complete => "complete",
            Phase::Incomplete => "incomplete",
        }
    }

    /// Parse a phase from its on-disk label.
    ///
    /// Fails with [`GxactError::InvalidTransactionState`] if `label` is not
    /// one of the six recognized labels.
    pub fn from_label(label: &str) -> Result<Phase> {
        match label {
            "begin" => Ok(Phase::Begin),
            "prepare" => Ok(Phase::Prepare),
            "commit" => Ok(Phase::Commit),
            "rollback" => Ok(Phase::Rollback),
            "complete" => Ok(Phase::Complete),
            "incomplete" => Ok(Phase::Incomplete),
            other => Err(GxactError::InvalidTransactionState(format!(
                "unknown phase label '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Whether `(old, new)` is a legal phase transition.
pub fn is_valid_transition(old: Phase, new: Phase) -> bool {
    TRANSITIONS.contains(&(old, new))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 6] = [
        Phase::Begin,
        Phase::Prepare,
        Phase::Commit,
        Phase::Rollback,
        Phase::Complete,
        Phase::Incomplete,
    ];

    #[test]
    fn label_round_trips() {
        for p in ALL {
            assert_eq!(Phase::from_label(p.label()).unwrap(), p);
        }
    }

    #[test]
    fn unknown_label_fails() {
        let err = Phase::from_label("bogus").unwrap_err();
        assert!(matches!(err, GxactError::InvalidTransactionState(_)));
    }

    #[test]
    fn transition_table_matches_spec_exactly() {
        for old in ALL {
            for new in ALL {
                let expected = TRANSITIONS.contains(&(old, new));
                assert_eq!(
                    is_valid_transition(old, new),
                    expected,
                    "mismatch for ({:?}, {:?})",
                    old,
                    new
                );
            }
        }
    }

    #[test]
    fn nothing_targets_begin() {
        for old in ALL {
            assert!(!is_valid_transition(old, Phase::Begin));
        }
    }

    #[test]
    fn complete_and_incomplete_are_terminal_except_incomplete_to_complete() {
        for new in ALL {
            assert!(!is_valid_transition(Phase::Complete, new));
        }
        for new in ALL {
            let expected = new == Phase::Complete;
            assert_eq!(is_valid_transition(Phase::Incomplete, new), expected);
        }
    }
}
