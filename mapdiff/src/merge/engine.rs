use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, MapDiffResult};
use crate::types::{Position, SourceStatus};

/// Role of a source in a merge session.
///
/// Exactly one source leads and the other follows. On a tied position the follower reports
/// [`MergeOutcome::SameElement`] straight away while the leader keeps its element in place and
/// waits until the follower has moved past it. Two leaders would wait on each other forever at
/// the first tie, two followers would report ties the other side has not reached yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Leader,
    Follower,
}

impl Role {
    pub fn counterpart(self) -> Role {
        match self {
            Role::Leader => Role::Follower,
            Role::Follower => Role::Leader,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Role::Leader => 0,
            Role::Follower => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader => f.write_str("leader"),
            Role::Follower => f.write_str("follower"),
        }
    }
}

/// Whether the counterpart source holds the element a source just reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    SameElement,
    DifferentElement,
}

/// Comparable progress of a source. A source that has not started sorts before every
/// position, a completed source after every position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Progress {
    NotStarted,
    At(Position),
    Complete,
}

impl Progress {
    pub(crate) fn status(self) -> SourceStatus {
        match self {
            Progress::NotStarted => SourceStatus::NotStarted,
            Progress::At(position) => SourceStatus::AtKind(position.kind),
            Progress::Complete => SourceStatus::Complete,
        }
    }
}

/// Result of one pass of the merge loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Resolved(MergeOutcome),
    /// Wake the counterpart and wait for it to move. `same_element` carries a tie seen by the
    /// leader over to the following passes.
    Wait { same_element: bool },
}

/// Decides one pass of the merge loop for a source sitting at `this`.
///
/// `same_element` is true when an earlier pass of the same call saw a tie.
pub(crate) fn step(this: Position, other: Progress, role: Role, same_element: bool) -> Step {
    let this = Progress::At(this);

    if this < other {
        // The counterpart is already past this position.
        let outcome = if same_element {
            MergeOutcome::SameElement
        } else {
            MergeOutcome::DifferentElement
        };
        return Step::Resolved(outcome);
    }

    if this == other {
        return match role {
            Role::Follower => Step::Resolved(MergeOutcome::SameElement),
            Role::Leader => Step::Wait { same_element: true },
        };
    }

    Step::Wait { same_element }
}

/// Checks that `next` may follow `previous` within one source.
///
/// Kinds may not go backwards, and within a kind identifiers must strictly increase.
pub fn validate_ordering(previous: &Position, next: &Position) -> MapDiffResult<()> {
    if next.kind < previous.kind {
        bail!(
            ErrorKind::OrderingViolation,
            "Entity kind went backwards",
            format!("{next} arrived after {previous}")
        );
    }

    if next.kind == previous.kind && next.id <= previous.id {
        bail!(
            ErrorKind::OrderingViolation,
            "Entity identifiers are not strictly increasing",
            format!("{next} arrived after {previous}")
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Kind;

    fn at(kind: u16, id: i64) -> Position {
        Position::new(Kind::new(kind), id)
    }

    #[test]
    fn behind_the_counterpart_resolves() {
        assert_eq!(
            step(at(0, 1), Progress::At(at(0, 2)), Role::Leader, false),
            Step::Resolved(MergeOutcome::DifferentElement)
        );
        assert_eq!(
            step(at(0, 1), Progress::At(at(0, 2)), Role::Leader, true),
            Step::Resolved(MergeOutcome::SameElement)
        );
        assert_eq!(
            step(at(2, 1), Progress::Complete, Role::Follower, false),
            Step::Resolved(MergeOutcome::DifferentElement)
        );
    }

    #[test]
    fn tie_resolves_for_follower_and_waits_for_leader() {
        assert_eq!(
            step(at(1, 5), Progress::At(at(1, 5)), Role::Follower, false),
            Step::Resolved(MergeOutcome::SameElement)
        );
        assert_eq!(
            step(at(1, 5), Progress::At(at(1, 5)), Role::Leader, false),
            Step::Wait { same_element: true }
        );
    }

    #[test]
    fn ahead_of_the_counterpart_waits() {
        assert_eq!(
            step(at(0, 1), Progress::NotStarted, Role::Follower, false),
            Step::Wait {
                same_element: false
            }
        );
        assert_eq!(
            step(at(1, 1), Progress::At(at(0, 900)), Role::Leader, false),
            Step::Wait {
                same_element: false
            }
        );
    }

    #[test]
    fn ordering_requires_strictly_increasing_positions() {
        assert!(validate_ordering(&at(0, 1), &at(0, 2)).is_ok());
        assert!(validate_ordering(&at(0, 9), &at(1, 1)).is_ok());

        let same = validate_ordering(&at(0, 2), &at(0, 2)).unwrap_err();
        assert_eq!(same.kind(), ErrorKind::OrderingViolation);

        let lower = validate_ordering(&at(0, 2), &at(0, 1)).unwrap_err();
        assert_eq!(lower.kind(), ErrorKind::OrderingViolation);

        let regressed = validate_ordering(&at(1, 1), &at(0, 5)).unwrap_err();
        assert_eq!(regressed.kind(), ErrorKind::OrderingViolation);
    }

    #[test]
    fn progress_maps_to_source_status() {
        assert_eq!(Progress::NotStarted.status(), SourceStatus::NotStarted);
        assert_eq!(
            Progress::At(at(2, 1)).status(),
            SourceStatus::AtKind(Kind::new(2))
        );
        assert_eq!(Progress::Complete.status(), SourceStatus::Complete);
    }
}
