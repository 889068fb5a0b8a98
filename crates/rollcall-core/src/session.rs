//! Per-activation attendance state machine.
//!
//! Every registry name starts Pending; the first match transitions it to
//! Marked, which is terminal for the session. The session itself emits no
//! side effects — the engine dispatches persistence and announcement when
//! [`AttendanceSession::observe`] reports a transition.

use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug)]
pub struct AttendanceSession {
    id: Uuid,
    started_at: DateTime<Local>,
    pending: BTreeSet<String>,
    marked: Vec<String>,
}

impl AttendanceSession {
    /// Start a session with every roster name Pending.
    pub fn new<I, S>(roster: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            started_at: Local::now(),
            pending: roster.into_iter().map(Into::into).collect(),
            marked: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Record a sighting of `name`.
    ///
    /// Returns true exactly once per name — on its Pending → Marked
    /// transition. Names outside the roster (and re-sightings of Marked
    /// names) return false and change nothing.
    pub fn observe(&mut self, name: &str) -> bool {
        if self.pending.remove(name) {
            self.marked.push(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn pending(&self) -> &BTreeSet<String> {
        &self.pending
    }

    /// Names marked present, in marking order.
    pub fn marked(&self) -> &[String] {
        &self.marked
    }

    /// True once every roster name has been marked.
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_transitions() {
        let mut session = AttendanceSession::new(["alice", "bob"]);
        assert!(session.observe("alice"));
        assert!(!session.pending().contains("alice"));
        assert_eq!(session.marked(), ["alice"]);
    }

    #[test]
    fn repeat_observations_are_idempotent() {
        let mut session = AttendanceSession::new(["alice", "bob"]);
        assert!(session.observe("alice"));
        for _ in 0..10 {
            assert!(!session.observe("alice"));
        }
        assert_eq!(session.marked(), ["alice"]);
        assert_eq!(session.pending().len(), 1);
    }

    #[test]
    fn names_outside_the_roster_are_ignored() {
        let mut session = AttendanceSession::new(["alice"]);
        assert!(!session.observe("mallory"));
        assert!(session.marked().is_empty());
        assert_eq!(session.pending().len(), 1);
    }

    #[test]
    fn a_name_is_in_exactly_one_state() {
        let mut session = AttendanceSession::new(["alice", "bob", "carol"]);
        session.observe("bob");
        for name in ["alice", "bob", "carol"] {
            let in_pending = session.pending().contains(name);
            let in_marked = session.marked().contains(&name.to_string());
            assert!(in_pending ^ in_marked, "{name} must be pending xor marked");
        }
    }

    #[test]
    fn exhaustion_after_everyone_is_marked() {
        let mut session = AttendanceSession::new(["alice", "bob"]);
        assert!(!session.is_exhausted());
        session.observe("alice");
        session.observe("bob");
        assert!(session.is_exhausted());

        // Further sightings produce no transitions.
        assert!(!session.observe("alice"));
        assert!(!session.observe("bob"));
        assert_eq!(session.marked().len(), 2);
    }

    #[test]
    fn empty_roster_is_exhausted_from_the_start() {
        let session = AttendanceSession::new(Vec::<String>::new());
        assert!(session.is_exhausted());
    }
}
