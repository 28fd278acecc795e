//! Session lifecycle rules.
//!
//! The repository stores any status it is given. Callers that change a
//! session's status on behalf of a user go through [`SessionLifecycle`],
//! which checks the move against the allow-list below first.
//!
//! ```text
//! created ──► active ──► completed
//!    │          │
//!    ├──────────┴──────► error
//!    └──────────┴──────► cancelled
//! ```
//!
//! `completed`, `error`, and `cancelled` are terminal.

use tracing::warn;
use uuid::Uuid;

use super::db::Store;
use super::error::{StoreError, StoreResult};
use super::models::{Session, SessionStatus};
use super::sessions::SessionRepository;

use SessionStatus::{Active, Cancelled, Completed, Created, Error};

/// Allowed `(from, to)` status moves.
const ALLOWED_TRANSITIONS: &[(SessionStatus, SessionStatus)] = &[
    (Created, Active),
    (Created, Error),
    (Created, Cancelled),
    (Active, Completed),
    (Active, Error),
    (Active, Cancelled),
];

impl SessionStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        ALLOWED_TRANSITIONS.contains(&(self, next))
    }

    /// True for states with no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        !ALLOWED_TRANSITIONS.iter().any(|(from, _)| *from == self)
    }

    /// States reachable from `self` in one step.
    pub fn successors(self) -> Vec<SessionStatus> {
        ALLOWED_TRANSITIONS
            .iter()
            .filter(|(from, _)| *from == self)
            .map(|(_, to)| *to)
            .collect()
    }
}

/// Validated status changes on top of [`SessionRepository`].
#[derive(Debug, Clone, Copy)]
pub struct SessionLifecycle<'a> {
    sessions: SessionRepository<'a>,
}

impl<'a> SessionLifecycle<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            sessions: SessionRepository::new(store),
        }
    }

    /// Move a session to `next` if the lifecycle allows it.
    ///
    /// Returns the session as stored after the change. The read and the
    /// write are separate statements; a concurrent writer may interleave.
    pub fn transition(&self, id: &Uuid, next: SessionStatus) -> StoreResult<Session> {
        let current = self.sessions.get(id)?.ok_or_else(|| StoreError::NotFound {
            entity: "session",
            id: id.to_string(),
        })?;

        if !current.status.can_transition_to(next) {
            warn!(%id, from = %current.status, to = %next, "Rejected session status change");
            return Err(StoreError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        self.sessions.update_status(id, next)?;

        self.sessions.get(id)?.ok_or_else(|| StoreError::NotFound {
            entity: "session",
            id: id.to_string(),
        })
    }

    pub fn activate(&self, id: &Uuid) -> StoreResult<Session> {
        self.transition(id, Active)
    }

    pub fn complete(&self, id: &Uuid) -> StoreResult<Session> {
        self.transition(id, Completed)
    }

    pub fn fail(&self, id: &Uuid) -> StoreResult<Session> {
        self.transition(id, Error)
    }

    pub fn cancel(&self, id: &Uuid) -> StoreResult<Session> {
        self.transition(id, Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::Project;
    use crate::storage::projects::ProjectRepository;

    fn create_test_session(store: &Store) -> Session {
        let mut project = Project::new("demo", "/tmp/demo", 4096);
        ProjectRepository::new(store).create(&mut project).unwrap();
        let mut session = Session::new(project.id, "coder");
        SessionRepository::new(store).create(&mut session).unwrap();
        session
    }

    fn create_test_store() -> Store {
        let store = Store::open_in_memory("test-key").expect("Failed to open test store");
        store.migrate().expect("Failed to migrate");
        store
    }

    #[test]
    fn test_allow_list() {
        assert!(Created.can_transition_to(Active));
        assert!(Created.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Error));

        assert!(!Created.can_transition_to(Created));
        assert!(!Created.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Created));
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<SessionStatus> = SessionStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![Completed, Error, Cancelled]);
        assert_eq!(Created.successors(), vec![Active, Error, Cancelled]);
    }

    #[test]
    fn test_happy_path() {
        let store = create_test_store();
        let session = create_test_session(&store);
        let lifecycle = SessionLifecycle::new(&store);

        let active = lifecycle.activate(&session.id).expect("created -> active");
        assert_eq!(active.status, Active);
        assert!(active.updated_at >= session.updated_at);

        let done = lifecycle.complete(&session.id).expect("active -> completed");
        assert_eq!(done.status, Completed);
    }

    #[test]
    fn test_terminal_state_rejects_changes() {
        let store = create_test_store();
        let session = create_test_session(&store);
        let lifecycle = SessionLifecycle::new(&store);

        lifecycle.cancel(&session.id).unwrap();
        let err = lifecycle.activate(&session.id).unwrap_err();

        assert!(matches!(
            err,
            StoreError::InvalidTransition { from: Cancelled, to: Active }
        ));
        let stored = SessionRepository::new(&store).get(&session.id).unwrap().unwrap();
        assert_eq!(stored.status, Cancelled, "Rejected change must not be written");
    }

    #[test]
    fn test_missing_session_is_not_found() {
        let store = create_test_store();
        let lifecycle = SessionLifecycle::new(&store);

        let err = lifecycle.fail(&Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "session", .. }));
    }
}
