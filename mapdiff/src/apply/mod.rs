//! Changeset application onto a sorted base snapshot.
//!
//! The base snapshot is fed into a [`BaseSource`] and the changeset, sorted the same way, into a
//! [`ChangeSource`]. The sink receives the updated snapshot in position order: untouched base
//! elements, created and modified elements from the changeset, and nothing for deletions.

use metrics::counter;

use crate::error::{ErrorKind, MapDiffResult};
use crate::mapdiff_error;
use crate::merge::state::MergeState;
use crate::merge::{MergeOutcome, Operation, Role, SourceHandle};
use crate::metrics::{MAPDIFF_ENTITIES_FORWARDED_TOTAL, OPERATION_LABEL};
use crate::sink::EntitySink;
use crate::types::{ChangeAction, Entity, Kind, KindCatalog, SourceStatus};

/// Opens an apply session writing into `sink`.
///
/// Returns the adapter for the base snapshot, which leads the merge, and the adapter for the
/// changeset, which follows. Each must be driven by its own thread.
pub fn open_session<E, S>(catalog: KindCatalog, sink: S) -> (BaseSource<E, S>, ChangeSource<E, S>)
where
    E: Entity,
    S: EntitySink<E>,
{
    let state = MergeState::new(Operation::Apply, catalog, sink);
    let (leader, follower) = SourceHandle::pair(state);

    (
        BaseSource { handle: leader },
        ChangeSource { handle: follower },
    )
}

fn record_forwarded() {
    counter!(MAPDIFF_ENTITIES_FORWARDED_TOTAL, OPERATION_LABEL => Operation::Apply.as_str())
        .increment(1);
}

/// Feeds the base snapshot into an apply session.
#[derive(Debug)]
pub struct BaseSource<E, S>
where
    E: Entity,
    S: EntitySink<E>,
{
    handle: SourceHandle<E, S>,
}

impl<E, S> BaseSource<E, S>
where
    E: Entity,
    S: EntitySink<E>,
{
    pub fn session_id(&self) -> u64 {
        self.handle.session_id()
    }

    pub fn catalog(&self) -> &KindCatalog {
        self.handle.state.catalog()
    }

    pub fn status(&self) -> MapDiffResult<SourceStatus> {
        self.handle.status()
    }

    /// Delivers the next base element, forwarding it unless the changeset touches it.
    pub fn process(&mut self, kind: Kind, entity: E) -> MapDiffResult<()> {
        let state = &self.handle.state;
        let (mut inner, outcome) = state.advance(Role::Leader, kind, entity)?;

        if outcome == MergeOutcome::DifferentElement {
            let entity = state.take_latest(&mut inner, Role::Leader, kind)?;
            state.deliver(&mut inner, |sink| sink.process(entity))?;
            record_forwarded();
        }

        Ok(())
    }

    pub fn complete(&mut self) -> MapDiffResult<()> {
        self.handle.complete()
    }

    /// Releases this side of the session. Dropping the adapter has the same effect.
    pub fn release(mut self) -> MapDiffResult<()> {
        self.handle.release()
    }
}

/// Feeds a changeset into an apply session.
#[derive(Debug)]
pub struct ChangeSource<E, S>
where
    E: Entity,
    S: EntitySink<E>,
{
    handle: SourceHandle<E, S>,
}

impl<E, S> ChangeSource<E, S>
where
    E: Entity,
    S: EntitySink<E>,
{
    pub fn session_id(&self) -> u64 {
        self.handle.session_id()
    }

    pub fn catalog(&self) -> &KindCatalog {
        self.handle.state.catalog()
    }

    pub fn status(&self) -> MapDiffResult<SourceStatus> {
        self.handle.status()
    }

    /// Delivers the next change.
    ///
    /// A create must target an identifier missing from the base snapshot, a modify or delete
    /// one that is present. Anything else fails with [`ErrorKind::InvalidChangeAction`] and
    /// aborts the session.
    pub fn process(&mut self, kind: Kind, entity: E, action: ChangeAction) -> MapDiffResult<()> {
        let state = &self.handle.state;
        let (mut inner, outcome) = state.advance(Role::Follower, kind, entity)?;

        let forward = match (outcome, action) {
            (MergeOutcome::DifferentElement, ChangeAction::Create) => true,
            (MergeOutcome::SameElement, ChangeAction::Modify) => true,
            (MergeOutcome::SameElement, ChangeAction::Delete) => false,
            _ => {
                let id = inner.latest(Role::Follower, kind).map(Entity::id);
                let presence = match outcome {
                    MergeOutcome::SameElement => "present in",
                    MergeOutcome::DifferentElement => "missing from",
                };
                let err = mapdiff_error!(
                    ErrorKind::InvalidChangeAction,
                    "Change action contradicts the base snapshot",
                    format!(
                        "{action} of {kind} with id {id:?}, which is {presence} the base snapshot"
                    )
                );
                return Err(state.fail(&mut inner, err));
            }
        };

        if forward {
            let entity = state.take_latest(&mut inner, Role::Follower, kind)?;
            state.deliver(&mut inner, |sink| sink.process(entity))?;
            record_forwarded();
        }

        Ok(())
    }

    pub fn complete(&mut self) -> MapDiffResult<()> {
        self.handle.complete()
    }

    /// Releases this side of the session. Dropping the adapter has the same effect.
    pub fn release(mut self) -> MapDiffResult<()> {
        self.handle.release()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::sink::memory::MemoryEntitySink;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: i64,
        content: &'static str,
    }

    impl Entity for Item {
        fn id(&self) -> i64 {
            self.id
        }
    }

    fn item(id: i64, content: &'static str) -> Item {
        Item { id, content }
    }

    #[test]
    fn applies_creates_and_modifies_around_untouched_base() {
        let catalog = KindCatalog::new(["item"]).unwrap();
        let kind = Kind::new(0);
        let sink = MemoryEntitySink::new();
        let (mut base, mut changes) = open_session(catalog, sink.clone());

        let base = thread::spawn(move || -> MapDiffResult<()> {
            base.process(kind, item(1, "base"))?;
            base.process(kind, item(2, "base"))?;
            base.complete()?;
            base.release()
        });
        let changes = thread::spawn(move || -> MapDiffResult<()> {
            changes.process(kind, item(2, "changed"), ChangeAction::Modify)?;
            changes.process(kind, item(3, "created"), ChangeAction::Create)?;
            changes.complete()?;
            changes.release()
        });
        base.join().unwrap().unwrap();
        changes.join().unwrap().unwrap();

        assert_eq!(
            sink.entities(),
            vec![item(1, "base"), item(2, "changed"), item(3, "created")]
        );
        assert!(sink.is_completed());
        assert!(sink.is_released());
    }

    #[test]
    fn delete_of_missing_identifier_is_rejected() {
        let catalog = KindCatalog::new(["item"]).unwrap();
        let kind = Kind::new(0);
        let sink = MemoryEntitySink::new();
        let (mut base, mut changes) = open_session(catalog, sink.clone());

        base.complete().unwrap();
        let err = changes
            .process(kind, item(9, "gone"), ChangeAction::Delete)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidChangeAction);
        assert!(sink.entities().is_empty());

        drop(changes);
        drop(base);
        assert!(!sink.is_completed());
        assert!(sink.is_released());
    }
}
