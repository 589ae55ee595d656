//! Changeset derivation between two sorted snapshots.
//!
//! The old snapshot is fed into a [`FromSource`] and the new snapshot into a [`ToSource`], each
//! from its own thread. Together they emit, in position order:
//! - [`ChangeAction::Delete`] for elements only present in the old snapshot,
//! - [`ChangeAction::Create`] for elements only present in the new snapshot,
//! - [`ChangeAction::Modify`] for elements present in both whose content differs.
//!
//! ```
//! use std::thread;
//!
//! use mapdiff::derive;
//! use mapdiff::sink::memory::MemoryChangeSink;
//! use mapdiff::types::{ChangeAction, EntityMeta, KindCatalog, MapEntity, Node};
//!
//! let catalog = KindCatalog::osm();
//! let node = catalog.kind("node").unwrap();
//! let sink = MemoryChangeSink::new();
//! let (mut from, mut to) = derive::open_session(catalog, sink.clone());
//!
//! let old = thread::spawn(move || {
//!     from.process(node, MapEntity::from(Node::new(EntityMeta::new(1, 1), 0.0, 0.0)))?;
//!     from.complete()?;
//!     from.release()
//! });
//! let new = thread::spawn(move || {
//!     to.complete()?;
//!     to.release()
//! });
//! old.join().unwrap().unwrap();
//! new.join().unwrap().unwrap();
//!
//! assert_eq!(sink.changes()[0].action, ChangeAction::Delete);
//! assert!(sink.is_completed());
//! ```

use metrics::counter;

use crate::error::{ErrorKind, MapDiffResult};
use crate::mapdiff_error;
use crate::merge::state::MergeState;
use crate::merge::{MergeOutcome, Operation, Role, SourceHandle};
use crate::metrics::{ACTION_LABEL, MAPDIFF_CHANGES_EMITTED_TOTAL};
use crate::sink::ChangeSink;
use crate::types::{Change, ChangeAction, Entity, Kind, KindCatalog, SourceStatus};

/// Opens a derive session writing into `sink`.
///
/// Returns the adapter for the old snapshot, which leads the merge, and the adapter for the
/// new snapshot, which follows. Each must be driven by its own thread.
pub fn open_session<E, S>(catalog: KindCatalog, sink: S) -> (FromSource<E, S>, ToSource<E, S>)
where
    E: Entity,
    S: ChangeSink<E>,
{
    let state = MergeState::new(Operation::Derive, catalog, sink);
    let (leader, follower) = SourceHandle::pair(state);

    (FromSource { handle: leader }, ToSource { handle: follower })
}

fn record_emitted(action: ChangeAction) {
    counter!(MAPDIFF_CHANGES_EMITTED_TOTAL, ACTION_LABEL => action.as_str()).increment(1);
}

/// Feeds the old snapshot into a derive session.
#[derive(Debug)]
pub struct FromSource<E, S>
where
    E: Entity,
    S: ChangeSink<E>,
{
    handle: SourceHandle<E, S>,
}

impl<E, S> FromSource<E, S>
where
    E: Entity,
    S: ChangeSink<E>,
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

    /// Delivers the next element of the old snapshot.
    ///
    /// Emits a delete if the new snapshot has no element at the same position. May block until
    /// the new snapshot's producer has caught up.
    pub fn process(&mut self, kind: Kind, entity: E) -> MapDiffResult<()> {
        let state = &self.handle.state;
        let (mut inner, outcome) = state.advance(Role::Leader, kind, entity)?;

        if outcome == MergeOutcome::DifferentElement {
            let entity = state.take_latest(&mut inner, Role::Leader, kind)?;
            state.deliver(&mut inner, |sink| sink.process_change(Change::delete(entity)))?;
            record_emitted(ChangeAction::Delete);
        }

        Ok(())
    }

    /// Signals that the old snapshot is exhausted.
    pub fn complete(&mut self) -> MapDiffResult<()> {
        self.handle.complete()
    }

    /// Releases this side of the session. Dropping the adapter has the same effect.
    pub fn release(mut self) -> MapDiffResult<()> {
        self.handle.release()
    }
}

/// Feeds the new snapshot into a derive session.
#[derive(Debug)]
pub struct ToSource<E, S>
where
    E: Entity,
    S: ChangeSink<E>,
{
    handle: SourceHandle<E, S>,
}

impl<E, S> ToSource<E, S>
where
    E: Entity,
    S: ChangeSink<E>,
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

    /// Delivers the next element of the new snapshot.
    ///
    /// Emits a create if the old snapshot has no element at the same position, and a modify if
    /// it has one with different content.
    pub fn process(&mut self, kind: Kind, entity: E) -> MapDiffResult<()> {
        let state = &self.handle.state;
        let (mut inner, outcome) = state.advance(Role::Follower, kind, entity)?;

        let action = match outcome {
            MergeOutcome::DifferentElement => ChangeAction::Create,
            MergeOutcome::SameElement => {
                let modified = match (
                    inner.latest(Role::Leader, kind),
                    inner.latest(Role::Follower, kind),
                ) {
                    (Some(old), Some(new)) => Some(old != new),
                    _ => None,
                };

                match modified {
                    Some(true) => ChangeAction::Modify,
                    Some(false) => return Ok(()),
                    None => {
                        let err = mapdiff_error!(
                            ErrorKind::InvalidState,
                            "Tied sources have no element to compare",
                            format!("tie on {kind} in session {}", state.id())
                        );
                        return Err(state.fail(&mut inner, err));
                    }
                }
            }
        };

        let entity = state.take_latest(&mut inner, Role::Follower, kind)?;
        state.deliver(&mut inner, |sink| {
            sink.process_change(Change::new(action, entity))
        })?;
        record_emitted(action);

        Ok(())
    }

    /// Signals that the new snapshot is exhausted.
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
    use crate::sink::memory::MemoryChangeSink;

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
    fn emits_delete_modify_create_in_order() {
        let catalog = KindCatalog::new(["item"]).unwrap();
        let kind = Kind::new(0);
        let sink = MemoryChangeSink::new();
        let (mut from, mut to) = open_session(catalog, sink.clone());

        let old = thread::spawn(move || -> MapDiffResult<()> {
            from.process(kind, item(1, "a"))?;
            from.process(kind, item(2, "a"))?;
            from.complete()?;
            from.release()
        });
        let new = thread::spawn(move || -> MapDiffResult<()> {
            to.process(kind, item(2, "b"))?;
            to.process(kind, item(3, "c"))?;
            to.complete()?;
            to.release()
        });
        old.join().unwrap().unwrap();
        new.join().unwrap().unwrap();

        assert_eq!(
            sink.changes(),
            vec![
                Change::delete(item(1, "a")),
                Change::modify(item(2, "b")),
                Change::create(item(3, "c")),
            ]
        );
        assert!(sink.is_completed());
        assert!(sink.is_released());
    }

    #[test]
    fn status_follows_recorded_kinds() {
        let catalog = KindCatalog::new(["first", "second"]).unwrap();
        let sink = MemoryChangeSink::new();
        let (mut from, mut to) = open_session::<Item, _>(catalog, sink.clone());

        assert_eq!(to.status().unwrap(), SourceStatus::NotStarted);

        // The old snapshot is complete and empty, so the new side never waits.
        from.complete().unwrap();
        to.process(Kind::new(1), item(4, "x")).unwrap();
        assert_eq!(to.status().unwrap(), SourceStatus::AtKind(Kind::new(1)));

        to.complete().unwrap();
        assert_eq!(to.status().unwrap(), SourceStatus::Complete);
        assert_eq!(from.status().unwrap(), SourceStatus::Complete);

        from.release().unwrap();
        to.release().unwrap();

        assert_eq!(sink.changes(), vec![Change::create(item(4, "x"))]);
    }
}
