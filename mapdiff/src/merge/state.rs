use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use metrics::counter;
use tracing::{debug, error, info};

use crate::error::{ErrorKind, MapDiffError, MapDiffResult};
use crate::failpoints::{MERGE_BEFORE_SINK_CALL, MERGE_BEFORE_WAIT, mapdiff_fail_point};
use crate::merge::engine::{self, MergeOutcome, Progress, Role, Step};
use crate::metrics::{ERROR_KIND_LABEL, MAPDIFF_SESSIONS_ABORTED_TOTAL, OPERATION_LABEL};
use crate::sink::Sink;
use crate::types::{Entity, Kind, KindCatalog, Position, SourceStatus};
use crate::{bail, mapdiff_error};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// What a merge session computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Derive,
    Apply,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Derive => "derive",
            Operation::Apply => "apply",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per source bookkeeping.
#[derive(Debug)]
struct SourceCursor<E> {
    progress: Progress,
    /// Most recent element of each kind. Nothing older is kept.
    latest: Vec<Option<E>>,
    released: bool,
}

impl<E> SourceCursor<E> {
    fn new(kinds: usize) -> Self {
        Self {
            progress: Progress::NotStarted,
            latest: (0..kinds).map(|_| None).collect(),
            released: false,
        }
    }

    fn clear_latest(&mut self) {
        self.latest.iter_mut().for_each(|slot| *slot = None);
    }
}

/// Everything guarded by the session mutex.
#[derive(Debug)]
pub(crate) struct Inner<E, S> {
    sources: [SourceCursor<E>; 2],
    /// First error of the session. Once set, every further operation fails.
    poisoned: Option<MapDiffError>,
    /// Position at which the follower resolved a tie with the leader. Consumed by the leader,
    /// which may have been asleep while the follower matched it and moved on.
    matched: Option<Position>,
    completed: bool,
    released: bool,
    sink: S,
}

impl<E: Entity, S> Inner<E, S> {
    fn check_poisoned(&self) -> MapDiffResult<()> {
        match &self.poisoned {
            None => Ok(()),
            Some(cause) => Err(mapdiff_error!(
                ErrorKind::SessionAborted,
                "Merge session was aborted by its counterpart source",
                format!("aborted after {:?}: {}", cause.kind(), cause.description()),
                source: cause.clone()
            )),
        }
    }

    fn record(
        &mut self,
        role: Role,
        kind: Kind,
        entity: E,
        catalog: &KindCatalog,
    ) -> MapDiffResult<Position> {
        let position = Position::new(kind, entity.id());

        if !catalog.contains(kind) {
            bail!(
                ErrorKind::UnknownKind,
                "Entity kind is not part of the session ordering",
                format!(
                    "{role} source delivered {position}, {} kinds are configured",
                    catalog.len()
                )
            );
        }

        let cursor = &mut self.sources[role.index()];
        match cursor.progress {
            Progress::NotStarted => {}
            Progress::At(previous) => engine::validate_ordering(&previous, &position)?,
            Progress::Complete => bail!(
                ErrorKind::InvalidState,
                "Source delivered an entity after it completed",
                format!("{role} source delivered {position}")
            ),
        }

        cursor.latest[kind.index()] = Some(entity);
        cursor.progress = Progress::At(position);

        Ok(position)
    }

    /// Returns the latest element `role` delivered for `kind`.
    pub(crate) fn latest(&self, role: Role, kind: Kind) -> Option<&E> {
        self.sources[role.index()]
            .latest
            .get(kind.index())
            .and_then(Option::as_ref)
    }

    fn progress(&self, role: Role) -> Progress {
        self.sources[role.index()].progress
    }
}

/// State shared by the two sources of one merge session.
///
/// All fields live behind a single mutex. A source that is ahead of its counterpart waits on
/// the condition variable until the counterpart moves, completes, or the session is poisoned.
#[derive(Debug)]
pub(crate) struct MergeState<E, S> {
    id: u64,
    operation: Operation,
    catalog: KindCatalog,
    inner: Mutex<Inner<E, S>>,
    changed: Condvar,
}

impl<E, S> MergeState<E, S>
where
    E: Entity,
    S: Sink,
{
    pub(crate) fn new(operation: Operation, catalog: KindCatalog, sink: S) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let kinds = catalog.len();

        debug!(
            session_id = id,
            %operation,
            sink = S::name(),
            kinds,
            "opening merge session"
        );

        Self {
            id,
            operation,
            catalog,
            inner: Mutex::new(Inner {
                sources: [SourceCursor::new(kinds), SourceCursor::new(kinds)],
                poisoned: None,
                matched: None,
                completed: false,
                released: false,
                sink,
            }),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn catalog(&self) -> &KindCatalog {
        &self.catalog
    }

    fn lock(&self) -> MapDiffResult<MutexGuard<'_, Inner<E, S>>> {
        Ok(self.inner.lock()?)
    }

    pub(crate) fn status(&self, role: Role) -> MapDiffResult<SourceStatus> {
        Ok(self.lock()?.progress(role).status())
    }

    /// Records `entity` as the next element of `role` and merges it against the counterpart.
    ///
    /// Returns with the lock still held so the caller can act on the outcome before the
    /// counterpart observes any further change.
    pub(crate) fn advance(
        &self,
        role: Role,
        kind: Kind,
        entity: E,
    ) -> MapDiffResult<(MutexGuard<'_, Inner<E, S>>, MergeOutcome)> {
        let mut inner = self.lock()?;
        inner.check_poisoned()?;

        let position = match inner.record(role, kind, entity, &self.catalog) {
            Ok(position) => position,
            Err(err) => return Err(self.poison(&mut inner, err)),
        };

        self.merge(inner, role, position)
    }

    /// Loops until the counterpart's progress decides whether it holds `position` too.
    fn merge<'a>(
        &'a self,
        mut inner: MutexGuard<'a, Inner<E, S>>,
        role: Role,
        position: Position,
    ) -> MapDiffResult<(MutexGuard<'a, Inner<E, S>>, MergeOutcome)> {
        let mut same_element = false;

        loop {
            inner.check_poisoned()?;

            if role == Role::Leader && inner.matched == Some(position) {
                same_element = true;
            }

            let other = inner.progress(role.counterpart());
            match engine::step(position, other, role, same_element) {
                Step::Resolved(outcome) => {
                    match role {
                        Role::Follower if outcome == MergeOutcome::SameElement => {
                            inner.matched = Some(position);
                        }
                        Role::Leader if inner.matched == Some(position) => {
                            inner.matched = None;
                        }
                        _ => {}
                    }

                    return Ok((inner, outcome));
                }
                Step::Wait {
                    same_element: seen,
                } => {
                    same_element = seen;

                    if let Err(err) = mapdiff_fail_point(MERGE_BEFORE_WAIT) {
                        return Err(self.poison(&mut inner, err));
                    }

                    self.changed.notify_all();
                    inner = match self.changed.wait(inner) {
                        Ok(inner) => inner,
                        Err(poisoned) => {
                            let mut inner = poisoned.into_inner();
                            let err = mapdiff_error!(
                                ErrorKind::InterruptedWait,
                                "Waiting for the counterpart source was interrupted",
                                format!("{role} source waiting at {position}")
                            );
                            return Err(self.poison(&mut inner, err));
                        }
                    };
                }
            }
        }
    }

    /// Takes the latest element of `role` for `kind` out of the shared state.
    pub(crate) fn take_latest(
        &self,
        inner: &mut Inner<E, S>,
        role: Role,
        kind: Kind,
    ) -> MapDiffResult<E> {
        let slot = inner.sources[role.index()]
            .latest
            .get_mut(kind.index())
            .and_then(Option::take);

        match slot {
            Some(entity) => Ok(entity),
            None => {
                let err = mapdiff_error!(
                    ErrorKind::InvalidState,
                    "No element recorded for the source",
                    format!("{role} source has no element of {kind}")
                );
                Err(self.poison(inner, err))
            }
        }
    }

    /// Hands output to the sink, poisoning the session if the sink fails.
    pub(crate) fn deliver<F>(&self, inner: &mut Inner<E, S>, f: F) -> MapDiffResult<()>
    where
        F: FnOnce(&mut S) -> MapDiffResult<()>,
    {
        let result = mapdiff_fail_point(MERGE_BEFORE_SINK_CALL).and_then(|()| f(&mut inner.sink));

        result.map_err(|err| self.poison(inner, err))
    }

    /// Aborts the session with `err` on behalf of the caller.
    pub(crate) fn fail(&self, inner: &mut Inner<E, S>, err: MapDiffError) -> MapDiffError {
        self.poison(inner, err)
    }

    /// Marks `role` complete, and completes the sink once both sources are.
    pub(crate) fn complete(&self, role: Role) -> MapDiffResult<()> {
        let mut inner = self.lock()?;
        inner.check_poisoned()?;

        let cursor = &mut inner.sources[role.index()];
        if cursor.progress == Progress::Complete {
            return Ok(());
        }
        cursor.progress = Progress::Complete;
        cursor.clear_latest();

        debug!(session_id = self.id, %role, "source complete");
        self.changed.notify_all();

        if inner.progress(role.counterpart()) == Progress::Complete && !inner.completed {
            inner.completed = true;

            info!(
                session_id = self.id,
                operation = %self.operation,
                "both sources complete, completing sink {}",
                S::name()
            );
            if let Err(err) = inner.sink.complete() {
                return Err(self.poison(&mut inner, err));
            }
        }

        Ok(())
    }

    /// Marks `role` released, and releases the sink once both sources are.
    ///
    /// Releasing an incomplete source of a healthy session is an error and aborts the session.
    /// On an aborted session every release is accepted.
    pub(crate) fn release(&self, role: Role) -> MapDiffResult<()> {
        let mut inner = self.lock()?;

        let cursor = &mut inner.sources[role.index()];
        if cursor.released {
            return Ok(());
        }
        cursor.released = true;
        cursor.clear_latest();
        let progress = cursor.progress;

        debug!(session_id = self.id, %role, "source released");

        let mut result = Ok(());
        if inner.poisoned.is_none() && progress != Progress::Complete {
            let err = mapdiff_error!(
                ErrorKind::PrematureRelease,
                "Source released before it completed",
                format!("{role} source released at {:?}", progress.status())
            );
            result = Err(self.poison(&mut inner, err));
        }

        if inner.sources[role.counterpart().index()].released && !inner.released {
            inner.released = true;

            info!(
                session_id = self.id,
                operation = %self.operation,
                "both sources released, releasing sink {}",
                S::name()
            );
            if let Err(err) = inner.sink.release() {
                let err = self.poison(&mut inner, err);
                result = result.and(Err(err));
            }
        }

        result
    }

    /// Wakes a waiting counterpart without touching the guarded state.
    ///
    /// Used when the lock itself is poisoned, so that the waiter observes the poisoning instead
    /// of sleeping forever.
    pub(crate) fn wake_all(&self) {
        self.changed.notify_all();
    }

    /// Stores the first error of the session and wakes a waiting counterpart.
    fn poison(&self, inner: &mut Inner<E, S>, err: MapDiffError) -> MapDiffError {
        if inner.poisoned.is_none() {
            error!(
                session_id = self.id,
                operation = %self.operation,
                error_kind = ?err.kind(),
                "merge session aborted: {}",
                err.description()
            );
            counter!(
                MAPDIFF_SESSIONS_ABORTED_TOTAL,
                OPERATION_LABEL => self.operation.as_str(),
                ERROR_KIND_LABEL => format!("{:?}", err.kind())
            )
            .increment(1);

            inner.poisoned = Some(err.clone());
        }

        self.changed.notify_all();

        err
    }
}
