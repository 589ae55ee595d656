//! Drivers running a whole merge session over two sorted iterators.
//!
//! Each driver owns the two producer threads of its session: one per input, scoped to the call.
//! Inputs must be sorted by [`crate::types::Position`]; an unsorted input aborts the session.

use std::any::Any;
use std::thread;

use tracing::{Span, info, info_span};

use crate::apply::{self, BaseSource, ChangeSource};
use crate::derive::{self, FromSource, ToSource};
use crate::error::{ErrorKind, MapDiffError, MapDiffResult};
use crate::mapdiff_error;
use crate::merge::Operation;
use crate::sink::{ChangeSink, EntitySink};
use crate::types::{Change, Entity, Kind, KindCatalog};

/// Computes the changeset turning `from` into `to` and writes it into `sink`.
///
/// Returns once both inputs are exhausted and the sink was completed and released, or with the
/// error that aborted the session.
pub fn derive_changes<E, S, F, T>(catalog: KindCatalog, from: F, to: T, sink: S) -> MapDiffResult<()>
where
    E: Entity,
    S: ChangeSink<E>,
    F: IntoIterator<Item = (Kind, E)>,
    F::IntoIter: Send,
    T: IntoIterator<Item = (Kind, E)>,
    T::IntoIter: Send,
{
    let (from_source, to_source) = derive::open_session(catalog, sink);
    let span = session_span(from_source.session_id(), Operation::Derive);
    let (from, to) = (from.into_iter(), to.into_iter());

    let (from_result, to_result) = thread::scope(|scope| {
        let from_span = span.clone();
        let from_thread = scope.spawn(move || {
            let _entered = from_span.entered();
            feed_from(from_source, from)
        });

        let to_span = span.clone();
        let to_thread = scope.spawn(move || {
            let _entered = to_span.entered();
            feed_to(to_source, to)
        });

        (join_producer(from_thread), join_producer(to_thread))
    });

    finish(&span, from_result, to_result)
}

/// Applies the sorted changeset `changes` onto `base` and writes the result into `sink`.
///
/// Returns once both inputs are exhausted and the sink was completed and released, or with the
/// error that aborted the session.
pub fn apply_changes<E, S, B, C>(
    catalog: KindCatalog,
    base: B,
    changes: C,
    sink: S,
) -> MapDiffResult<()>
where
    E: Entity,
    S: EntitySink<E>,
    B: IntoIterator<Item = (Kind, E)>,
    B::IntoIter: Send,
    C: IntoIterator<Item = (Kind, Change<E>)>,
    C::IntoIter: Send,
{
    let (base_source, change_source) = apply::open_session(catalog, sink);
    let span = session_span(base_source.session_id(), Operation::Apply);
    let (base, changes) = (base.into_iter(), changes.into_iter());

    let (base_result, change_result) = thread::scope(|scope| {
        let base_span = span.clone();
        let base_thread = scope.spawn(move || {
            let _entered = base_span.entered();
            feed_base(base_source, base)
        });

        let change_span = span.clone();
        let change_thread = scope.spawn(move || {
            let _entered = change_span.entered();
            feed_changes(change_source, changes)
        });

        (join_producer(base_thread), join_producer(change_thread))
    });

    finish(&span, base_result, change_result)
}

fn session_span(session_id: u64, operation: Operation) -> Span {
    info_span!("merge_session", session_id, operation = %operation)
}

// On error the adapter is dropped, which releases it and lets the counterpart unwind.

fn feed_from<E, S, I>(mut source: FromSource<E, S>, entities: I) -> MapDiffResult<()>
where
    E: Entity,
    S: ChangeSink<E>,
    I: Iterator<Item = (Kind, E)>,
{
    for (kind, entity) in entities {
        source.process(kind, entity)?;
    }

    source.complete()?;
    source.release()
}

fn feed_to<E, S, I>(mut source: ToSource<E, S>, entities: I) -> MapDiffResult<()>
where
    E: Entity,
    S: ChangeSink<E>,
    I: Iterator<Item = (Kind, E)>,
{
    for (kind, entity) in entities {
        source.process(kind, entity)?;
    }

    source.complete()?;
    source.release()
}

fn feed_base<E, S, I>(mut source: BaseSource<E, S>, entities: I) -> MapDiffResult<()>
where
    E: Entity,
    S: EntitySink<E>,
    I: Iterator<Item = (Kind, E)>,
{
    for (kind, entity) in entities {
        source.process(kind, entity)?;
    }

    source.complete()?;
    source.release()
}

fn feed_changes<E, S, I>(mut source: ChangeSource<E, S>, changes: I) -> MapDiffResult<()>
where
    E: Entity,
    S: EntitySink<E>,
    I: Iterator<Item = (Kind, Change<E>)>,
{
    for (kind, change) in changes {
        source.process(kind, change.entity, change.action)?;
    }

    source.complete()?;
    source.release()
}

fn join_producer(handle: thread::ScopedJoinHandle<'_, MapDiffResult<()>>) -> MapDiffResult<()> {
    handle.join().unwrap_or_else(|payload| {
        Err(mapdiff_error!(
            ErrorKind::ProducerPanic,
            "Producer thread panicked",
            panic_message(payload.as_ref())
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic payload is not a string".to_string()
    }
}

/// Picks the error to report for a session.
///
/// When one side aborted because of the other, only the root cause is returned.
fn settle(leader: MapDiffResult<()>, follower: MapDiffResult<()>) -> MapDiffResult<()> {
    match (leader, follower) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
        (Err(leader), Err(follower)) => {
            let leader_aborted = leader.kind() == ErrorKind::SessionAborted;
            let follower_aborted = follower.kind() == ErrorKind::SessionAborted;

            match (leader_aborted, follower_aborted) {
                (true, false) => Err(follower),
                (false, true) => Err(leader),
                _ => Err(MapDiffError::from(vec![leader, follower])),
            }
        }
    }
}

fn finish(
    span: &Span,
    leader: MapDiffResult<()>,
    follower: MapDiffResult<()>,
) -> MapDiffResult<()> {
    let result = settle(leader, follower);

    if result.is_ok() {
        span.in_scope(|| info!("merge session finished"));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_wins_over_abort() {
        let cause = mapdiff_error!(ErrorKind::OrderingViolation, "Out of order");
        let aborted = mapdiff_error!(ErrorKind::SessionAborted, "Aborted");

        let err = settle(Err(aborted.clone()), Err(cause.clone())).unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::OrderingViolation]);

        let err = settle(Err(cause), Err(aborted)).unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::OrderingViolation]);
    }

    #[test]
    fn independent_failures_are_aggregated() {
        let first = mapdiff_error!(ErrorKind::SinkError, "Sink failed");
        let second = mapdiff_error!(ErrorKind::ProducerPanic, "Producer thread panicked");

        let err = settle(Err(first), Err(second)).unwrap_err();

        assert_eq!(
            err.kinds(),
            vec![ErrorKind::SinkError, ErrorKind::ProducerPanic]
        );
    }

    #[test]
    fn panics_are_reported_with_their_message() {
        let result = thread::scope(|scope| {
            let handle = scope.spawn(|| -> MapDiffResult<()> { panic!("reader crashed") });
            join_producer(handle)
        });

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProducerPanic);
        assert_eq!(err.detail(), Some("reader crashed"));
    }
}
