use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::MapDiffResult;
use crate::sink::{ChangeSink, EntitySink, Sink};
use crate::types::{Change, ChangeAction, Entity};

/// A call a session made into its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCall {
    /// A change handed to a [`ChangeSink`].
    Change { action: ChangeAction, id: i64 },
    /// An entity handed to an [`EntitySink`].
    Entity { id: i64 },
    Complete,
    Release,
}

struct Inner<S> {
    wrapped_sink: S,
    calls: Vec<SinkCall>,
}

/// Test wrapper for [`Sink`] implementations that records every call in order.
///
/// Clones share the recorded calls and the wrapped sink, so a test keeps one clone and hands
/// another to the session.
pub struct TestSinkWrapper<S> {
    inner: Arc<Mutex<Inner<S>>>,
}

impl<S> Clone for TestSinkWrapper<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for TestSinkWrapper<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("TestSinkWrapper")
            .field("wrapped_sink", &inner.wrapped_sink)
            .field("calls", &inner.calls)
            .finish()
    }
}

impl<S> TestSinkWrapper<S> {
    pub fn wrap(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                wrapped_sink: sink,
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns all calls recorded so far, in order.
    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().calls.clone()
    }

    /// Returns the identifiers of all output calls, in order.
    pub fn output_ids(&self) -> Vec<i64> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SinkCall::Change { id, .. } | SinkCall::Entity { id } => Some(*id),
                SinkCall::Complete | SinkCall::Release => None,
            })
            .collect()
    }

    pub fn complete_calls(&self) -> usize {
        self.count(SinkCall::Complete)
    }

    pub fn release_calls(&self) -> usize {
        self.count(SinkCall::Release)
    }

    fn count(&self, call: SinkCall) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: SinkCall) -> MutexGuard<'_, Inner<S>> {
        let mut inner = self.lock();
        inner.calls.push(call);
        inner
    }
}

impl<S: Sink> Sink for TestSinkWrapper<S> {
    fn name() -> &'static str {
        S::name()
    }

    fn complete(&mut self) -> MapDiffResult<()> {
        self.record(SinkCall::Complete).wrapped_sink.complete()
    }

    fn release(&mut self) -> MapDiffResult<()> {
        self.record(SinkCall::Release).wrapped_sink.release()
    }
}

impl<E, S> ChangeSink<E> for TestSinkWrapper<S>
where
    E: Entity,
    S: ChangeSink<E>,
{
    fn process_change(&mut self, change: Change<E>) -> MapDiffResult<()> {
        let call = SinkCall::Change {
            action: change.action,
            id: change.entity.id(),
        };
        self.record(call).wrapped_sink.process_change(change)
    }
}

impl<E, S> EntitySink<E> for TestSinkWrapper<S>
where
    E: Entity,
    S: EntitySink<E>,
{
    fn process(&mut self, entity: E) -> MapDiffResult<()> {
        let call = SinkCall::Entity { id: entity.id() };
        self.record(call).wrapped_sink.process(entity)
    }
}
