use crate::error::MapDiffResult;
use crate::types::Change;

/// Lifecycle shared by every downstream consumer of a merge session.
///
/// A session calls into its sink from one thread at a time, always while holding the session
/// lock, so implementations need no synchronization of their own. Output calls arrive in
/// merge order. [`Sink::complete`] is called exactly once after both sources completed, and
/// never if the session was aborted. [`Sink::release`] is called exactly once after both
/// sources released, also for aborted sessions, so the sink can free its resources.
///
/// Any error returned by a sink aborts the session.
pub trait Sink: Send {
    /// Returns the name of the sink, used in logs.
    fn name() -> &'static str;

    /// Signals that all output of the session has been delivered.
    fn complete(&mut self) -> MapDiffResult<()>;

    /// Signals that the session is done with the sink.
    fn release(&mut self) -> MapDiffResult<()> {
        Ok(())
    }
}

/// Receives the changeset computed by a derive session.
pub trait ChangeSink<E>: Sink {
    fn process_change(&mut self, change: Change<E>) -> MapDiffResult<()>;
}

/// Receives the updated snapshot produced by an apply session.
pub trait EntitySink<E>: Sink {
    fn process(&mut self, entity: E) -> MapDiffResult<()>;
}
