use std::sync::Arc;

use tracing::warn;

use crate::error::MapDiffResult;
use crate::merge::engine::Role;
use crate::merge::state::MergeState;
use crate::sink::Sink;
use crate::types::{Entity, SourceStatus};

/// One source's handle on a merge session, shared by all role adapters.
///
/// Releases the source when dropped, so a producer that bails out early or unwinds never
/// leaves its counterpart waiting.
#[derive(Debug)]
pub(crate) struct SourceHandle<E, S>
where
    E: Entity,
    S: Sink,
{
    pub(crate) state: Arc<MergeState<E, S>>,
    pub(crate) role: Role,
    released: bool,
}

impl<E, S> SourceHandle<E, S>
where
    E: Entity,
    S: Sink,
{
    /// Creates the leader and follower handles of a new session.
    pub(crate) fn pair(state: MergeState<E, S>) -> (Self, Self) {
        let state = Arc::new(state);

        let leader = Self {
            state: Arc::clone(&state),
            role: Role::Leader,
            released: false,
        };
        let follower = Self {
            state,
            role: Role::Follower,
            released: false,
        };

        (leader, follower)
    }

    pub(crate) fn session_id(&self) -> u64 {
        self.state.id()
    }

    pub(crate) fn status(&self) -> MapDiffResult<SourceStatus> {
        self.state.status(self.role)
    }

    pub(crate) fn complete(&self) -> MapDiffResult<()> {
        self.state.complete(self.role)
    }

    pub(crate) fn release(&mut self) -> MapDiffResult<()> {
        self.released = true;
        self.state.release(self.role)
    }
}

impl<E, S> Drop for SourceHandle<E, S>
where
    E: Entity,
    S: Sink,
{
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(err) = self.release() {
            self.state.wake_all();
            warn!(
                session_id = self.state.id(),
                role = %self.role,
                "releasing dropped source failed: {}",
                err.description()
            );
        }
    }
}
