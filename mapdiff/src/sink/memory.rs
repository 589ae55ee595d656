use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::MapDiffResult;
use crate::sink::{ChangeSink, EntitySink, Sink};
use crate::types::Change;

#[derive(Debug)]
struct Inner<T> {
    output: Vec<T>,
    completed: bool,
    released: bool,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            output: Vec::new(),
            completed: false,
            released: false,
        }
    }
}

/// Shared handle to recorded output.
///
/// Clones observe the same storage, so a test keeps one clone while the session owns another.
#[derive(Debug)]
struct Recorded<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Recorded<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Recorded<T> {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    // The recorded data stays consistent even if a holder panicked, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory [`ChangeSink`] for tests and small extracts.
///
/// ```
/// use mapdiff::sink::memory::MemoryChangeSink;
/// use mapdiff::types::MapEntity;
///
/// let sink = MemoryChangeSink::<MapEntity>::new();
/// // Hand a clone to a derive session, then inspect the original.
/// let for_session = sink.clone();
/// # drop(for_session);
/// assert!(sink.changes().is_empty());
/// ```
#[derive(Debug)]
pub struct MemoryChangeSink<E> {
    recorded: Recorded<Change<E>>,
}

impl<E> MemoryChangeSink<E> {
    pub fn new() -> Self {
        Self {
            recorded: Recorded::new(),
        }
    }

    /// Returns a copy of all changes received so far, in arrival order.
    pub fn changes(&self) -> Vec<Change<E>>
    where
        E: Clone,
    {
        self.recorded.lock().output.clone()
    }

    pub fn is_completed(&self) -> bool {
        self.recorded.lock().completed
    }

    pub fn is_released(&self) -> bool {
        self.recorded.lock().released
    }

    /// Drops all recorded changes and resets the lifecycle flags.
    pub fn clear(&self) {
        *self.recorded.lock() = Inner::new();
    }
}

impl<E> Clone for MemoryChangeSink<E> {
    fn clone(&self) -> Self {
        Self {
            recorded: self.recorded.clone(),
        }
    }
}

impl<E> Default for MemoryChangeSink<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send> Sink for MemoryChangeSink<E> {
    fn name() -> &'static str {
        "memory_changes"
    }

    fn complete(&mut self) -> MapDiffResult<()> {
        let mut inner = self.recorded.lock();
        info!("changeset complete with {} changes", inner.output.len());
        inner.completed = true;

        Ok(())
    }

    fn release(&mut self) -> MapDiffResult<()> {
        self.recorded.lock().released = true;

        Ok(())
    }
}

impl<E: Send + std::fmt::Debug> ChangeSink<E> for MemoryChangeSink<E> {
    fn process_change(&mut self, change: Change<E>) -> MapDiffResult<()> {
        debug!(action = %change.action, "  {:?}", change.entity);
        self.recorded.lock().output.push(change);

        Ok(())
    }
}

/// In-memory [`EntitySink`] collecting an updated snapshot.
#[derive(Debug)]
pub struct MemoryEntitySink<E> {
    recorded: Recorded<E>,
}

impl<E> MemoryEntitySink<E> {
    pub fn new() -> Self {
        Self {
            recorded: Recorded::new(),
        }
    }

    /// Returns a copy of all entities received so far, in arrival order.
    pub fn entities(&self) -> Vec<E>
    where
        E: Clone,
    {
        self.recorded.lock().output.clone()
    }

    pub fn is_completed(&self) -> bool {
        self.recorded.lock().completed
    }

    pub fn is_released(&self) -> bool {
        self.recorded.lock().released
    }

    pub fn clear(&self) {
        *self.recorded.lock() = Inner::new();
    }
}

impl<E> Clone for MemoryEntitySink<E> {
    fn clone(&self) -> Self {
        Self {
            recorded: self.recorded.clone(),
        }
    }
}

impl<E> Default for MemoryEntitySink<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send> Sink for MemoryEntitySink<E> {
    fn name() -> &'static str {
        "memory_entities"
    }

    fn complete(&mut self) -> MapDiffResult<()> {
        let mut inner = self.recorded.lock();
        info!("snapshot complete with {} entities", inner.output.len());
        inner.completed = true;

        Ok(())
    }

    fn release(&mut self) -> MapDiffResult<()> {
        self.recorded.lock().released = true;

        Ok(())
    }
}

impl<E: Send + std::fmt::Debug> EntitySink<E> for MemoryEntitySink<E> {
    fn process(&mut self, entity: E) -> MapDiffResult<()> {
        debug!("  {:?}", entity);
        self.recorded.lock().output.push(entity);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_recorded_output() {
        let sink = MemoryEntitySink::<i64>::new();
        let mut session_side = sink.clone();

        session_side.process(4).unwrap();
        session_side.complete().unwrap();
        session_side.release().unwrap();

        assert_eq!(sink.entities(), vec![4]);
        assert!(sink.is_completed());
        assert!(sink.is_released());

        sink.clear();
        assert!(sink.entities().is_empty());
        assert!(!sink.is_completed());
    }
}
