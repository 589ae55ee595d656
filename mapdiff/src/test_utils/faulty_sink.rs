use crate::bail;
use crate::error::{ErrorKind, MapDiffResult};
use crate::sink::{ChangeSink, EntitySink, Sink};
use crate::types::Change;

/// Sink wrapper that fails at a chosen point with [`ErrorKind::SinkError`].
#[derive(Debug, Clone)]
pub struct FaultySink<S> {
    wrapped_sink: S,
    fail_on_output: Option<usize>,
    fail_on_complete: bool,
    fail_on_release: bool,
    outputs: usize,
}

impl<S> FaultySink<S> {
    pub fn wrap(sink: S) -> Self {
        Self {
            wrapped_sink: sink,
            fail_on_output: None,
            fail_on_complete: false,
            fail_on_release: false,
            outputs: 0,
        }
    }

    /// Fails the `n`-th output call, counting from one. Earlier calls are forwarded.
    pub fn fail_on_output(mut self, n: usize) -> Self {
        self.fail_on_output = Some(n);
        self
    }

    pub fn fail_on_complete(mut self) -> Self {
        self.fail_on_complete = true;
        self
    }

    pub fn fail_on_release(mut self) -> Self {
        self.fail_on_release = true;
        self
    }

    fn check_output(&mut self) -> MapDiffResult<()> {
        self.outputs += 1;

        if self.fail_on_output == Some(self.outputs) {
            bail!(
                ErrorKind::SinkError,
                "Sink failed to write output",
                format!("injected failure on output call {}", self.outputs)
            );
        }

        Ok(())
    }
}

impl<S: Sink> Sink for FaultySink<S> {
    fn name() -> &'static str {
        "faulty"
    }

    fn complete(&mut self) -> MapDiffResult<()> {
        if self.fail_on_complete {
            bail!(ErrorKind::SinkError, "Sink failed to complete");
        }

        self.wrapped_sink.complete()
    }

    fn release(&mut self) -> MapDiffResult<()> {
        // The wrapped sink is released regardless, so tests can observe that release happened.
        self.wrapped_sink.release()?;

        if self.fail_on_release {
            bail!(ErrorKind::SinkError, "Sink failed to release");
        }

        Ok(())
    }
}

impl<E, S: ChangeSink<E>> ChangeSink<E> for FaultySink<S> {
    fn process_change(&mut self, change: Change<E>) -> MapDiffResult<()> {
        self.check_output()?;
        self.wrapped_sink.process_change(change)
    }
}

impl<E, S: EntitySink<E>> EntitySink<E> for FaultySink<S> {
    fn process(&mut self, entity: E) -> MapDiffResult<()> {
        self.check_output()?;
        self.wrapped_sink.process(entity)
    }
}
