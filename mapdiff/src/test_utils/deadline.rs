use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Deadline used by tests that drive a whole session.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Runs `f` on its own thread and returns its result, panicking if it does not finish within
/// `deadline`.
///
/// A deadlocked session can not be cancelled, so on timeout the thread is leaked and the test
/// fails instead of hanging.
pub fn run_with_deadline<T, F>(deadline: Duration, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        // The receiver is gone only after a timeout, in which case the result is unwanted.
        let _ = tx.send(f());
    });

    match rx.recv_timeout(deadline) {
        Ok(result) => {
            let _ = handle.join();
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("merge session did not finish within {deadline:?}")
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match handle.join() {
            Err(payload) => std::panic::resume_unwind(payload),
            Ok(()) => panic!("deadline thread exited without a result"),
        },
    }
}
