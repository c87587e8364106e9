//! Named background threads with a bounded join.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Finished,
    /// The thread was still running when the grace period ran out.  It is
    /// left detached and dies with the process.
    TimedOut,
}

/// Handle to a spawned input loop.
#[derive(Debug)]
pub struct Worker {
    name:   String,
    handle: Option<JoinHandle<()>>,
    /// Disconnects when the thread's closure returns or unwinds.
    done:   Receiver<()>,
}

impl Worker {
    pub fn spawn<F>(name: &str, body: F) -> io::Result<Worker>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _done = done_tx;
                body();
            })?;
        Ok(Worker {
            name: name.to_string(),
            handle: Some(handle),
            done: done_rx,
        })
    }

    pub fn name(&self) -> &str { &self.name }

    /// Wait at most `grace` for the thread to end.
    pub fn join_timeout(mut self, grace: Duration) -> JoinOutcome {
        match self.done.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        warn!(worker = %self.name, "worker panicked");
                    }
                }
                JoinOutcome::Finished
            }
            Err(RecvTimeoutError::Timeout) => JoinOutcome::TimedOut,
        }
    }
}
