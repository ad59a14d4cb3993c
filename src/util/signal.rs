use std::sync::{Condvar, Mutex, PoisonError};

/// Binary semaphore used to park a thread until there is something to do.
///
/// Raising an already raised signal is a no-op; a wait consumes the signal.
/// A raise that happens before the wait is not lost.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    raised: Mutex<bool>,
    condvar: Condvar,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wakes the waiting thread, or the next one to wait
    pub(crate) fn raise(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        *raised = true;
        self.condvar.notify_one();
    }

    /// Blocks until the signal is raised and lowers it again
    pub(crate) fn wait(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        while !*raised {
            raised = self
                .condvar
                .wait(raised)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *raised = false;
    }
}
