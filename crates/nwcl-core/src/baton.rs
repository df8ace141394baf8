//! Per-call state for asynchronous native calls.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::status::Status;

/// Identifier of one scheduled asynchronous call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle of a [`TaskBaton`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatonState {
    /// Input bound, callback captured.
    Created,
    /// Handed to the worker pool.
    Scheduled,
    /// Native call executing on a worker thread.
    Running,
    /// Back on the control thread, result taken.
    Completed,
}

/// Input and result slot of one asynchronous native call.
///
/// The baton travels to a worker thread and back, so it only carries `Send`
/// data. The completion callback is owned by the control thread for exactly
/// as long as the baton is in flight (see [`crate::ControlLoop::run_async`]).
pub struct TaskBaton<I, O> {
    id: TaskId,
    input: I,
    result: Option<Result<O, Status>>,
    state: BatonState,
}

impl<I, O> TaskBaton<I, O> {
    pub fn new(id: TaskId, input: I) -> Self {
        TaskBaton {
            id,
            input,
            result: None,
            state: BatonState::Created,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> BatonState {
        self.state
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    /// True once the worker has stored a result.
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    pub(crate) fn mark_scheduled(&mut self) {
        debug_assert_eq!(self.state, BatonState::Created);
        self.state = BatonState::Scheduled;
    }

    /// Run the blocking native call against the baton input and store its
    /// outcome. Called on a worker thread.
    ///
    /// A panic in `work` is contained here and stored as
    /// [`Status::WORKER_ABORTED`].
    pub fn execute<W>(&mut self, work: W)
    where
        W: FnOnce(&I) -> Result<O, Status>,
    {
        self.state = BatonState::Running;
        let input = &self.input;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(input)));

        self.result = Some(match outcome {
            Ok(result) => result,
            Err(_) => {
                error!(task = %self.id, "Native call panicked on worker thread");
                Err(Status::WORKER_ABORTED)
            }
        });
    }

    /// Take the stored outcome. Called on the control thread.
    pub(crate) fn complete(&mut self) -> Result<O, Status> {
        self.state = BatonState::Completed;
        self.result.take().unwrap_or(Err(Status::WORKER_ABORTED))
    }
}

impl<I, O> fmt::Debug for TaskBaton<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBaton")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("has_result", &self.result.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut baton: TaskBaton<u32, u32> = TaskBaton::new(TaskId(1), 20);
        assert_eq!(baton.state(), BatonState::Created);

        baton.mark_scheduled();
        assert_eq!(baton.state(), BatonState::Scheduled);

        baton.execute(|x| Ok(x + 1));
        assert_eq!(baton.state(), BatonState::Running);
        assert!(baton.has_result());

        assert_eq!(baton.complete(), Ok(21));
        assert_eq!(baton.state(), BatonState::Completed);
        assert!(!baton.has_result());
    }

    #[test]
    fn test_error_status_stored() {
        let mut baton: TaskBaton<(), Vec<u8>> = TaskBaton::new(TaskId(2), ());
        baton.execute(|_| Err(Status::OUT_OF_HOST_MEMORY));
        assert_eq!(baton.complete(), Err(Status::OUT_OF_HOST_MEMORY));
    }

    #[test]
    fn test_panic_becomes_status() {
        let mut baton: TaskBaton<(), u8> = TaskBaton::new(TaskId(3), ());
        baton.execute(|_| panic!("driver exploded"));
        assert_eq!(baton.complete(), Err(Status::WORKER_ABORTED));
    }

    #[test]
    fn test_complete_without_execute() {
        let mut baton: TaskBaton<(), u8> = TaskBaton::new(TaskId(4), ());
        assert_eq!(baton.complete(), Err(Status::WORKER_ABORTED));
    }
}
