//! Control loop and worker-thread dispatch.
//!
//! # Architecture
//!
//! ```text
//!   control thread                         worker pool
//!   ──────────────                         ───────────
//!   run_async(input, work, complete)
//!     │  TaskBaton{input}  ───────────────▶ baton.execute(work)
//!     │  (returns TaskId immediately)         │ blocking native call
//!     │                                       │
//!   run_until_idle()                          │
//!     │  ◀──────────────── TaskBaton{result} ─┘
//!     │  complete(result)   ← exactly once, on this thread
//!     ▼  baton + callback dropped
//! ```
//!
//! The control loop is a tokio current-thread runtime plus a `LocalSet`;
//! workers are the runtime's blocking pool. Completion closures may capture
//! `!Send` host state (registries, host functions) because they never leave
//! the control thread. Only the baton crosses threads.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::Notify;
use tokio::task::LocalSet;
use tracing::{debug, error, trace, warn};

use crate::baton::{TaskBaton, TaskId};
use crate::config::DispatcherConfig;
use crate::error::{HostException, Result};
use crate::status::Status;

/// Receives exceptions raised by completion callbacks.
pub type FatalErrorHandler = Rc<dyn Fn(&HostException)>;

/// Counters for dispatched calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Calls handed to the worker pool
    pub scheduled: u64,
    /// Calls whose callback has run
    pub completed: u64,
    /// Completed calls that reported a non-success status
    pub failed: u64,
    /// Callbacks that raised a host exception
    pub callback_exceptions: u64,
}

#[derive(Default)]
struct Counters {
    scheduled: Cell<u64>,
    completed: Cell<u64>,
    failed: Cell<u64>,
    callback_exceptions: Cell<u64>,
    in_flight: Cell<usize>,
}

impl Counters {
    fn bump(cell: &Cell<u64>) {
        cell.set(cell.get() + 1);
    }
}

/// The host's control thread event loop.
///
/// `ControlLoop` is `!Send`: it is created on, and stays on, the control
/// thread.
pub struct ControlLoop {
    local: LocalSet,
    // Taken only in `Drop`, to shut the worker pool down without waiting.
    runtime: Option<Runtime>,
    next_task: Cell<u64>,
    counters: Rc<Counters>,
    idle: Rc<Notify>,
    fatal: Rc<RefCell<FatalErrorHandler>>,
}

impl ControlLoop {
    /// Build the control loop and its worker pool.
    pub fn new(config: &DispatcherConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Builder::new_current_thread()
            .enable_time()
            .max_blocking_threads(config.max_worker_threads)
            .thread_name(config.worker_thread_name.clone())
            .thread_keep_alive(config.worker_keep_alive())
            .build()?;

        debug!(
            max_workers = config.max_worker_threads,
            thread_name = %config.worker_thread_name,
            "Control loop started"
        );

        let default_handler: FatalErrorHandler = Rc::new(|exception: &HostException| {
            error!("Uncaught exception in completion callback: {}", exception);
        });

        Ok(ControlLoop {
            local: LocalSet::new(),
            runtime: Some(runtime),
            next_task: Cell::new(1),
            counters: Rc::new(Counters::default()),
            idle: Rc::new(Notify::new()),
            fatal: Rc::new(RefCell::new(default_handler)),
        })
    }

    /// Replace the handler that receives exceptions raised by callbacks.
    pub fn set_fatal_error_handler(&self, handler: impl Fn(&HostException) + 'static) {
        *self.fatal.borrow_mut() = Rc::new(handler);
    }

    /// Schedule `work` on a worker thread and return immediately.
    ///
    /// `work` sees only `input`. Once it finishes, `complete` runs on the
    /// control thread, exactly once, the next time the loop is driven
    /// ([`ControlLoop::run_until_idle`]). An `Err` returned by `complete`, or
    /// a panic inside it, is routed to the fatal error handler.
    pub fn run_async<I, O, W, C>(&self, input: I, work: W, complete: C) -> TaskId
    where
        I: Send + 'static,
        O: Send + 'static,
        W: FnOnce(&I) -> std::result::Result<O, Status> + Send + 'static,
        C: FnOnce(std::result::Result<O, Status>) -> std::result::Result<(), HostException>
            + 'static,
    {
        let id = TaskId(self.next_task.get());
        self.next_task.set(id.0 + 1);

        let mut baton = TaskBaton::new(id, input);
        baton.mark_scheduled();

        let worker = self.runtime().spawn_blocking(move || {
            baton.execute(work);
            baton
        });

        Counters::bump(&self.counters.scheduled);
        self.counters
            .in_flight
            .set(self.counters.in_flight.get() + 1);
        trace!(task = %id, "Scheduled native call");

        let counters = Rc::clone(&self.counters);
        let idle = Rc::clone(&self.idle);
        let fatal = Rc::clone(&self.fatal);

        self.local.spawn_local(async move {
            let outcome = match worker.await {
                Ok(mut baton) => baton.complete(),
                Err(join_error) => {
                    error!(task = %id, "Worker task failed: {}", join_error);
                    Err(Status::WORKER_ABORTED)
                }
            };

            if outcome.is_err() {
                Counters::bump(&counters.failed);
            }

            let raised = match panic::catch_unwind(AssertUnwindSafe(|| complete(outcome))) {
                Ok(result) => result.err(),
                Err(_) => {
                    error!(task = %id, "Completion callback panicked");
                    Some(HostException::new("Completion callback panicked"))
                }
            };

            if let Some(exception) = raised {
                Counters::bump(&counters.callback_exceptions);
                let handler = Rc::clone(&*fatal.borrow());
                handler(&exception);
            }

            Counters::bump(&counters.completed);
            counters.in_flight.set(counters.in_flight.get() - 1);
            trace!(task = %id, "Disposed baton");
            idle.notify_one();
        });

        id
    }

    /// Drive the loop until every scheduled call has completed.
    ///
    /// Must not be called from inside a completion callback.
    pub fn run_until_idle(&self) {
        let counters = Rc::clone(&self.counters);
        let idle = Rc::clone(&self.idle);
        self.runtime().block_on(self.local.run_until(async move {
            while counters.in_flight.get() > 0 {
                idle.notified().await;
            }
        }));
    }

    /// Like [`ControlLoop::run_until_idle`], giving up after `timeout`.
    ///
    /// Returns `true` if the loop went idle in time.
    pub fn run_for(&self, timeout: Duration) -> bool {
        let counters = Rc::clone(&self.counters);
        let idle = Rc::clone(&self.idle);
        self.runtime().block_on(self.local.run_until(async move {
            let drain = async {
                while counters.in_flight.get() > 0 {
                    idle.notified().await;
                }
            };
            tokio::time::timeout(timeout, drain).await.is_ok()
        }))
    }

    fn runtime(&self) -> &Runtime {
        self.runtime
            .as_ref()
            .expect("runtime is only taken when the control loop drops")
    }

    /// Number of calls scheduled but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.get()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            scheduled: self.counters.scheduled.get(),
            completed: self.counters.completed.get(),
            failed: self.counters.failed.get(),
            callback_exceptions: self.counters.callback_exceptions.get(),
        }
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        let pending = self.counters.in_flight.get();
        if pending > 0 {
            warn!(pending, "Control loop dropped with calls in flight, their callbacks will not run");
        }
        // Workers still inside a native call are detached, not joined.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlLoop")
            .field("in_flight", &self.in_flight())
            .field("stats", &self.stats())
            .finish()
    }
}
