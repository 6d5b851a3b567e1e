//! The single-threaded executor everything asynchronous runs on.

use std::fmt::Debug;
use std::future::Future;
use std::rc::Rc;

use async_executor::LocalExecutor;

/// A cloneable handle to a thread-local executor.
///
/// Resource loads, deferred container work and queue steps are spawned here. Nothing runs until
/// the host ticks the runtime, so the synchronous part of every layer manager operation always
/// finishes before any of the continuations it scheduled.
#[derive(Clone)]
pub struct LocalRuntime {
    /// Shared by every clone.
    executor: Rc<LocalExecutor<'static>>,
}

impl LocalRuntime {
    /// Creates a runtime with no tasks.
    pub fn new() -> Self {
        Self {
            executor: Rc::new(LocalExecutor::new()),
        }
    }

    /// Spawns a detached task.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.executor.spawn(future).detach();
    }

    /// Runs one scheduled task, returning whether there was one.
    pub fn tick(&self) -> bool {
        self.executor.try_tick()
    }

    /// Runs scheduled tasks until none of them can make progress.
    ///
    /// Returns the number of task polls.
    pub fn run_until_stalled(&self) -> usize {
        let mut polls = 0;
        while self.executor.try_tick() {
            polls += 1;
        }
        polls
    }

    /// Blocks the thread on a future while running spawned tasks.
    pub fn block_on<T>(&self, future: impl Future<Output = T>) -> T {
        futures_lite::future::block_on(self.executor.run(future))
    }
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for LocalRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRuntime").finish_non_exhaustive()
    }
}
