//! An ordered pipeline of asynchronous steps.
//!
//! Every step receives a [`Next`] continuation, the queue's shared parameters and the value the
//! previous step advanced with. A step finishes by calling [`Next::advance`], possibly much later
//! and from a spawned task. A step that never advances stalls the queue; there is no timeout.
//!
//! ```
//! use stratum_gui::AsyncTaskQueue;
//!
//! let queue: AsyncTaskQueue<u32> = AsyncTaskQueue::new(());
//! queue.push(|next, _, value| next.advance(value + 1));
//! queue.push(|next, _, value| next.advance(value * 10));
//! queue.on_complete(|value| assert_eq!(value, 20));
//! queue.play(1);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::future::Future;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::StepError;
use crate::runtime::LocalRuntime;

/// A pushed step.
type Step<T, P> = Box<dyn FnOnce(Next<T>, Rc<P>, T)>;

/// Identifies a pushed step until it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Receives the outcome of a step.
trait Advance<T> {
    /// A step finished with `value`.
    fn advance(self: Rc<Self>, cursor: u64, value: T);
    /// A step failed.
    fn fail(self: Rc<Self>, cursor: u64, error: StepError);
}

/// Continuation handed to every step.
///
/// Consuming it either way ends the step. Dropping it without calling either stalls the queue.
pub struct Next<T> {
    /// The queue or join the step reports to.
    core: Rc<dyn Advance<T>>,
    /// Cursor the step was started with, or its index inside a join.
    cursor: u64,
}

impl<T> Next<T> {
    /// Finishes the step, handing `value` to the next one.
    pub fn advance(self, value: T) {
        let Next { core, cursor } = self;
        core.advance(cursor, value);
    }

    /// Finishes the step with a failure. The remaining steps are skipped and the failure hook
    /// fires instead of the completion hook.
    pub fn fail(self, error: impl Into<StepError>) {
        let Next { core, cursor } = self;
        core.fail(cursor, error.into());
    }
}

impl<T> Debug for Next<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("cursor", &self.cursor).finish()
    }
}

/// Mutable part of a queue.
struct QueueState<T, P> {
    /// Steps that have not started.
    tasks: VecDeque<(TaskId, Step<T, P>)>,
    /// Last handed out [`TaskId`].
    next_id: u64,
    /// Played and neither completed nor failed.
    running: bool,
    /// Set while the dispatch loop is on the stack, so that synchronous advances do not recurse.
    dispatching: bool,
    /// Value waiting to be handed to the next step.
    pending: Option<T>,
    /// Bumped on every advance; a continuation only counts if it carries the current value.
    cursor: u64,
    /// One-based index of the running step, for logs.
    position: usize,
    /// Completion hook.
    complete: Option<Box<dyn FnOnce(T)>>,
    /// Failure hook.
    failure: Option<Box<dyn FnOnce(StepError)>>,
}

/// Shared by every handle of a queue and every [`Next`] it hands out.
struct QueueCore<T, P> {
    /// Parameters handed to every step.
    params: Rc<P>,
    /// Steps, hooks and progress.
    state: RefCell<QueueState<T, P>>,
}

impl<T: 'static, P: 'static> QueueCore<T, P> {
    /// Starts pending steps until one does not advance synchronously.
    fn dispatch(self: &Rc<Self>) {
        {
            let mut state = self.state.borrow_mut();
            if state.dispatching {
                return;
            }
            state.dispatching = true;
        }

        loop {
            let (step, value, cursor, position) = {
                let mut state = self.state.borrow_mut();
                let Some(value) = state.pending.take() else {
                    state.dispatching = false;
                    return;
                };

                match state.tasks.pop_front() {
                    Some((_, step)) => {
                        state.position += 1;
                        (step, value, state.cursor, state.position)
                    }
                    None => {
                        state.running = false;
                        state.dispatching = false;
                        let complete = state.complete.take();
                        drop(state);

                        debug!("Task queue complete");
                        if let Some(complete) = complete {
                            complete(value);
                        }
                        return;
                    }
                }
            };

            debug!("Task queue step {position} started");
            let next = Next {
                core: self.clone() as Rc<dyn Advance<T>>,
                cursor,
            };
            step(next, self.params.clone(), value);
        }
    }
}

impl<T: 'static, P: 'static> Advance<T> for QueueCore<T, P> {
    fn advance(self: Rc<Self>, cursor: u64, value: T) {
        {
            let mut state = self.state.borrow_mut();
            if !state.running || state.cursor != cursor {
                warn!("Ignoring a continuation of a step that already finished");
                return;
            }
            state.cursor += 1;
            state.pending = Some(value);
        }
        self.dispatch();
    }

    fn fail(self: Rc<Self>, cursor: u64, error: StepError) {
        let failure = {
            let mut state = self.state.borrow_mut();
            if !state.running || state.cursor != cursor {
                warn!("Ignoring a failure of a step that already finished: {error}");
                return;
            }
            state.cursor += 1;
            state.running = false;
            state.tasks.clear();
            state.complete = None;
            state.failure.take()
        };

        warn!("Task queue failed: {error}");
        if let Some(failure) = failure {
            failure(error);
        }
    }
}

/// Joins the sub-steps of one [`AsyncTaskQueue::push_multi`] position.
struct MultiJoin<T> {
    /// Continuation of the whole position, taken once.
    next: RefCell<Option<Next<T>>>,
    /// Which sub-steps have advanced.
    finished: RefCell<Vec<bool>>,
    /// Sub-steps still running.
    remaining: Cell<usize>,
    /// Value of the sub-step that advanced last.
    last: RefCell<Option<T>>,
}

impl<T: 'static> Advance<T> for MultiJoin<T> {
    fn advance(self: Rc<Self>, cursor: u64, value: T) {
        {
            let mut finished = self.finished.borrow_mut();
            match finished.get_mut(cursor as usize) {
                Some(done) if !*done => *done = true,
                _ => return,
            }
        }
        *self.last.borrow_mut() = Some(value);
        self.remaining.set(self.remaining.get().saturating_sub(1));
        if self.remaining.get() > 0 {
            return;
        }

        let next = self.next.borrow_mut().take();
        let last = self.last.borrow_mut().take();
        if let (Some(next), Some(last)) = (next, last) {
            next.advance(last);
        }
    }

    fn fail(self: Rc<Self>, _cursor: u64, error: StepError) {
        let next = self.next.borrow_mut().take();
        if let Some(next) = next {
            next.fail(error);
        }
    }
}

/// Runs pushed steps one after the other, each fed with the value the previous one advanced with.
///
/// `T` is the value passed between steps and `P` the parameters every step shares. The queue is
/// a cheap handle; clones refer to the same queue.
pub struct AsyncTaskQueue<T = (), P = ()> {
    /// Shared state.
    core: Rc<QueueCore<T, P>>,
}

impl<T: 'static, P: 'static> AsyncTaskQueue<T, P> {
    /// Creates an empty queue whose steps share `params`.
    pub fn new(params: P) -> Self {
        Self {
            core: Rc::new(QueueCore {
                params: Rc::new(params),
                state: RefCell::new(QueueState {
                    tasks: VecDeque::new(),
                    next_id: 0,
                    running: false,
                    dispatching: false,
                    pending: None,
                    cursor: 0,
                    position: 0,
                    complete: None,
                    failure: None,
                }),
            }),
        }
    }

    /// The parameters shared by every step.
    pub fn params(&self) -> &Rc<P> {
        &self.core.params
    }

    /// Appends a step.
    pub fn push(&self, step: impl FnOnce(Next<T>, Rc<P>, T) + 'static) -> TaskId {
        let mut state = self.core.state.borrow_mut();
        state.next_id += 1;
        let id = TaskId(state.next_id);
        state.tasks.push_back((id, Box::new(step)));
        id
    }

    /// Appends several steps that run side by side as one position of the queue.
    ///
    /// Each sub-step gets a clone of the input value. The queue advances once every sub-step has
    /// advanced, with the value of the one that advanced last. The first failing sub-step fails
    /// the queue.
    pub fn push_multi<F>(&self, steps: impl IntoIterator<Item = F>) -> TaskId
    where
        T: Clone,
        F: FnOnce(Next<T>, Rc<P>, T) + 'static,
    {
        let steps: Vec<F> = steps.into_iter().collect();

        self.push(move |next, params, value| {
            if steps.is_empty() {
                next.advance(value);
                return;
            }

            let join = Rc::new(MultiJoin {
                next: RefCell::new(Some(next)),
                finished: RefCell::new(vec![false; steps.len()]),
                remaining: Cell::new(steps.len()),
                last: RefCell::new(None),
            });
            for (index, step) in steps.into_iter().enumerate() {
                let next = Next {
                    core: join.clone() as Rc<dyn Advance<T>>,
                    cursor: index as u64,
                };
                step(next, params.clone(), value.clone());
            }
        })
    }

    /// Appends a step that runs a future on `runtime`.
    ///
    /// The queue advances with the future's value, or fails with its error.
    pub fn push_async<F, Fut>(&self, runtime: &LocalRuntime, step: F) -> TaskId
    where
        F: FnOnce(Rc<P>, T) -> Fut + 'static,
        Fut: Future<Output = Result<T, StepError>> + 'static,
    {
        let runtime = runtime.clone();
        self.push(move |next, params, value| {
            let future = step(params, value);
            runtime.spawn(async move {
                match future.await {
                    Ok(value) => next.advance(value),
                    Err(error) => next.fail(error),
                }
            });
        })
    }

    /// Drops a step that has not started yet. Returns whether it was found.
    pub fn remove(&self, id: TaskId) -> bool {
        let mut state = self.core.state.borrow_mut();
        let before = state.tasks.len();
        state.tasks.retain(|(task, _)| *task != id);
        state.tasks.len() != before
    }

    /// Drops every step that has not started yet.
    pub fn clear(&self) {
        self.core.state.borrow_mut().tasks.clear();
    }

    /// Number of steps that have not started yet.
    pub fn len(&self) -> usize {
        self.core.state.borrow().tasks.len()
    }

    /// Whether no step is waiting to start.
    pub fn is_empty(&self) -> bool {
        self.core.state.borrow().tasks.is_empty()
    }

    /// Whether the queue has been played and has neither completed nor failed.
    pub fn is_running(&self) -> bool {
        self.core.state.borrow().running
    }

    /// Sets the hook fired once, with the value the last step advanced with.
    ///
    /// A failure discards the hook, so playing a failed queue again completes silently unless a
    /// new one is set.
    pub fn on_complete(&self, complete: impl FnOnce(T) + 'static) {
        self.core.state.borrow_mut().complete = Some(Box::new(complete));
    }

    /// Sets the hook fired once when a step fails.
    pub fn on_failure(&self, failure: impl FnOnce(StepError) + 'static) {
        self.core.state.borrow_mut().failure = Some(Box::new(failure));
    }

    /// Starts running the steps with `initial` as the first step's input.
    ///
    /// An empty queue completes right away with `initial`. Playing a running queue does nothing.
    pub fn play(&self, initial: T) {
        {
            let mut state = self.core.state.borrow_mut();
            if state.running {
                warn!("Task queue is already running");
                return;
            }
            debug!("Task queue started with {} steps", state.tasks.len());
            state.running = true;
            state.cursor += 1;
            state.position = 0;
            state.pending = Some(initial);
        }
        self.core.dispatch();
    }
}

impl<T: 'static, P: Default + 'static> Default for AsyncTaskQueue<T, P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<T, P> Clone for AsyncTaskQueue<T, P> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T, P> Debug for AsyncTaskQueue<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.state.borrow();
        f.debug_struct("AsyncTaskQueue")
            .field("steps", &state.tasks.len())
            .field("running", &state.running)
            .finish_non_exhaustive()
    }
}

/// Returns a function that calls `f` on its `count`th call and does nothing otherwise.
///
/// Useful to advance a step once several callbacks have fired.
pub fn fire_after(count: usize, f: impl FnOnce() + 'static) -> impl Fn() {
    let remaining = Cell::new(count);
    let f = Cell::new(Some(f));

    move || {
        let left = remaining.get().saturating_sub(1);
        remaining.set(left);
        if left == 0 {
            if let Some(f) = f.take() {
                f();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use assert2::assert;

    use super::fire_after;

    #[test]
    fn fire_after_calls_once_on_the_last_call() {
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let tick = fire_after(3, move || counter.set(counter.get() + 1));

        tick();
        tick();
        assert!(fired.get() == 0);
        tick();
        assert!(fired.get() == 1);
        tick();
        assert!(fired.get() == 1);
    }

    #[test]
    fn fire_after_zero_fires_on_first_call() {
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let tick = fire_after(0, move || flag.set(true));

        tick();
        assert!(fired.get());
    }
}
