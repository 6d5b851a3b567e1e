use std::cell::{Cell, RefCell};
use std::rc::Rc;

use assert2::{assert, let_assert};
use common::Events;
use stratum_gui::queue::fire_after;
use stratum_gui::{AsyncTaskQueue, LocalRuntime, Next, StepError};
use tracing_test::traced_test;

mod common;

#[test]
#[traced_test]
fn steps_run_in_order_then_complete_once() {
    let queue: AsyncTaskQueue<u32> = AsyncTaskQueue::new(());
    let events = Events::default();

    for name in ["font", "language", "common"] {
        let events = events.clone();
        queue.push(move |next, _, value| {
            events.push(format!("{name} {value}"));
            next.advance(value + 1);
        });
    }
    let done = events.clone();
    queue.on_complete(move |value| done.push(format!("complete {value}")));

    queue.play(0);

    assert!(events.take() == ["font 0", "language 1", "common 2", "complete 3"]);
    assert!(!queue.is_running());
    assert!(queue.is_empty());
}

#[test]
#[traced_test]
fn a_step_that_never_advances_stalls_the_queue() {
    let queue: AsyncTaskQueue = AsyncTaskQueue::new(());
    let events = Events::default();
    let parked: Rc<RefCell<Option<Next<()>>>> = Rc::default();

    let first = events.clone();
    queue.push(move |next, _, _| {
        first.push("first");
        next.advance(());
    });
    let second = events.clone();
    let slot = parked.clone();
    queue.push(move |next, _, _| {
        second.push("second");
        *slot.borrow_mut() = Some(next);
    });
    let third = events.clone();
    queue.push(move |next, _, _| {
        third.push("third");
        next.advance(());
    });
    let done = events.clone();
    queue.on_complete(move |_| done.push("complete"));

    queue.play(());

    assert!(events.take() == ["first", "second"]);
    assert!(queue.is_running());
    assert!(queue.len() == 1);

    let next = parked.borrow_mut().take().unwrap();
    next.advance(());
    assert!(events.take() == ["third", "complete"]);
}

#[test]
#[traced_test]
fn empty_queue_completes_with_the_initial_value() {
    let queue: AsyncTaskQueue<&'static str> = AsyncTaskQueue::new(());
    let result = Rc::new(RefCell::new(None));
    let slot = result.clone();
    queue.on_complete(move |value| *slot.borrow_mut() = Some(value));

    queue.play("ready");

    assert!(*result.borrow() == Some("ready"));
}

#[test]
#[traced_test]
fn steps_share_params() {
    let queue: AsyncTaskQueue<u32, u32> = AsyncTaskQueue::new(5);
    queue.push(|next, params, value| next.advance(value + *params));
    queue.push(|next, params, value| next.advance(value * *params));
    let result = Rc::new(Cell::new(0));
    let slot = result.clone();
    queue.on_complete(move |value| slot.set(value));

    queue.play(1);

    assert!(result.get() == 30);
    assert!(**queue.params() == 5);
}

#[test]
#[traced_test]
fn failure_skips_the_remaining_steps() {
    let queue: AsyncTaskQueue = AsyncTaskQueue::new(());
    let events = Events::default();

    queue.push(|next, _, _| next.fail(StepError::new("font missing")));
    let skipped = events.clone();
    queue.push(move |next, _, _| {
        skipped.push("skipped step ran");
        next.advance(());
    });
    let done = events.clone();
    queue.on_complete(move |_| done.push("complete"));
    let failed = events.clone();
    queue.on_failure(move |error| failed.push(error.message().to_string()));

    queue.play(());

    assert!(events.take() == ["font missing"]);
    assert!(!queue.is_running());
    assert!(logs_contain("Task queue failed"));
}

#[test]
#[traced_test]
fn replaying_a_failed_queue_does_not_complete() {
    let queue: AsyncTaskQueue = AsyncTaskQueue::new(());
    let events = Events::default();

    queue.push(|next, _, _| next.fail(StepError::new("pack missing")));
    queue.push(|next, _, _| next.advance(()));
    let done = events.clone();
    queue.on_complete(move |_| done.push("complete"));
    let failed = events.clone();
    queue.on_failure(move |error| failed.push(error.message().to_string()));

    queue.play(());
    assert!(events.take() == ["pack missing"]);

    queue.play(());
    assert!(events.take().is_empty());
    assert!(!queue.is_running());

    let again = events.clone();
    queue.on_complete(move |_| again.push("complete again"));
    queue.play(());
    assert!(events.take() == ["complete again"]);
}

#[test]
#[traced_test]
fn late_sub_steps_after_a_failure_are_ignored() {
    let queue: AsyncTaskQueue<u32> = AsyncTaskQueue::new(());
    let parked: Rc<RefCell<Vec<Next<u32>>>> = Rc::default();
    let steps = (0..2).map(|_| {
        let slot = parked.clone();
        move |next: Next<u32>, _: Rc<()>, _: u32| slot.borrow_mut().push(next)
    });
    queue.push_multi(steps);
    let failures = Rc::new(Cell::new(0));
    let counter = failures.clone();
    queue.on_failure(move |_| counter.set(counter.get() + 1));
    let completed = Rc::new(Cell::new(false));
    let done = completed.clone();
    queue.on_complete(move |_| done.set(true));

    queue.play(0);
    let mut pending = std::mem::take(&mut *parked.borrow_mut());
    let late = pending.remove(1);
    let failing = pending.remove(0);
    failing.fail(StepError::new("bundle missing"));
    late.advance(1);

    assert!(failures.get() == 1);
    assert!(!completed.get());
    assert!(!queue.is_running());
}

#[test]
#[traced_test]
fn removed_steps_do_not_run() {
    let queue: AsyncTaskQueue<Vec<&'static str>> = AsyncTaskQueue::new(());
    queue.push(|next, _, mut trail| {
        trail.push("a");
        next.advance(trail);
    });
    let removed = queue.push(|next, _, mut trail| {
        trail.push("b");
        next.advance(trail);
    });
    queue.push(|next, _, mut trail| {
        trail.push("c");
        next.advance(trail);
    });
    let result = Rc::new(RefCell::new(Vec::new()));
    let slot = result.clone();
    queue.on_complete(move |trail| *slot.borrow_mut() = trail);

    assert!(queue.remove(removed));
    assert!(!queue.remove(removed));
    assert!(queue.len() == 2);
    queue.play(Vec::new());

    assert!(*result.borrow() == ["a", "c"]);
}

#[test]
#[traced_test]
fn cleared_queue_completes_right_away() {
    let queue: AsyncTaskQueue = AsyncTaskQueue::new(());
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();
    queue.push(move |next, _, _| {
        flag.set(true);
        next.advance(());
    });
    let completed = Rc::new(Cell::new(false));
    let done = completed.clone();
    queue.on_complete(move |_| done.set(true));

    queue.clear();
    queue.play(());

    assert!(!ran.get());
    assert!(completed.get());
}

#[test]
#[traced_test]
fn multi_steps_advance_once_all_are_done() {
    let runtime = LocalRuntime::new();
    let queue: AsyncTaskQueue<u32> = AsyncTaskQueue::new(());
    let parked: Rc<RefCell<Vec<Next<u32>>>> = Rc::default();

    let steps = (0..3).map(|_| {
        let slot = parked.clone();
        move |next: Next<u32>, _: Rc<()>, _: u32| slot.borrow_mut().push(next)
    });
    queue.push_multi(steps);
    let result = Rc::new(Cell::new(None));
    let slot = result.clone();
    queue.on_complete(move |value| slot.set(Some(value)));

    queue.play(0);
    runtime.run_until_stalled();

    let mut pending = std::mem::take(&mut *parked.borrow_mut());
    assert!(pending.len() == 3);
    let last = pending.remove(0);
    for (index, next) in pending.into_iter().enumerate() {
        next.advance(index as u32 + 10);
        assert!(result.get().is_none());
    }
    last.advance(42);

    assert!(result.get() == Some(42));
}

#[test]
#[traced_test]
fn a_failing_multi_step_fails_the_queue() {
    let queue: AsyncTaskQueue = AsyncTaskQueue::new(());
    let steps: Vec<Box<dyn FnOnce(Next<()>, Rc<()>, ())>> = vec![
        Box::new(|next: Next<()>, _: Rc<()>, _: ()| next.advance(())),
        Box::new(|next: Next<()>, _: Rc<()>, _: ()| {
            next.fail(StepError::new("pack missing"))
        }),
    ];
    queue.push_multi(steps);
    let failure = Rc::new(RefCell::new(None));
    let slot = failure.clone();
    queue.on_failure(move |error| *slot.borrow_mut() = Some(error));
    let completed = Rc::new(Cell::new(false));
    let done = completed.clone();
    queue.on_complete(move |_| done.set(true));

    queue.play(());

    let_assert!(Some(error) = failure.borrow_mut().take());
    assert!(error.message() == "pack missing");
    assert!(!completed.get());
}

#[test]
#[traced_test]
fn async_steps_run_on_the_runtime() {
    let runtime = LocalRuntime::new();
    let queue: AsyncTaskQueue<String> = AsyncTaskQueue::new(());
    let (sender, receiver) = async_channel::bounded::<&'static str>(1);

    queue.push_async(&runtime, move |_, value| async move {
        match receiver.recv().await {
            Ok(font) => Ok(format!("{value}+{font}")),
            Err(e) => Err(StepError::new(e.to_string())),
        }
    });
    queue.push_async(&runtime, |_, value| async move {
        Ok::<_, StepError>(format!("{value}+pack"))
    });
    let result = Rc::new(RefCell::new(None));
    let slot = result.clone();
    queue.on_complete(move |value| *slot.borrow_mut() = Some(value));

    queue.play("start".to_string());
    runtime.run_until_stalled();
    assert!(result.borrow().is_none());
    assert!(queue.is_running());

    sender.try_send("font").unwrap();
    runtime.run_until_stalled();

    assert!(result.borrow().as_deref() == Some("start+font+pack"));
}

#[test]
#[traced_test]
fn playing_a_running_queue_does_nothing() {
    let queue: AsyncTaskQueue = AsyncTaskQueue::new(());
    let parked: Rc<RefCell<Option<Next<()>>>> = Rc::default();
    let slot = parked.clone();
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    queue.push(move |next, _, _| {
        counter.set(counter.get() + 1);
        *slot.borrow_mut() = Some(next);
    });

    queue.play(());
    queue.play(());

    assert!(runs.get() == 1);
    assert!(logs_contain("Task queue is already running"));
}

#[test]
fn fire_after_advances_a_step_once_every_callback_fired() {
    let queue: AsyncTaskQueue = AsyncTaskQueue::new(());
    let callbacks = Rc::new(RefCell::new(Vec::new()));
    let slot = callbacks.clone();
    queue.push(move |next, _, _| {
        let tick = Rc::new(fire_after(2, move || next.advance(())));
        slot.borrow_mut().push(tick.clone());
        slot.borrow_mut().push(tick);
    });
    let completed = Rc::new(Cell::new(false));
    let done = completed.clone();
    queue.on_complete(move |_| done.set(true));

    queue.play(());
    let ticks = std::mem::take(&mut *callbacks.borrow_mut());
    ticks[0]();
    assert!(!completed.get());
    ticks[1]();

    assert!(completed.get());
}
