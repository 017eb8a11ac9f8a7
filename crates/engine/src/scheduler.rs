//! Timer scheduling.
//!
//! Highlight timers only need two primitives: "call this every `period`" and
//! "call this once after `delay`". Both return a handle that cancels the timer
//! when dropped, the same way dropping a `smol::Task` cancels its future.
//!
//! Two schedulers are provided:
//! - [`SmolScheduler`] runs timers on a single-threaded `smol::LocalExecutor`.
//! - [`ManualScheduler`] fires timers only when the owner calls
//!   [`ManualScheduler::advance`]. Hosts with their own frame clock use it, and
//!   so do the tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

use smol::{LocalExecutor, Task, Timer};

pub trait Scheduler {
    /// Cancels the timer when dropped.
    type Handle;

    fn every(&self, period: Duration, tick: Box<dyn FnMut()>) -> Self::Handle;

    fn after(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> Self::Handle;
}

// =============================================================================
// SmolScheduler
// =============================================================================

/// Timers as tasks on a shared `LocalExecutor`.
///
/// Nothing fires unless the executor is being driven, e.g. through
/// [`SmolScheduler::block_on`] or the host's own `executor.run(..)`.
#[derive(Clone)]
pub struct SmolScheduler {
    executor: Rc<LocalExecutor<'static>>,
}

impl Default for SmolScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SmolScheduler {
    pub fn new() -> Self {
        Self::with_executor(Rc::new(LocalExecutor::new()))
    }

    pub fn with_executor(executor: Rc<LocalExecutor<'static>>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Rc<LocalExecutor<'static>> {
        &self.executor
    }

    /// Drive the executor until `future` completes.
    pub fn block_on<T>(&self, future: impl Future<Output = T>) -> T {
        smol::block_on(self.executor.run(future))
    }
}

impl Scheduler for SmolScheduler {
    type Handle = Task<()>;

    fn every(&self, period: Duration, mut tick: Box<dyn FnMut()>) -> Task<()> {
        self.executor.spawn(async move {
            loop {
                Timer::after(period).await;
                tick();
            }
        })
    }

    fn after(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> Task<()> {
        self.executor.spawn(async move {
            Timer::after(delay).await;
            fire();
        })
    }
}

// =============================================================================
// ManualScheduler
// =============================================================================

enum Callback {
    Repeat(Box<dyn FnMut()>),
    Once(Box<dyn FnOnce()>),
}

struct Entry {
    due: Duration,
    period: Duration,
    /// None while the callback is running
    callback: Option<Callback>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
}

/// Virtual clock scheduler. Time only moves in [`advance`](Self::advance).
///
/// Timers due at the same instant fire in creation order. Callbacks run with no
/// internal borrow held, so they may create or drop other timers.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

/// Deregisters its timer on drop.
pub struct ManualHandle {
    id: u64,
    state: Weak<RefCell<ManualState>>,
}

impl Drop for ManualHandle {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            let removed = state.borrow_mut().entries.remove(&self.id);
            drop(removed);
        }
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Number of live timers.
    pub fn pending(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// Move the clock forward, firing every timer that falls due on the way.
    pub fn advance(&self, by: Duration) {
        let target = self.state.borrow().now.saturating_add(by);

        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let due = state
                    .entries
                    .iter()
                    .filter(|(_, e)| e.callback.is_some() && e.due <= target)
                    .min_by_key(|(id, e)| (e.due, **id))
                    .map(|(id, e)| (*id, e.due));
                match due {
                    Some((id, due)) => {
                        state.now = due;
                        state
                            .entries
                            .get_mut(&id)
                            .and_then(|e| e.callback.take())
                            .map(|cb| (id, cb))
                    }
                    None => None,
                }
            };

            let Some((id, callback)) = next else { break };

            match callback {
                Callback::Once(fire) => {
                    fire();
                    let finished = self.state.borrow_mut().entries.remove(&id);
                    drop(finished);
                }
                Callback::Repeat(mut tick) => {
                    tick();
                    // Re-arm unless the handle was dropped during the tick.
                    // A timer whose next due time overflows stays parked.
                    let cancelled = {
                        let mut state = self.state.borrow_mut();
                        match state.entries.get_mut(&id) {
                            Some(entry) => match entry.due.checked_add(entry.period) {
                                Some(due) => {
                                    entry.due = due;
                                    entry.callback = Some(Callback::Repeat(tick));
                                    None
                                }
                                None => Some(tick),
                            },
                            None => Some(tick),
                        }
                    };
                    drop(cancelled);
                }
            }
        }

        self.state.borrow_mut().now = target;
    }

    fn register(&self, delay: Duration, period: Duration, callback: Callback) -> ManualHandle {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        let due = state.now.saturating_add(delay);
        state.entries.insert(id, Entry { due, period, callback: Some(callback) });
        ManualHandle { id, state: Rc::downgrade(&self.state) }
    }
}

impl Scheduler for ManualScheduler {
    type Handle = ManualHandle;

    fn every(&self, period: Duration, tick: Box<dyn FnMut()>) -> ManualHandle {
        // A zero period would never let `advance` finish
        let period = period.max(Duration::from_nanos(1));
        self.register(period, period, Callback::Repeat(tick))
    }

    fn after(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> ManualHandle {
        self.register(delay, Duration::ZERO, Callback::Once(fire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_after_fires_once_at_deadline() {
        let sched = ManualScheduler::new();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        let _h = sched.after(Duration::from_secs(5), Box::new(move || f.set(f.get() + 1)));

        sched.advance(Duration::from_secs(4));
        assert_eq!(fired.get(), 0);
        sched.advance(Duration::from_secs(1));
        assert_eq!(fired.get(), 1);
        sched.advance(Duration::from_secs(10));
        assert_eq!(fired.get(), 1);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_every_repeats() {
        let sched = ManualScheduler::new();
        let ticks = Rc::new(Cell::new(0));
        let t = ticks.clone();
        let _h = sched.every(Duration::from_secs(1), Box::new(move || t.set(t.get() + 1)));

        sched.advance(Duration::from_millis(3500));
        assert_eq!(ticks.get(), 3);
        assert_eq!(sched.now(), Duration::from_millis(3500));
    }

    #[test]
    fn test_drop_cancels() {
        let sched = ManualScheduler::new();
        let ticks = Rc::new(Cell::new(0));
        let t = ticks.clone();
        let h = sched.every(Duration::from_secs(1), Box::new(move || t.set(t.get() + 1)));

        sched.advance(Duration::from_secs(2));
        drop(h);
        sched.advance(Duration::from_secs(5));
        assert_eq!(ticks.get(), 2);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_same_instant_fires_in_creation_order() {
        let sched = ManualScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (order.clone(), order.clone());
        let _first = sched.every(Duration::from_secs(2), Box::new(move || a.borrow_mut().push("tick")));
        let _second = sched.after(Duration::from_secs(2), Box::new(move || b.borrow_mut().push("fire")));

        sched.advance(Duration::from_secs(2));
        assert_eq!(*order.borrow(), vec!["tick", "fire"]);
    }

    #[test]
    fn test_callback_can_cancel_other_timer() {
        let sched = ManualScheduler::new();
        let ticks = Rc::new(Cell::new(0));
        let t = ticks.clone();
        let repeating = Rc::new(RefCell::new(Some(
            sched.every(Duration::from_secs(1), Box::new(move || t.set(t.get() + 1))),
        )));

        let slot = repeating.clone();
        let _stop = sched.after(
            Duration::from_millis(2500),
            Box::new(move || {
                slot.borrow_mut().take();
            }),
        );

        sched.advance(Duration::from_secs(10));
        assert_eq!(ticks.get(), 2);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_oversized_delay_never_fires() {
        let sched = ManualScheduler::new();
        sched.advance(Duration::from_secs(1));
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        let _h = sched.after(Duration::MAX, Box::new(move || f.set(true)));

        sched.advance(Duration::from_secs(3600));
        assert!(!fired.get());
        assert_eq!(sched.pending(), 1);
    }
}
