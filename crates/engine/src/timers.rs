//! Per-cell highlight timers.
//!
//! Every highlighted cell key owns exactly one timer pair:
//! - a toggle timer that flips the key's state every tick, and
//! - an expiry timer that ends the highlight.
//!
//! Key invariants:
//! - `start` on a live key cancels the old pair before creating the new one,
//!   so the full duration restarts and no stale toggle or expiry can fire
//! - a key is in the state map only while its pair is alive
//! - the last expiry among the live highlights sharing a recovery entry
//!   removes that entry

use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;
use std::rc::{Rc, Weak};
use std::time::Duration;

use cellblink_core::{CellKey, RecoveryKey};

use crate::recovery::RecoveryStore;
use crate::scheduler::Scheduler;

/// Cell key -> "should currently render highlighted".
pub type HighlightMap = HashMap<CellKey, bool>;

/// Receives the full highlight map after every change.
pub type HighlightListener = Box<dyn FnMut(&HighlightMap)>;

struct TimerPair<H> {
    /// Matches the generation captured by this pair's callbacks
    generation: u64,
    _toggle: H,
    _expiry: H,
    recovery: Option<RecoveryKey>,
}

struct TimerBook<H> {
    states: HighlightMap,
    live: HashMap<CellKey, TimerPair<H>>,
    store: Rc<dyn RecoveryStore>,
    listener: Option<HighlightListener>,
    next_generation: u64,
}

impl<H> TimerBook<H> {
    fn is_current(&self, key: &CellKey, generation: u64) -> bool {
        self.live.get(key).map(|pair| pair.generation) == Some(generation)
    }
}

/// Owns every live highlight timer for one mounted view.
pub struct HighlightTimers<S: Scheduler> {
    scheduler: S,
    tick: Duration,
    book: Rc<RefCell<TimerBook<S::Handle>>>,
}

impl<S: Scheduler> HighlightTimers<S>
where
    S::Handle: 'static,
{
    pub fn new(scheduler: S, tick: Duration, store: Rc<dyn RecoveryStore>) -> Self {
        Self {
            scheduler,
            tick,
            book: Rc::new(RefCell::new(TimerBook {
                states: HashMap::new(),
                live: HashMap::new(),
                store,
                listener: None,
                next_generation: 0,
            })),
        }
    }

    pub fn set_listener(&self, listener: HighlightListener) {
        self.book.borrow_mut().listener = Some(listener);
    }

    /// Start (or restart) the highlight for `key`.
    ///
    /// The state starts at `false` and flips every tick. When `duration`
    /// elapses the key is removed and, if given, `recovery` is cleared from
    /// the store once no other live highlight carries it.
    pub fn start(&self, key: CellKey, duration: Duration, recovery: Option<RecoveryKey>) {
        let (generation, previous) = {
            let mut book = self.book.borrow_mut();
            book.next_generation += 1;
            let previous = book.live.remove(&key);
            book.states.insert(key.clone(), false);
            (book.next_generation, previous)
        };
        // Cancel before scheduling the replacement
        let restarted = previous.is_some();
        drop(previous);

        let weak = Rc::downgrade(&self.book);
        let toggle = self.scheduler.every(
            self.tick,
            Box::new({
                let weak = weak.clone();
                let key = key.clone();
                move || toggle_state(&weak, &key, generation)
            }),
        );
        let expiry = self.scheduler.after(
            duration,
            Box::new({
                let key = key.clone();
                move || expire(&weak, &key, generation)
            }),
        );

        log::trace!(
            "{} highlight {} for {:?}",
            if restarted { "restarted" } else { "started" },
            key,
            duration
        );

        self.book.borrow_mut().live.insert(
            key,
            TimerPair { generation, _toggle: toggle, _expiry: expiry, recovery },
        );
        publish(&self.book);
    }

    /// Cancel every live timer and clear the state map.
    ///
    /// Persisted recovery entries are left alone so a later mount can resume.
    pub fn stop_all(&self) {
        let live = {
            let mut book = self.book.borrow_mut();
            book.states.clear();
            mem::take(&mut book.live)
        };
        if !live.is_empty() {
            log::debug!("stopping {} highlight timer(s)", live.len());
        }
        drop(live);
        publish(&self.book);
    }

    /// Copy of the current highlight map.
    pub fn states(&self) -> HighlightMap {
        self.book.borrow().states.clone()
    }

    pub fn is_highlighted(&self, key: &CellKey) -> bool {
        self.book.borrow().states.get(key).copied().unwrap_or(false)
    }

    /// True while a timer pair for `key` is alive.
    pub fn is_active(&self, key: &CellKey) -> bool {
        self.book.borrow().live.contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.book.borrow().live.len()
    }

    /// Number of live timers whose key belongs to `column`.
    pub fn active_in_column(&self, column: &str) -> usize {
        self.book.borrow().live.keys().filter(|k| k.column() == column).count()
    }
}

fn toggle_state<H>(book: &Weak<RefCell<TimerBook<H>>>, key: &CellKey, generation: u64) {
    let Some(book) = book.upgrade() else { return };
    {
        let mut b = book.borrow_mut();
        if !b.is_current(key, generation) {
            return;
        }
        let state = b.states.entry(key.clone()).or_insert(false);
        *state = !*state;
    }
    publish(&book);
}

fn expire<H>(book: &Weak<RefCell<TimerBook<H>>>, key: &CellKey, generation: u64) {
    let Some(book) = book.upgrade() else { return };
    let (pair, cleared, store) = {
        let mut b = book.borrow_mut();
        if !b.is_current(key, generation) {
            return;
        }
        // Absent reads as not highlighted
        b.states.remove(key);
        let pair = b.live.remove(key);
        // The entry stays while any other live highlight still carries it
        let cleared = pair
            .as_ref()
            .and_then(|p| p.recovery.clone())
            .filter(|rk| !b.live.values().any(|other| other.recovery.as_ref() == Some(rk)));
        (pair, cleared, b.store.clone())
    };

    if let Some(recovery) = &cleared {
        store.remove(recovery);
    }
    if pair.is_some() {
        log::trace!("highlight {} expired", key);
    }
    // Drops the toggle handle (and this expiry's own handle)
    drop(pair);
    publish(&book);
}

fn publish<H>(book: &Rc<RefCell<TimerBook<H>>>) {
    let (mut listener, snapshot) = {
        let mut b = book.borrow_mut();
        match b.listener.take() {
            Some(listener) => (listener, b.states.clone()),
            None => return,
        }
    };
    listener(&snapshot);
    let mut b = book.borrow_mut();
    // Keep a listener installed from inside the callback
    if b.listener.is_none() {
        b.listener = Some(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::MemoryRecoveryStore;
    use crate::scheduler::ManualScheduler;
    use cellblink_core::{CellCoord, ViewIdentity};

    const TICK: Duration = Duration::from_secs(1);

    fn setup() -> (ManualScheduler, MemoryRecoveryStore, HighlightTimers<ManualScheduler>) {
        let sched = ManualScheduler::new();
        let store = MemoryRecoveryStore::new();
        let timers = HighlightTimers::new(sched.clone(), TICK, Rc::new(store.clone()));
        (sched, store, timers)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_toggles_every_tick() {
        let (sched, _, timers) = setup();
        let key = CellKey::compare("Status", 2);
        timers.start(key.clone(), secs(60), None);

        assert!(timers.is_active(&key));
        assert_eq!(timers.states().get(&key), Some(&false));

        sched.advance(TICK);
        assert!(timers.is_highlighted(&key));
        sched.advance(TICK);
        assert!(!timers.is_highlighted(&key));
        sched.advance(TICK);
        assert!(timers.is_highlighted(&key));
    }

    #[test]
    fn test_expiry_removes_entry_and_cancels_toggle() {
        let (sched, _, timers) = setup();
        let key = CellKey::threshold("Temp", 0);
        timers.start(key.clone(), secs(5), None);

        sched.advance(secs(5));
        assert!(!timers.is_active(&key));
        assert!(timers.states().get(&key).is_none());
        assert_eq!(sched.pending(), 0);

        sched.advance(secs(10));
        assert!(timers.states().is_empty());
    }

    #[test]
    fn test_restart_resets_full_duration() {
        let (sched, _, timers) = setup();
        let key = CellKey::compare("Status", 1);
        timers.start(key.clone(), secs(10), None);

        sched.advance(secs(8));
        timers.start(key.clone(), secs(10), None);
        assert_eq!(sched.pending(), 2, "old pair must be cancelled");

        // The first expiry would have fired at t=10
        sched.advance(secs(9));
        assert!(timers.is_active(&key));
        assert!(timers.states().contains_key(&key));

        sched.advance(secs(1));
        assert!(!timers.is_active(&key));
        assert!(timers.states().is_empty());
    }

    #[test]
    fn test_double_start_same_tick_second_wins() {
        let (sched, _, timers) = setup();
        let key = CellKey::compare("Status", 1);
        timers.start(key.clone(), secs(3), None);
        timers.start(key.clone(), secs(30), None);

        assert_eq!(timers.active_count(), 1);
        sched.advance(secs(29));
        assert!(timers.is_active(&key));
        sched.advance(secs(1));
        assert!(!timers.is_active(&key));
    }

    #[test]
    fn test_keys_are_independent() {
        let (sched, _, timers) = setup();
        let a = CellKey::compare("Status", 1);
        let b = CellKey::threshold("Status", 1);
        timers.start(a.clone(), secs(2), None);
        timers.start(b.clone(), secs(4), None);

        sched.advance(secs(2));
        assert!(!timers.is_active(&a));
        assert!(timers.is_active(&b));
        assert_eq!(timers.active_in_column("Status"), 1);
    }

    #[test]
    fn test_expiry_clears_recovery_entry() {
        let (sched, store, timers) = setup();
        let rk = ViewIdentity::new("plant", 1, "Boilers").recovery_key("Status");
        store.put(&rk, &[CellCoord::new(2, 1)]);

        timers.start(CellKey::compare("Status", 2), secs(5), Some(rk.clone()));
        sched.advance(secs(4));
        assert!(store.contains(&rk));
        sched.advance(secs(1));
        assert!(!store.contains(&rk));
    }

    #[test]
    fn test_shared_recovery_entry_cleared_by_last_expiry() {
        let (sched, store, timers) = setup();
        let rk = ViewIdentity::new("plant", 1, "Boilers").recovery_key("Status");
        store.put(&rk, &[CellCoord::new(0, 1), CellCoord::new(1, 1)]);

        timers.start(CellKey::compare("Status", 0), secs(5), Some(rk.clone()));
        timers.start(CellKey::compare("Status", 1), secs(5), Some(rk.clone()));
        sched.advance(secs(3));
        // Restart row 0 only; row 1 keeps its original deadline
        timers.start(CellKey::compare("Status", 0), secs(5), Some(rk.clone()));

        sched.advance(secs(2));
        assert!(!timers.is_active(&CellKey::compare("Status", 1)));
        assert!(timers.is_active(&CellKey::compare("Status", 0)));
        assert!(store.contains(&rk));

        sched.advance(secs(3));
        assert_eq!(timers.active_count(), 0);
        assert!(!store.contains(&rk));
    }

    #[test]
    fn test_stop_all_keeps_recovery_entry() {
        let (sched, store, timers) = setup();
        let rk = ViewIdentity::new("plant", 1, "Boilers").recovery_key("Status");
        store.put(&rk, &[CellCoord::new(2, 1)]);
        timers.start(CellKey::compare("Status", 2), secs(5), Some(rk.clone()));
        timers.start(CellKey::threshold("Temp", 0), secs(5), None);

        timers.stop_all();
        assert_eq!(timers.active_count(), 0);
        assert!(timers.states().is_empty());
        assert_eq!(sched.pending(), 0);
        assert!(store.contains(&rk));

        sched.advance(secs(10));
        assert!(timers.states().is_empty());
    }

    #[test]
    fn test_listener_sees_every_change() {
        let (sched, _, timers) = setup();
        let seen: Rc<RefCell<Vec<HighlightMap>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        timers.set_listener(Box::new(move |map| sink.borrow_mut().push(map.clone())));

        let key = CellKey::compare("Status", 0);
        timers.start(key.clone(), secs(2), None);
        sched.advance(secs(2));

        let seen = seen.borrow();
        // start, tick at 1s, tick at 2s, expiry at 2s
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].get(&key), Some(&false));
        assert_eq!(seen[1].get(&key), Some(&true));
        assert_eq!(seen[2].get(&key), Some(&false));
        assert!(seen[3].is_empty());
    }

    #[test]
    fn test_listener_may_read_timers() {
        let (sched, _, timers) = setup();
        let timers = Rc::new(timers);
        let observed = Rc::new(RefCell::new(Vec::new()));

        let (t, sink) = (Rc::downgrade(&timers), observed.clone());
        timers.set_listener(Box::new(move |_| {
            if let Some(t) = t.upgrade() {
                sink.borrow_mut().push(t.active_count());
            }
        }));

        timers.start(CellKey::compare("Status", 0), secs(1), None);
        sched.advance(secs(1));
        assert_eq!(*observed.borrow(), vec![1, 1, 0]);
    }
}
