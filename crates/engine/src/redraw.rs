//! Redraw notifications from the hosting view.
//!
//! The host fires a notification on each render cycle. The orchestrator keeps
//! one subscription for as long as it is mounted and releases it on unmount.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Releases its subscription when dropped.
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self { release: Some(Box::new(release)) }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

pub trait RedrawBus {
    fn subscribe(&self, on_redraw: Box<dyn FnMut()>) -> Subscription;
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    /// None while the listener is running
    listeners: BTreeMap<u64, Option<Box<dyn FnMut()>>>,
}

/// Single-threaded redraw bus for hosts without one of their own.
#[derive(Clone, Default)]
pub struct LocalRedrawBus {
    state: Rc<RefCell<BusState>>,
}

impl LocalRedrawBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify every subscriber of a redraw.
    pub fn emit(&self) {
        let ids: Vec<u64> = self.state.borrow().listeners.keys().copied().collect();
        for id in ids {
            let listener = self
                .state
                .borrow_mut()
                .listeners
                .get_mut(&id)
                .and_then(Option::take);
            let Some(mut listener) = listener else { continue };
            listener();
            let mut state = self.state.borrow_mut();
            if let Some(slot) = state.listeners.get_mut(&id) {
                *slot = Some(listener);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }
}

impl RedrawBus for LocalRedrawBus {
    fn subscribe(&self, on_redraw: Box<dyn FnMut()>) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.insert(id, Some(on_redraw));
            id
        };
        let weak = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                let removed = state.borrow_mut().listeners.remove(&id);
                drop(removed);
            }
        })
    }
}
