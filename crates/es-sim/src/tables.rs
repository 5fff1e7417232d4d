//! Notifier bookkeeping: who waits on what, and which meta-events contain
//! which events.
//!
//! Both tables are insertion-ordered so that wake-up order, and therefore the
//! pending queue, is a pure function of the order threads started waiting.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;

use crate::event::Event;
use crate::thread::ThreadHandle;

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;
type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

// ── EventThreadsMap ───────────────────────────────────────────────────────────

/// Event → threads blocked on it.  An entry exists only while it has at
/// least one thread.
#[derive(Default)]
pub(crate) struct EventThreadsMap {
    map: FxIndexMap<Event, FxIndexSet<ThreadHandle>>,
}

impl EventThreadsMap {
    pub(crate) fn add_thread(&mut self, event: &Event, thread: &ThreadHandle) {
        self.map.entry(event.clone()).or_default().insert(thread.clone());
    }

    /// Remove one waiter.
    pub(crate) fn remove_thread(&mut self, event: &Event, thread: &ThreadHandle) {
        let Some(threads) = self.map.get_mut(event) else {
            return;
        };
        threads.shift_remove(thread);
        if threads.is_empty() {
            self.map.shift_remove(event);
        }
    }

    /// Detach every waiter of `event`, in the order they started waiting.
    pub(crate) fn take_threads(&mut self, event: &Event) -> Option<Vec<ThreadHandle>> {
        self.map
            .shift_remove(event)
            .map(|threads| threads.into_iter().collect())
    }

    #[cfg(test)]
    pub(crate) fn waiting_on(&self, event: &Event) -> usize {
        self.map.get(event).map_or(0, IndexSet::len)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ── MetaEventMap ──────────────────────────────────────────────────────────────

/// Constituent → meta-events that currently have waiters and contain it.
///
/// A meta-event is mapped while anything references it: each thread blocked
/// on it holds one reference, and so does each mapped meta-event listing it
/// as a constituent.  Dropping the last reference unmaps it and releases the
/// references it holds on its nested meta-events.
#[derive(Default)]
pub(crate) struct MetaEventMap {
    map:  FxIndexMap<Event, FxIndexSet<Event>>,
    refs: FxIndexMap<Event, usize>,
}

impl MetaEventMap {
    /// Take one reference on `meta`, mapping it under each of its
    /// constituents (and its nested meta-events under theirs) on the first.
    pub(crate) fn add_meta_event(&mut self, meta: &Event) {
        let count = {
            let refs = self.refs.entry(meta.clone()).or_insert(0);
            *refs += 1;
            *refs
        };
        if count > 1 {
            return;
        }
        for constituent in meta.constituents() {
            if constituent.is_meta() {
                self.add_meta_event(constituent);
            }
            self.map.entry(constituent.clone()).or_default().insert(meta.clone());
        }
    }

    /// Drop one reference on `meta`.
    pub(crate) fn remove_meta_event(&mut self, meta: &Event) {
        self.release(meta, 1);
    }

    /// Drop `count` references on `meta`, unmapping it when none remain.
    pub(crate) fn release(&mut self, meta: &Event, count: usize) {
        if count == 0 {
            return;
        }
        let Some(refs) = self.refs.get_mut(meta) else {
            panic!("{meta} released without being registered");
        };
        assert!(*refs >= count, "{meta} released more often than it was registered");
        *refs -= count;
        if *refs > 0 {
            return;
        }
        self.refs.shift_remove(meta);
        for constituent in meta.constituents() {
            if let Some(metas) = self.map.get_mut(constituent) {
                metas.shift_remove(meta);
                if metas.is_empty() {
                    self.map.shift_remove(constituent);
                }
            }
            if constituent.is_meta() {
                self.release(constituent, 1);
            }
        }
    }

    /// Snapshot of the meta-events containing `event`.
    pub(crate) fn meta_events(&self, event: &Event) -> Option<Vec<Event>> {
        self.map.get(event).map(|metas| metas.iter().cloned().collect())
    }

    #[cfg(test)]
    pub(crate) fn references(&self, meta: &Event) -> usize {
        self.refs.get(meta).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty() && self.refs.is_empty()
    }
}
