//! Combinator state for `All`, `Any`, and `Order` events.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{Event, EventKind};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(super) enum Combinator {
    All,
    Any,
    Order,
}

impl Combinator {
    pub(super) fn kind(self) -> EventKind {
        match self {
            Combinator::All   => EventKind::All,
            Combinator::Any   => EventKind::Any,
            Combinator::Order => EventKind::Order,
        }
    }
}

pub(super) struct MetaEvent {
    combinator: Combinator,
    events:     Box<[Event]>,
    auto_reset: bool,
    occurred:   AtomicBool,
    /// Whether `has_occurred` may derive the result from the constituents'
    /// flags.  Cleared by `reset`: from then on only notifications count.
    scan:       AtomicBool,
    /// Set once the current occurrence has been passed on to waiters and
    /// containing meta-events.
    delivered:  AtomicBool,
    /// `All`: constituents not yet seen.  `Order`: the expected suffix, head
    /// first.  Unused by `Any`.
    remaining:  Mutex<VecDeque<Event>>,
}

impl MetaEvent {
    pub(super) fn new(combinator: Combinator, events: Vec<Event>, auto_reset: bool) -> Self {
        let remaining = match combinator {
            Combinator::Any => VecDeque::new(),
            _ => events.iter().cloned().collect(),
        };
        Self {
            combinator,
            events: events.into_boxed_slice(),
            auto_reset,
            occurred: AtomicBool::new(false),
            scan: AtomicBool::new(true),
            delivered: AtomicBool::new(false),
            remaining: Mutex::new(remaining),
        }
    }

    pub(super) fn kind(&self) -> EventKind {
        self.combinator.kind()
    }

    pub(super) fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn auto_reset(&self) -> bool {
        self.auto_reset
    }

    pub(super) fn set_occurred(&self, value: bool) {
        self.occurred.store(value, Ordering::Release);
    }

    pub(super) fn has_occurred(&self) -> bool {
        if self.occurred.load(Ordering::Acquire) {
            return true;
        }
        if !self.scan.load(Ordering::Acquire) {
            return false;
        }
        let satisfied = match self.combinator {
            Combinator::All   => self.events.iter().all(Event::has_occurred),
            Combinator::Any   => self.events.iter().any(Event::has_occurred),
            // Ordering cannot be reconstructed from flags.
            Combinator::Order => false,
        };
        if satisfied {
            self.set_occurred(true);
        }
        satisfied
    }

    /// Claim the current occurrence for delivery.  `false` if it was already
    /// delivered.
    pub(super) fn claim(&self) -> bool {
        !self.delivered.swap(true, Ordering::AcqRel)
    }

    pub(super) fn notify_of(&self, event: &Event) {
        debug_assert!(
            self.events.contains(event),
            "{event} is not a constituent of this {}",
            self.kind()
        );
        match self.combinator {
            Combinator::All => {
                let mut remaining = self.remaining.lock();
                if let Some(pos) = remaining.iter().position(|e| e == event) {
                    remaining.remove(pos);
                }
                if remaining.is_empty() {
                    self.set_occurred(true);
                }
            }
            Combinator::Any => self.set_occurred(true),
            Combinator::Order => {
                let mut remaining = self.remaining.lock();
                if remaining.front() == Some(event) {
                    remaining.pop_front();
                    if remaining.is_empty() {
                        self.set_occurred(true);
                    }
                }
            }
        }
    }

    pub(super) fn reset(&self) {
        if self.combinator != Combinator::Any {
            let mut remaining = self.remaining.lock();
            remaining.clear();
            remaining.extend(self.events.iter().cloned());
        }
        self.scan.store(false, Ordering::Release);
        self.delivered.store(false, Ordering::Release);
        self.set_occurred(false);
    }
}
