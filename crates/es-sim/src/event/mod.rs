//! Events: the conditions simulation threads wait on.
//!
//! [`Event`] is a cheap, cloneable handle over a closed set of kinds:
//!
//! | Kind              | Retains state | Satisfied when                         |
//! |-------------------|---------------|----------------------------------------|
//! | [`EventKind::Step`]  | yes        | notified (until reset)                  |
//! | [`EventKind::Pulse`] | no         | never observable; only wakes waiters    |
//! | [`EventKind::All`]   | yes        | every constituent has occurred          |
//! | [`EventKind::Any`]   | yes        | at least one constituent has occurred   |
//! | [`EventKind::Order`] | yes        | constituents fired in the listed order  |
//!
//! Anyone may *query* an event.  Changing one (marking it occurred, feeding a
//! meta-event, resetting it) is crate-private: outside code goes through
//! [`SimulationManager::notify_of`](crate::SimulationManager::notify_of) and
//! [`SimulationManager::reset`](crate::SimulationManager::reset), so the
//! waiter and containment tables can never fall out of step with the flags.
//!
//! Identity is the [`EventId`]: two handles are equal exactly when they were
//! cloned from the same constructor call.

mod meta;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use es_core::EventId;

use crate::{SimError, SimResult};

use meta::{Combinator, MetaEvent};

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_event_id() -> EventId {
    EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
}

// ── Kinds and hooks ───────────────────────────────────────────────────────────

/// Which variant an [`Event`] is.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum EventKind {
    Step,
    Pulse,
    All,
    Any,
    Order,
}

impl EventKind {
    /// `true` for the combinators (`All`, `Any`, `Order`).
    #[inline]
    pub fn is_meta(self) -> bool {
        matches!(self, EventKind::All | EventKind::Any | EventKind::Order)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Step  => "StepEvent",
            EventKind::Pulse => "PulseEvent",
            EventKind::All   => "AllEvent",
            EventKind::Any   => "AnyEvent",
            EventKind::Order => "OrderEvent",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Code run around a wait on an event.
///
/// `pre_wait` runs once, immediately before a thread registers as blocked on
/// the event; returning an error refuses the wait.  `post_wait` runs once
/// after the thread resumes (or gives up waiting).  Both run while the
/// scheduler's notification tables are locked, so they must not call back
/// into the manager.
pub trait WaitHooks: Send + Sync + 'static {
    fn pre_wait(&self, _event: &Event) -> SimResult<()> {
        Ok(())
    }

    fn post_wait(&self, _event: &Event) {}
}

// ── Event ─────────────────────────────────────────────────────────────────────

/// A condition simulation threads can wait on.  See the [module docs](self).
#[derive(Clone)]
pub struct Event(Arc<EventNode>);

struct EventNode {
    id:   EventId,
    name: Option<String>,
    body: EventBody,
}

enum EventBody {
    Step {
        occurred: AtomicBool,
        /// `ALWAYS`/`NEVER`: the flag never changes.
        fixed:    bool,
        hooks:    Option<Arc<dyn WaitHooks>>,
    },
    Pulse {
        hooks: Option<Arc<dyn WaitHooks>>,
    },
    Meta(MetaEvent),
}

impl Event {
    fn from_body(name: Option<String>, body: EventBody) -> Self {
        Event(Arc::new(EventNode { id: next_event_id(), name, body }))
    }

    fn new_step(name: Option<String>, occurred: bool, fixed: bool, hooks: Option<Arc<dyn WaitHooks>>) -> Self {
        Self::from_body(
            name,
            EventBody::Step { occurred: AtomicBool::new(occurred), fixed, hooks },
        )
    }

    // ── Primitive constructors ────────────────────────────────────────────

    /// A named event that stays occurred once notified, until reset.
    pub fn step(name: impl Into<String>) -> Self {
        Self::new_step(Some(name.into()), false, false, None)
    }

    pub fn unnamed_step() -> Self {
        Self::new_step(None, false, false, None)
    }

    /// A step event whose waits run `hooks`.
    pub fn step_with_hooks(name: impl Into<String>, hooks: Arc<dyn WaitHooks>) -> Self {
        Self::new_step(Some(name.into()), false, false, Some(hooks))
    }

    /// A named event that only wakes the threads waiting at the instant it is
    /// notified.  It never reports itself as occurred.
    pub fn pulse(name: impl Into<String>) -> Self {
        Self::from_body(Some(name.into()), EventBody::Pulse { hooks: None })
    }

    pub fn unnamed_pulse() -> Self {
        Self::from_body(None, EventBody::Pulse { hooks: None })
    }

    pub fn pulse_with_hooks(name: impl Into<String>, hooks: Arc<dyn WaitHooks>) -> Self {
        Self::from_body(Some(name.into()), EventBody::Pulse { hooks: Some(hooks) })
    }

    /// The step event that has permanently occurred.
    pub fn always() -> Self {
        static ALWAYS: OnceLock<Event> = OnceLock::new();
        ALWAYS
            .get_or_init(|| Self::new_step(Some("ALWAYS".into()), true, true, None))
            .clone()
    }

    /// The step event that will never occur.
    pub fn never() -> Self {
        static NEVER: OnceLock<Event> = OnceLock::new();
        NEVER
            .get_or_init(|| Self::new_step(Some("NEVER".into()), false, true, None))
            .clone()
    }

    // ── Meta-event constructors ───────────────────────────────────────────

    fn new_meta(
        name:       Option<String>,
        combinator: Combinator,
        events:     Vec<Event>,
        auto_reset: bool,
    ) -> SimResult<Self> {
        if events.is_empty() {
            return Err(SimError::EmptyMetaEvent { kind: combinator.kind() });
        }
        let name = name.unwrap_or_else(|| default_meta_name(combinator.kind(), &events));
        let meta = MetaEvent::new(combinator, events, auto_reset);
        Ok(Self::from_body(Some(name), EventBody::Meta(meta)))
    }

    /// Occurs once every event in `events` has occurred.
    ///
    /// With `auto_reset`, the event clears itself after each time it
    /// satisfies its waiters.  Fails with [`SimError::EmptyMetaEvent`] for an
    /// empty collection.
    pub fn all<I>(events: I, auto_reset: bool) -> SimResult<Self>
    where
        I: IntoIterator<Item = Event>,
    {
        Self::new_meta(None, Combinator::All, events.into_iter().collect(), auto_reset)
    }

    pub fn all_named<I>(name: impl Into<String>, events: I, auto_reset: bool) -> SimResult<Self>
    where
        I: IntoIterator<Item = Event>,
    {
        Self::new_meta(Some(name.into()), Combinator::All, events.into_iter().collect(), auto_reset)
    }

    /// Occurs as soon as any event in `events` occurs.
    pub fn any<I>(events: I, auto_reset: bool) -> SimResult<Self>
    where
        I: IntoIterator<Item = Event>,
    {
        Self::new_meta(None, Combinator::Any, events.into_iter().collect(), auto_reset)
    }

    pub fn any_named<I>(name: impl Into<String>, events: I, auto_reset: bool) -> SimResult<Self>
    where
        I: IntoIterator<Item = Event>,
    {
        Self::new_meta(Some(name.into()), Combinator::Any, events.into_iter().collect(), auto_reset)
    }

    /// Occurs once `events` have been notified in exactly the listed order.
    ///
    /// A notification of anything but the next expected event is ignored,
    /// not treated as a failure.
    pub fn order<I>(events: I, auto_reset: bool) -> SimResult<Self>
    where
        I: IntoIterator<Item = Event>,
    {
        Self::new_meta(None, Combinator::Order, events.into_iter().collect(), auto_reset)
    }

    pub fn order_named<I>(name: impl Into<String>, events: I, auto_reset: bool) -> SimResult<Self>
    where
        I: IntoIterator<Item = Event>,
    {
        Self::new_meta(Some(name.into()), Combinator::Order, events.into_iter().collect(), auto_reset)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    #[inline]
    pub fn id(&self) -> EventId {
        self.0.id
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn kind(&self) -> EventKind {
        match &self.0.body {
            EventBody::Step { .. }  => EventKind::Step,
            EventBody::Pulse { .. } => EventKind::Pulse,
            EventBody::Meta(m)      => m.kind(),
        }
    }

    #[inline]
    pub fn is_meta(&self) -> bool {
        matches!(self.0.body, EventBody::Meta(_))
    }

    /// `false` for primitive events.
    pub fn is_auto_reset(&self) -> bool {
        match &self.0.body {
            EventBody::Meta(m) => m.auto_reset(),
            _ => false,
        }
    }

    /// The constituents of a meta-event; empty for primitive events.
    pub fn constituents(&self) -> &[Event] {
        match &self.0.body {
            EventBody::Meta(m) => m.events(),
            _ => &[],
        }
    }

    /// Whether the event has occurred, under its kind's retention policy.
    ///
    /// For `All` and `Any` this also rescans the constituents, so a
    /// constituent that became occurred without going through the notifier
    /// is still honoured.  The only side effect is caching a positive answer.
    /// After a reset the rescan is off: a reset meta-event only occurs again
    /// through fresh notifications of its constituents.
    pub fn has_occurred(&self) -> bool {
        match &self.0.body {
            EventBody::Step { occurred, .. } => occurred.load(Ordering::Acquire),
            EventBody::Pulse { .. }          => false,
            EventBody::Meta(m)               => m.has_occurred(),
        }
    }

    // ── Crate-private mutation ────────────────────────────────────────────

    pub(crate) fn set_occurred(&self, value: bool) {
        match &self.0.body {
            EventBody::Step { occurred, fixed, .. } => {
                if !fixed {
                    occurred.store(value, Ordering::Release);
                }
            }
            EventBody::Pulse { .. } => {}
            EventBody::Meta(m)      => m.set_occurred(value),
        }
    }

    /// Feed a constituent's occurrence into a meta-event's bookkeeping.
    /// Does not cascade; the notifier decides what happens next.
    pub(crate) fn notify_constituent(&self, constituent: &Event) {
        if let EventBody::Meta(m) = &self.0.body {
            m.notify_of(constituent);
        }
    }

    /// Claim a meta-event's current occurrence so it is delivered to its
    /// waiters and containers once.  Always `true` for other kinds.
    pub(crate) fn claim_occurrence(&self) -> bool {
        match &self.0.body {
            EventBody::Meta(m) => m.claim(),
            _ => true,
        }
    }

    /// Clear the occurred flag and, for meta-events, refill the tracking
    /// state from the full constituent list.
    pub(crate) fn reset(&self) {
        match &self.0.body {
            EventBody::Meta(m) => m.reset(),
            _ => self.set_occurred(false),
        }
    }

    pub(crate) fn pre_wait(&self) -> SimResult<()> {
        match &self.0.body {
            EventBody::Step { hooks, .. } | EventBody::Pulse { hooks } => match hooks {
                Some(h) => h.pre_wait(self),
                None => Ok(()),
            },
            EventBody::Meta(m) => m.events().iter().try_for_each(Event::pre_wait),
        }
    }

    pub(crate) fn post_wait(&self) {
        match &self.0.body {
            EventBody::Step { hooks, .. } | EventBody::Pulse { hooks } => {
                if let Some(h) = hooks {
                    h.post_wait(self);
                }
            }
            EventBody::Meta(m) => m.events().iter().for_each(Event::post_wait),
        }
    }
}

fn default_meta_name(kind: EventKind, events: &[Event]) -> String {
    let parts: Vec<String> = events.iter().map(Event::to_string).collect();
    format!("{}[{}]", kind, parts.join(", "))
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0.id),
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("kind", &self.kind())
            .field("occurred", &self.has_occurred())
            .finish()
    }
}
