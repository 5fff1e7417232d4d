//! Simulation threads.
//!
//! Each simulation thread is a real native thread that only executes user
//! code while it holds the turn (state `RUNNING`).  Everything else it does
//! is park on its own monitor until the scheduler, a notifier, or a
//! terminator changes its state.
//!
//! Two views of a thread exist:
//!
//! - [`ThreadHandle`]: cloneable, `Send`, usable from anywhere.  Queries,
//!   `terminate`, `interrupt`, and the join event.
//! - [`ThreadContext`]: lent to the thread's own body, neither `Send` nor
//!   `Sync`.  Every operation that suspends the calling thread (yielding,
//!   waiting, joining, marshalling) lives here, so the type system rules out
//!   calling them from any other thread.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use es_core::{RngFactory, SimRng, SimThreadId, ThreadState};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::error::{SimError, SimResult, ThreadFailure, ThreadResult};
use crate::event::Event;
use crate::manager::ManagerShared;

/// The boxed form of a thread body, for [`fork_many`](ThreadContext::fork_many).
pub type ThreadBody = Box<dyn FnOnce(&ThreadContext) -> ThreadResult + Send + 'static>;

thread_local! {
    /// The simulation thread running on this native thread, if any.
    static CURRENT: RefCell<Option<ThreadHandle>> = const { RefCell::new(None) };
}

/// The simulation thread bound to the calling native thread.
pub(crate) fn current() -> Option<ThreadHandle> {
    CURRENT.with(|c| c.borrow().clone())
}

// ── Internal state ────────────────────────────────────────────────────────────

struct Monitor {
    state:          ThreadState,
    blocking_event: Option<Event>,
}

pub(crate) struct ThreadInner {
    id:      SimThreadId,
    name:    String,
    manager: Arc<ManagerShared>,

    monitor: Mutex<Monitor>,
    changed: Condvar,

    terminating: AtomicBool,
    interrupted: AtomicBool,
    /// Set while this thread is parked on another thread's monitor, so a
    /// terminator or interrupter can wake it there.
    parked_on:   Mutex<Option<ThreadHandle>>,

    parent:     Mutex<Option<Weak<ThreadInner>>>,
    children:   Mutex<Vec<ThreadHandle>>,
    join_event: Event,

    random:         Mutex<SimRng>,
    random_factory: Mutex<Arc<dyn RngFactory>>,
    failure:        Mutex<Option<Arc<ThreadFailure>>>,
}

/// Who may cut a state wait short, and how.
#[derive(Copy, Clone)]
pub(crate) enum Cancel<'a> {
    /// Only the awaited state ends the wait.
    Never,
    /// Termination of the given thread ends the wait.
    Terminate(&'a ThreadHandle),
    /// Termination or interruption of the given thread ends the wait.
    Any(&'a ThreadHandle),
}

impl Cancel<'_> {
    fn waiter(&self) -> Option<&ThreadHandle> {
        match *self {
            Cancel::Never => None,
            Cancel::Terminate(t) | Cancel::Any(t) => Some(t),
        }
    }

    fn check(&self) -> SimResult<()> {
        let (waiter, interruptible) = match *self {
            Cancel::Never        => return Ok(()),
            Cancel::Terminate(t) => (t, false),
            Cancel::Any(t)       => (t, true),
        };
        if waiter.0.terminating.load(Ordering::SeqCst) {
            return Err(SimError::Terminated { thread: waiter.0.name.clone() });
        }
        if interruptible && waiter.0.interrupted.swap(false, Ordering::SeqCst) {
            return Err(SimError::Interrupted { thread: waiter.0.name.clone() });
        }
        Ok(())
    }
}

// ── ThreadHandle ──────────────────────────────────────────────────────────────

/// A shareable reference to a simulation thread.
#[derive(Clone)]
pub struct ThreadHandle(pub(crate) Arc<ThreadInner>);

impl ThreadHandle {
    pub(crate) fn new(
        id:             SimThreadId,
        name:           String,
        manager:        Arc<ManagerShared>,
        parent:         Option<&ThreadHandle>,
        random:         SimRng,
        random_factory: Arc<dyn RngFactory>,
    ) -> Self {
        let join_event = Event::step(format!("{name}.join"));
        ThreadHandle(Arc::new(ThreadInner {
            id,
            name,
            manager,
            monitor: Mutex::new(Monitor { state: ThreadState::Starting, blocking_event: None }),
            changed: Condvar::new(),
            terminating: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            parked_on: Mutex::new(None),
            parent: Mutex::new(parent.map(|p| Arc::downgrade(&p.0))),
            children: Mutex::new(Vec::new()),
            join_event,
            random: Mutex::new(random),
            random_factory: Mutex::new(random_factory),
            failure: Mutex::new(None),
        }))
    }

    #[inline]
    pub fn id(&self) -> SimThreadId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn state(&self) -> ThreadState {
        self.0.monitor.lock().state
    }

    pub fn is_terminated(&self) -> bool {
        self.state().is_terminated()
    }

    /// The event this thread is blocked or marshalling on, if any.
    pub fn blocking_event(&self) -> Option<Event> {
        self.0.monitor.lock().blocking_event.clone()
    }

    /// Step event notified exactly once, when the thread terminates.
    pub fn join_event(&self) -> &Event {
        &self.0.join_event
    }

    /// The thread that forked this one, or the nearest live ancestor after
    /// reparenting.  `None` for top-level threads.
    pub fn parent(&self) -> Option<ThreadHandle> {
        self.0.parent.lock().as_ref().and_then(Weak::upgrade).map(ThreadHandle)
    }

    /// Snapshot of the live children.
    pub fn children(&self) -> Vec<ThreadHandle> {
        self.0.children.lock().clone()
    }

    /// Why the thread ended abnormally, once it has.
    pub fn failure(&self) -> Option<Arc<ThreadFailure>> {
        self.0.failure.lock().clone()
    }

    /// Whether termination has been requested.
    pub fn is_terminating(&self) -> bool {
        self.0.terminating.load(Ordering::SeqCst)
    }

    /// Terminate this thread and wait until it has cleaned up.
    ///
    /// Callable from any context.  A thread that terminates itself gets
    /// [`SimError::Terminated`] straight back, which its body should
    /// propagate.  A simulation thread that is itself terminated while
    /// waiting here also gets `Terminated`.
    pub fn terminate(&self) -> SimResult<()> {
        if !self.request_termination() {
            return Ok(());
        }
        let caller = current();
        let cancel = caller.as_ref().map_or(Cancel::Never, Cancel::Terminate);
        self.wait_for_state(ThreadState::Terminated, false, cancel)?;
        Ok(())
    }

    /// Terminate every descendant of this thread, children first.
    ///
    /// Children of a terminated child are handed to this thread, so the loop
    /// runs until no live children remain.
    pub fn terminate_children(&self) -> SimResult<()> {
        loop {
            let children = self.children();
            if children.is_empty() {
                return Ok(());
            }
            for child in &children {
                child.terminate()?;
            }
        }
    }

    /// Wake the thread from its current wait with [`SimError::Interrupted`].
    ///
    /// A thread blocked on an event is withdrawn from it and queued at once;
    /// it still only resumes when the scheduler gives it the turn.  If the
    /// thread is not waiting, the interrupt is delivered at its next wait or
    /// yield.
    pub fn interrupt(&self) {
        if self.state().is_terminated() {
            return;
        }
        debug!(thread = %self, "interrupt requested");
        self.0.interrupted.store(true, Ordering::SeqCst);
        self.requeue_if_blocked();
        self.wake();
    }

    /// Wait until this thread terminates.
    ///
    /// Must be called from another simulation thread; see
    /// [`ThreadContext::join`].
    pub fn join(&self) -> SimResult<()> {
        match current() {
            Some(caller) => caller.join_thread(self),
            None => Err(SimError::WrongThread {
                operation: "join",
                reason:    "the caller is not a simulation thread",
            }),
        }
    }

    // ── Crate-internal operations ─────────────────────────────────────────

    pub(crate) fn manager(&self) -> &Arc<ManagerShared> {
        &self.0.manager
    }

    pub(crate) fn random_factory(&self) -> Arc<dyn RngFactory> {
        self.0.random_factory.lock().clone()
    }

    pub(crate) fn random(&self) -> MutexGuard<'_, SimRng> {
        self.0.random.lock()
    }

    pub(crate) fn add_child(&self, child: &ThreadHandle) {
        self.0.children.lock().push(child.clone());
    }

    pub(crate) fn remove_child(&self, child: &ThreadHandle) {
        self.0.children.lock().retain(|c| c != child);
    }

    /// Set `terminating` and wake the thread.  Returns `false` if it has
    /// already terminated.
    pub(crate) fn request_termination(&self) -> bool {
        if self.state().is_terminated() {
            return false;
        }
        if !self.0.terminating.swap(true, Ordering::SeqCst) {
            debug!(thread = %self, "termination requested");
            self.wake();
        }
        true
    }

    /// Unpark the thread wherever it is parked: its own monitor, or another
    /// thread's while waiting for that thread's state.
    fn wake(&self) {
        {
            let _monitor = self.0.monitor.lock();
            self.0.changed.notify_all();
        }
        let parked_on = self.0.parked_on.lock().clone();
        if let Some(other) = parked_on {
            let _monitor = other.0.monitor.lock();
            other.0.changed.notify_all();
        }
    }

    /// Change state under the monitor, running `f` on the locked monitor
    /// first.  Returns the previous state.
    fn transition(&self, to: ThreadState, f: impl FnOnce(&mut Monitor)) -> ThreadState {
        let from = {
            let mut monitor = self.0.monitor.lock();
            f(&mut monitor);
            let from = monitor.state;
            monitor.state = to;
            self.0.changed.notify_all();
            from
        };
        trace!(thread = %self.0.name, %from, %to, "state");
        self.0.manager.observe_state(self, from, to);
        from
    }

    pub(crate) fn set_state(&self, to: ThreadState) {
        self.transition(to, |_| {});
    }

    /// `PENDING → RUNNING` if the thread is still pending.  The scheduler's
    /// only way of handing out the turn.
    pub(crate) fn try_start_turn(&self) -> bool {
        self.conditional_transition(ThreadState::Pending, ThreadState::Running)
    }

    /// `MARSHALLING → RUNNING` once the thread's call has been executed.
    pub(crate) fn resume_after_marshal(&self) -> bool {
        self.conditional_transition(ThreadState::Marshalling, ThreadState::Running)
    }

    fn conditional_transition(&self, from: ThreadState, to: ThreadState) -> bool {
        {
            let mut monitor = self.0.monitor.lock();
            if monitor.state != from {
                return false;
            }
            monitor.state = to;
            self.0.changed.notify_all();
        }
        trace!(thread = %self.0.name, %from, %to, "state");
        self.0.manager.observe_state(self, from, to);
        true
    }

    /// `BLOCKED → PENDING` for a thread whose event was notified.
    pub(crate) fn wake_from_event(&self, event: &Event) {
        self.transition(ThreadState::Pending, |monitor| {
            assert_eq!(monitor.state, ThreadState::Blocked, "{} woken while not blocked", self.0.name);
            assert_eq!(monitor.blocking_event.as_ref(), Some(event), "{} woken by the wrong event", self.0.name);
            monitor.blocking_event = None;
        });
    }

    /// Clear the blocking event if this thread is marshalling on
    /// `completion`.  Returns `false` if it is not, in which case the caller
    /// must notify `completion` the ordinary way.
    pub(crate) fn clear_marshal_completion(&self, completion: &Event) -> bool {
        let mut monitor = self.0.monitor.lock();
        if monitor.state == ThreadState::Marshalling
            && monitor.blocking_event.as_ref() == Some(completion)
        {
            monitor.blocking_event = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn enter_marshalling(&self, completion: &Event) {
        self.transition(ThreadState::Marshalling, |monitor| {
            monitor.blocking_event = Some(completion.clone());
        });
    }

    /// Park until the state equals `wait_state` (or differs from it, with
    /// `invert`), or until `cancel` fires.  Returns the state observed.
    pub(crate) fn wait_for_state(
        &self,
        wait_state: ThreadState,
        invert:     bool,
        cancel:     Cancel<'_>,
    ) -> SimResult<ThreadState> {
        let foreign = cancel.waiter().filter(|w| *w != self);
        if let Some(waiter) = foreign {
            *waiter.0.parked_on.lock() = Some(self.clone());
        }

        let result = {
            let mut monitor = self.0.monitor.lock();
            loop {
                if let Err(e) = cancel.check() {
                    break Err(e);
                }
                if (monitor.state == wait_state) != invert {
                    break Ok(monitor.state);
                }
                self.0.changed.wait(&mut monitor);
            }
        };

        if let Some(waiter) = foreign {
            *waiter.0.parked_on.lock() = None;
        }
        result
    }

    /// Wait for the turn, cancellable only by termination.
    fn await_turn(&self) -> SimResult<()> {
        self.wait_for_state(ThreadState::Running, false, Cancel::Terminate(self))?;
        Ok(())
    }

    // ── Suspension points (called through ThreadContext) ──────────────────

    fn yield_now(&self) -> SimResult<()> {
        // Queue before giving up the turn: the scheduler may pop as soon as
        // the state leaves RUNNING.
        self.0.manager.push_pending(self);
        self.set_state(ThreadState::Pending);
        match self.wait_for_state(ThreadState::Running, false, Cancel::Any(self)) {
            Ok(_) => Ok(()),
            Err(err @ SimError::Interrupted { .. }) => {
                self.await_turn()?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn wait_for(&self, event: &Event) -> SimResult<()> {
        let manager = Arc::clone(&self.0.manager);
        let blocked = {
            let _notify = manager.notify_guard.lock();
            let mut waiters = manager.waiters.lock();
            if event.has_occurred() {
                false
            } else {
                event.pre_wait()?;
                waiters.add_thread(event, self);
                if event.is_meta() {
                    manager.meta_events.lock().add_meta_event(event);
                }
                self.transition(ThreadState::Blocked, |monitor| {
                    monitor.blocking_event = Some(event.clone());
                });
                true
            }
        };
        if !blocked {
            return Ok(());
        }

        trace!(thread = %self.0.name, %event, "blocked");
        let result = match self.wait_for_state(ThreadState::Running, false, Cancel::Any(self)) {
            Ok(_) => Ok(()),
            Err(err @ SimError::Interrupted { .. }) => {
                self.requeue_if_blocked();
                self.await_turn().and(Err(err))
            }
            Err(err) => {
                self.cancel_event();
                Err(err)
            }
        };
        event.post_wait();
        result
    }

    /// Withdraw a `BLOCKED` thread from its event's waiter set.  Returns
    /// `true` if it was still registered.
    fn cancel_event(&self) -> bool {
        let manager = &self.0.manager;
        let _notify = manager.notify_guard.lock();
        let mut waiters = manager.waiters.lock();
        let blocking = {
            let mut monitor = self.0.monitor.lock();
            match monitor.state {
                ThreadState::Blocked => monitor.blocking_event.take(),
                _ => None,
            }
        };
        match blocking {
            Some(event) => {
                waiters.remove_thread(&event, self);
                if event.is_meta() {
                    manager.meta_events.lock().remove_meta_event(&event);
                }
                true
            }
            None => false,
        }
    }

    /// Move a thread that is still registered on an event to the pending
    /// queue, so an interrupt is delivered in turn order.
    fn requeue_if_blocked(&self) {
        if self.cancel_event() {
            self.set_state(ThreadState::Pending);
            self.0.manager.push_pending(self);
        }
    }

    fn join_thread(&self, other: &ThreadHandle) -> SimResult<()> {
        if other == self {
            return Err(SimError::SelfJoin { thread: self.0.name.clone() });
        }
        self.wait_for(other.join_event())
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Body of the native thread.
    pub(crate) fn run(self, body: ThreadBody) {
        CURRENT.with(|c| *c.borrow_mut() = Some(self.clone()));

        self.set_state(ThreadState::Pending);
        let outcome: ThreadResult = match self.wait_for_state(ThreadState::Running, false, Cancel::Terminate(&self)) {
            Ok(_) => {
                let ctx = ThreadContext::new(self.clone());
                match panic::catch_unwind(AssertUnwindSafe(|| body(&ctx))) {
                    Ok(result) => result,
                    Err(payload) => Err(Box::new(ThreadFailure::from_panic(payload))),
                }
            }
            Err(e) => Err(Box::new(e)),
        };

        if let Err(err) = outcome {
            self.record_failure(err);
        }
        self.unregister();
    }

    fn record_failure(&self, err: Box<dyn std::error::Error + Send + Sync + 'static>) {
        let cancelled = matches!(
            err.downcast_ref::<SimError>(),
            Some(SimError::Terminated { .. })
        );
        if cancelled && self.is_terminating() {
            trace!(thread = %self.0.name, "termination unwound");
            return;
        }
        let failure = match err.downcast::<ThreadFailure>() {
            Ok(f) => *f,
            Err(err) => ThreadFailure::Error(err),
        };
        warn!(thread = %self.0.name, %failure, "simulation thread failed");
        *self.0.failure.lock() = Some(Arc::new(failure));
    }

    /// Hand the children to the parent, fire the join event, and leave the
    /// manager.
    fn unregister(&self) {
        let orphans = std::mem::take(&mut *self.0.children.lock());
        let parent = self.parent();
        for orphan in &orphans {
            *orphan.0.parent.lock() = parent.as_ref().map(|p| Arc::downgrade(&p.0));
        }
        if let Some(parent) = &parent {
            parent.remove_child(self);
            parent.0.children.lock().extend(orphans);
        }

        CURRENT.with(|c| *c.borrow_mut() = None);

        let manager = Arc::clone(&self.0.manager);
        manager.notify_of(&self.0.join_event);
        self.transition(ThreadState::Terminated, |monitor| monitor.blocking_event = None);
        manager.remove_active(self);
        debug!(thread = %self.0.name, "terminated");
        manager.observe_terminated(self);
    }
}

impl PartialEq for ThreadHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ThreadHandle {}

impl Hash for ThreadHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

/// `name[STATE]`, or `name[STATE:event]` while blocked or marshalling.
impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let monitor = self.0.monitor.lock();
        match &monitor.blocking_event {
            Some(event) => write!(f, "{}[{}:{}]", self.0.name, monitor.state, event),
            None => write!(f, "{}[{}]", self.0.name, monitor.state),
        }
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("state", &self.state())
            .finish()
    }
}

// ── ThreadContext ─────────────────────────────────────────────────────────────

/// The running thread's own view of itself, lent to its body.
///
/// Every method that suspends returns [`SimError::Terminated`] if the thread
/// is terminated while suspended and [`SimError::Interrupted`] if it is
/// interrupted.  Bodies should propagate both with `?`.
pub struct ThreadContext {
    handle:    ThreadHandle,
    _not_send: PhantomData<*const ()>,
}

impl ThreadContext {
    fn new(handle: ThreadHandle) -> Self {
        Self { handle, _not_send: PhantomData }
    }

    pub fn handle(&self) -> &ThreadHandle {
        &self.handle
    }

    pub fn id(&self) -> SimThreadId {
        self.handle.id()
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn children(&self) -> Vec<ThreadHandle> {
        self.handle.children()
    }

    // ── Suspension ────────────────────────────────────────────────────────

    /// Give up the turn and rejoin the back of the pending queue.
    pub fn yield_now(&self) -> SimResult<()> {
        self.handle.yield_now()
    }

    /// Block until `event` occurs.  Returns at once if it already has.
    pub fn wait_for(&self, event: &Event) -> SimResult<()> {
        self.handle.wait_for(event)
    }

    /// Block until any of `events` occurs.  An empty collection returns at
    /// once.
    pub fn wait_for_any<I>(&self, events: I) -> SimResult<()>
    where
        I: IntoIterator<Item = Event>,
    {
        let events: Vec<Event> = events.into_iter().collect();
        if events.is_empty() {
            return Ok(());
        }
        self.wait_for(&Event::any(events, false)?)
    }

    /// Block until every one of `events` has occurred.
    pub fn wait_for_all<I>(&self, events: I) -> SimResult<()>
    where
        I: IntoIterator<Item = Event>,
    {
        let events: Vec<Event> = events.into_iter().collect();
        if events.is_empty() {
            return Ok(());
        }
        self.wait_for(&Event::all(events, false)?)
    }

    /// Block until `thread` terminates.  Joining oneself fails with
    /// [`SimError::SelfJoin`].
    pub fn join(&self, thread: &ThreadHandle) -> SimResult<()> {
        self.handle.join_thread(thread)
    }

    pub fn join_any(&self, threads: &[ThreadHandle]) -> SimResult<()> {
        if threads.contains(&self.handle) {
            return Err(SimError::SelfJoin { thread: self.handle.0.name.clone() });
        }
        self.wait_for_any(threads.iter().map(|t| t.join_event().clone()))
    }

    pub fn join_all(&self, threads: &[ThreadHandle]) -> SimResult<()> {
        if threads.contains(&self.handle) {
            return Err(SimError::SelfJoin { thread: self.handle.0.name.clone() });
        }
        self.wait_for_all(threads.iter().map(|t| t.join_event().clone()))
    }

    /// Block until every descendant has terminated.  Grandchildren handed up
    /// by a terminating child are joined as well.
    pub fn join_children(&self) -> SimResult<()> {
        loop {
            let children = self.handle.children();
            if children.is_empty() {
                return Ok(());
            }
            self.join_all(&children)?;
        }
    }

    /// Run `f` on the manager thread and return its result.  The calling
    /// thread is `MARSHALLING` until the manager has executed the call.
    pub fn marshal<F, R>(&self, f: F) -> SimResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        crate::marshal::marshal_from_thread(&self.handle, f)
    }

    // ── Forking ───────────────────────────────────────────────────────────

    /// Start a child thread.  It runs once the scheduler reaches it in the
    /// pending queue, after the threads already queued.
    pub fn fork<F>(&self, name: impl Into<String>, body: F) -> SimResult<ThreadHandle>
    where
        F: FnOnce(&ThreadContext) -> ThreadResult + Send + 'static,
    {
        self.handle.0.manager.fork(Some(&self.handle), Some(name.into()), Box::new(body))
    }

    /// Start a child thread named `<prefix>-N`.
    pub fn fork_unnamed<F>(&self, body: F) -> SimResult<ThreadHandle>
    where
        F: FnOnce(&ThreadContext) -> ThreadResult + Send + 'static,
    {
        self.handle.0.manager.fork(Some(&self.handle), None, Box::new(body))
    }

    /// Start one child per body, queued in iteration order.
    pub fn fork_many<I>(&self, bodies: I) -> SimResult<Vec<ThreadHandle>>
    where
        I: IntoIterator<Item = ThreadBody>,
    {
        bodies
            .into_iter()
            .map(|body| self.handle.0.manager.fork(Some(&self.handle), None, body))
            .collect()
    }

    // ── Events and termination ────────────────────────────────────────────

    /// See [`SimulationManager::notify_of`](crate::SimulationManager::notify_of).
    pub fn notify_of(&self, event: &Event) {
        self.handle.0.manager.notify_of(event);
    }

    /// See [`SimulationManager::reset`](crate::SimulationManager::reset).
    pub fn reset(&self, event: &Event) {
        self.handle.0.manager.reset(event);
    }

    pub fn terminate_children(&self) -> SimResult<()> {
        self.handle.terminate_children()
    }

    /// Terminate every thread of the manager, this one included.  Always
    /// returns [`SimError::Terminated`]; the scheduler finishes waiting for
    /// the others.
    pub fn terminate_threads(&self) -> SimResult<()> {
        self.handle.0.manager.terminate_all(Some(&self.handle))
    }

    // ── Randomness ────────────────────────────────────────────────────────

    /// This thread's RNG.  Do not hold the guard across a suspension point.
    pub fn random(&self) -> MutexGuard<'_, SimRng> {
        self.handle.random()
    }

    pub fn set_random(&self, random: SimRng) {
        *self.handle.0.random.lock() = random;
    }

    /// The factory used to seed threads forked from this one.
    pub fn random_factory(&self) -> Arc<dyn RngFactory> {
        self.handle.random_factory()
    }

    pub fn set_random_factory(&self, factory: Arc<dyn RngFactory>) {
        *self.handle.0.random_factory.lock() = factory;
    }
}

impl fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadContext").field(&self.handle).finish()
    }
}
