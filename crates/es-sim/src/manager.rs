//! The simulation manager: pending queue, notifier, and run loop.
//!
//! # Turn passing
//!
//! ```text
//! execute_threads (manager thread):
//!   loop until the pending queue is empty or termination is requested:
//!     ① pop the head of the pending queue
//!     ② PENDING → RUNNING (skipped if the thread terminated meanwhile)
//!     ③ park until the thread leaves RUNNING:
//!          MARSHALLING → run queued calls, hand the turn back, park again
//!          TERMINATED  → surface an unhandled failure, if any
//!          PENDING / BLOCKED → next thread
//! ```
//!
//! # Lock order
//!
//! `notify_guard` → `waiters` → `meta_events` → `pending` → thread monitor.
//! `active` is only ever held alone or with a thread monitor inside it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, ThreadId};

use es_core::{ManagerConfig, ManagerId, RngFactory, SimRng, SimThreadId, ThreadState};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, info, trace, warn};

use crate::builder::SimulationManagerBuilder;
use crate::error::{SimError, SimResult, ThreadResult};
use crate::event::Event;
use crate::marshal::{self, CallMarshaller, MarshalHandle};
use crate::observer::SchedulerObserver;
use crate::tables::{EventThreadsMap, MetaEventMap};
use crate::thread::{self as sim_thread, Cancel, ThreadBody, ThreadContext, ThreadHandle};

static NEXT_MANAGER_ID: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_manager_id() -> ManagerId {
    ManagerId(NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed))
}

// ── ManagerShared ─────────────────────────────────────────────────────────────

/// State shared between the manager and every thread it owns.
pub(crate) struct ManagerShared {
    pub(crate) id:             ManagerId,
    pub(crate) name:           String,
    pub(crate) config:         ManagerConfig,
    pub(crate) manager_thread: ThreadId,

    default_factory: Arc<dyn RngFactory>,
    seed_source:     Mutex<SimRng>,

    active:  Mutex<Vec<ThreadHandle>>,
    pending: Mutex<VecDeque<ThreadHandle>>,

    pub(crate) waiters:      Mutex<EventThreadsMap>,
    pub(crate) meta_events:  Mutex<MetaEventMap>,
    /// Serializes notification cascades and waiter registration.  Reentrant
    /// because a satisfied meta-event is notified from inside the cascade of
    /// its constituent.
    pub(crate) notify_guard: ReentrantMutex<()>,

    terminate_requested: AtomicBool,
    thread_serial:       AtomicU32,

    pub(crate) marshaller: CallMarshaller,
    observers:             Vec<Arc<dyn SchedulerObserver>>,
}

impl ManagerShared {
    pub(crate) fn new(
        id:              ManagerId,
        name:            String,
        config:          ManagerConfig,
        default_factory: Arc<dyn RngFactory>,
        seed_source:     SimRng,
        observers:       Vec<Arc<dyn SchedulerObserver>>,
    ) -> Self {
        Self {
            id,
            name,
            config,
            manager_thread: thread::current().id(),
            default_factory,
            seed_source: Mutex::new(seed_source),
            active: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            waiters: Mutex::new(EventThreadsMap::default()),
            meta_events: Mutex::new(MetaEventMap::default()),
            notify_guard: ReentrantMutex::new(()),
            terminate_requested: AtomicBool::new(false),
            thread_serial: AtomicU32::new(1),
            marshaller: CallMarshaller::default(),
            observers,
        }
    }

    // ── Queues ────────────────────────────────────────────────────────────

    pub(crate) fn push_pending(&self, thread: &ThreadHandle) {
        let mut pending = self.pending.lock();
        assert!(!pending.contains(thread), "{} is already pending", thread.name());
        pending.push_back(thread.clone());
    }

    fn pop_pending(&self) -> Option<ThreadHandle> {
        self.pending.lock().pop_front()
    }

    /// Active threads, minus any that reached `TERMINATED` but have not yet
    /// removed themselves.
    fn live_threads(&self) -> Vec<ThreadHandle> {
        self.active.lock().iter().filter(|t| !t.is_terminated()).cloned().collect()
    }

    pub(crate) fn remove_active(&self, thread: &ThreadHandle) {
        self.active.lock().retain(|t| t != thread);
    }

    /// Drop terminated threads still sitting in the pending queue, and calls
    /// whose simulation caller is gone.  Both hold a thread, which holds the
    /// manager.
    fn purge_terminated(&self) {
        let stale = {
            let mut pending = self.pending.lock();
            let before = pending.len();
            pending.retain(|t| !t.is_terminated());
            before - pending.len()
        };
        let calls = self.marshaller.discard_terminated();
        if stale + calls > 0 {
            trace!(manager = %self.name, threads = stale, calls, "purged terminated");
        }
    }

    // ── Fork ──────────────────────────────────────────────────────────────

    /// Spawn a simulation thread and queue it once it reaches `PENDING`.
    ///
    /// The child's RNG is drawn from the parent's RNG through the parent's
    /// factory, or from the seed source for top-level threads.
    pub(crate) fn fork(
        self:   &Arc<Self>,
        parent: Option<&ThreadHandle>,
        name:   Option<String>,
        body:   ThreadBody,
    ) -> SimResult<ThreadHandle> {
        let (factory, random) = match parent {
            Some(p) => {
                let factory = p.random_factory();
                let random = factory.derive(&mut p.random());
                (factory, random)
            }
            None => {
                let factory = Arc::clone(&self.default_factory);
                let random = factory.derive(&mut self.seed_source.lock());
                (factory, random)
            }
        };

        let serial = self.thread_serial.fetch_add(1, Ordering::Relaxed);
        let name = name.unwrap_or_else(|| format!("{}-{}", self.config.thread_name_prefix, serial));
        let thread = ThreadHandle::new(SimThreadId(serial), name, Arc::clone(self), parent, random, factory);

        if let Some(p) = parent {
            p.add_child(&thread);
        }
        self.active.lock().push(thread.clone());

        let mut builder = thread::Builder::new().name(thread.name().to_string());
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }
        let native = thread.clone();
        if let Err(e) = builder.spawn(move || native.run(body)) {
            warn!(manager = %self.name, thread = %thread.name(), error = %e, "spawn failed");
            if let Some(p) = parent {
                p.remove_child(&thread);
            }
            self.remove_active(&thread);
            thread.set_state(ThreadState::Terminated);
            return Err(SimError::Spawn(e));
        }
        debug!(
            manager = %self.name,
            thread  = %thread.name(),
            parent  = parent.map(ThreadHandle::name),
            "forked"
        );
        self.observe(|o| o.on_thread_forked(&thread));

        let cancel = parent.map_or(Cancel::Never, Cancel::Terminate);
        match thread.wait_for_state(ThreadState::Starting, true, cancel) {
            Ok(ThreadState::Pending) => self.push_pending(&thread),
            Ok(state) => debug_assert_eq!(state, ThreadState::Terminated),
            Err(err) => {
                // Parent terminated mid-handshake: take the child with it.
                thread.request_termination();
                thread.wait_for_state(ThreadState::Terminated, false, Cancel::Never)?;
                return Err(err);
            }
        }
        Ok(thread)
    }

    // ── Notification ──────────────────────────────────────────────────────

    /// Mark `event` occurred, wake its waiters in wait order, and cascade
    /// into every meta-event it satisfies.
    ///
    /// Meta-events are processed in three passes: feed `event` to all of
    /// them, then notify each one that is now satisfied, then reset
    /// (auto-reset ones) and release the references their woken waiters
    /// held.  A meta-event is notified at most once per occurrence, even
    /// when several paths of a nested structure reach it.
    pub(crate) fn notify_of(&self, event: &Event) {
        let _cascade = self.notify_guard.lock();
        event.claim_occurrence();
        let woken = self.cascade(event);
        if event.is_meta() {
            self.meta_events.lock().release(event, woken);
        }
    }

    /// One level of [`notify_of`](Self::notify_of).  Returns how many threads
    /// were waiting directly on `event`.
    fn cascade(&self, event: &Event) -> usize {
        event.set_occurred(true);

        let woken = {
            let mut waiters = self.waiters.lock();
            let threads = waiters.take_threads(event).unwrap_or_default();
            for thread in &threads {
                thread.wake_from_event(event);
                self.push_pending(thread);
            }
            threads.len()
        };
        debug!(manager = %self.name, %event, woken, "notified");
        self.observe(|o| o.on_event_notified(event, woken));

        let Some(metas) = self.meta_events.lock().meta_events(event) else {
            return woken;
        };
        for meta in &metas {
            meta.notify_constituent(event);
        }
        let satisfied: Vec<Event> = metas.into_iter().filter(Event::has_occurred).collect();
        let mut fired = Vec::with_capacity(satisfied.len());
        for meta in satisfied {
            // Skip ones a nested cascade above already delivered.
            if !meta.claim_occurrence() {
                continue;
            }
            debug!(manager = %self.name, %meta, via = %event, "meta-event satisfied");
            let meta_woken = self.cascade(&meta);
            fired.push((meta, meta_woken));
        }
        if !fired.is_empty() {
            let mut meta_events = self.meta_events.lock();
            for (meta, meta_woken) in &fired {
                if meta.is_auto_reset() {
                    meta.reset();
                }
                meta_events.release(meta, *meta_woken);
            }
        }
        woken
    }

    pub(crate) fn reset(&self, event: &Event) {
        let _cascade = self.notify_guard.lock();
        trace!(manager = %self.name, %event, "reset");
        event.reset();
    }

    // ── Termination ───────────────────────────────────────────────────────

    /// Terminate every thread and wait for all of them.  A simulation thread
    /// calling this gets [`SimError::Terminated`] once it is the last one
    /// left to wait for.
    pub(crate) fn terminate_all(&self, caller: Option<&ThreadHandle>) -> SimResult<()> {
        self.terminate_requested.store(true, Ordering::SeqCst);
        let threads = self.active.lock().clone();
        debug!(manager = %self.name, threads = threads.len(), "terminating all threads");
        for thread in &threads {
            thread.request_termination();
        }
        self.wait_all_terminated(caller)?;
        self.purge_terminated();
        Ok(())
    }

    fn wait_all_terminated(&self, caller: Option<&ThreadHandle>) -> SimResult<()> {
        let cancel = caller.map_or(Cancel::Never, Cancel::Terminate);
        loop {
            let next = self.active.lock().iter().find(|t| !t.is_terminated()).cloned();
            match next {
                Some(thread) => {
                    thread.wait_for_state(ThreadState::Terminated, false, cancel)?;
                }
                None => return Ok(()),
            }
        }
    }

    // ── Run loop ──────────────────────────────────────────────────────────

    fn execute(&self) -> SimResult<()> {
        self.terminate_requested.store(false, Ordering::SeqCst);
        debug!(manager = %self.name, "executing threads");

        let mut turns = 0usize;
        while !self.terminate_requested.load(Ordering::SeqCst) {
            let Some(thread) = self.pop_pending() else {
                break;
            };
            if !thread.try_start_turn() {
                debug_assert!(thread.is_terminated(), "{thread} popped while not pending");
                continue;
            }
            turns += 1;

            loop {
                match thread.wait_for_state(ThreadState::Running, true, Cancel::Never)? {
                    ThreadState::Marshalling => {
                        self.marshaller.process_calls(self);
                        thread.resume_after_marshal();
                    }
                    ThreadState::Terminated => {
                        if let Some(failure) = thread.failure() {
                            warn!(manager = %self.name, thread = %thread.name(), %failure, "unhandled failure");
                            return Err(SimError::UnhandledFailure {
                                thread: thread.name().to_string(),
                                id:     thread.id(),
                                failure,
                            });
                        }
                        break;
                    }
                    state => {
                        debug_assert!(state.ends_turn(), "{thread} left RUNNING for {state}");
                        break;
                    }
                }
            }
        }

        if self.terminate_requested.load(Ordering::SeqCst) {
            self.wait_all_terminated(None)?;
            self.purge_terminated();
        }
        debug!(manager = %self.name, turns, "execution suspended");
        Ok(())
    }

    // ── Observers ─────────────────────────────────────────────────────────

    fn observe(&self, f: impl Fn(&dyn SchedulerObserver)) {
        for observer in &self.observers {
            f(observer.as_ref());
        }
    }

    pub(crate) fn observe_state(&self, thread: &ThreadHandle, from: ThreadState, to: ThreadState) {
        self.observe(|o| o.on_thread_state(thread, from, to));
    }

    pub(crate) fn observe_terminated(&self, thread: &ThreadHandle) {
        self.observe(|o| o.on_thread_terminated(thread));
    }

    pub(crate) fn observe_calls(&self, count: usize) {
        self.observe(|o| o.on_calls_processed(count));
    }
}

// ── SimulationManager ─────────────────────────────────────────────────────────

/// Owner of a set of simulation threads and the manager thread's entry
/// point into them.
///
/// The native thread that builds the manager is its *manager thread*: only
/// it may call [`execute_threads`](Self::execute_threads) and
/// [`process_calls`](Self::process_calls).
///
/// Dropping the manager terminates any threads still alive and waits for
/// them to clean up.
pub struct SimulationManager {
    pub(crate) shared: Arc<ManagerShared>,
}

impl SimulationManager {
    /// A manager with default settings, owned by the calling thread.
    pub fn new() -> Self {
        SimulationManagerBuilder::new().assemble()
    }

    pub fn builder() -> SimulationManagerBuilder {
        SimulationManagerBuilder::new()
    }

    pub fn id(&self) -> ManagerId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    pub fn manager_thread(&self) -> ThreadId {
        self.shared.manager_thread
    }

    fn require_manager_thread(&self, operation: &'static str) -> SimResult<()> {
        if sim_thread::current().is_some() {
            return Err(SimError::WrongThread {
                operation,
                reason: "called from a simulation thread",
            });
        }
        if thread::current().id() != self.shared.manager_thread {
            return Err(SimError::WrongThread {
                operation,
                reason: "called from a thread other than the manager thread",
            });
        }
        Ok(())
    }

    // ── Threads ───────────────────────────────────────────────────────────

    /// Start a simulation thread.
    ///
    /// Called from one of this manager's threads, the new thread becomes its
    /// child; otherwise it is top-level.  It first runs when
    /// [`execute_threads`](Self::execute_threads) reaches it.
    pub fn fork<F>(&self, name: impl Into<String>, body: F) -> SimResult<ThreadHandle>
    where
        F: FnOnce(&ThreadContext) -> ThreadResult + Send + 'static,
    {
        let parent = self.current_thread();
        self.shared.fork(parent.as_ref(), Some(name.into()), Box::new(body))
    }

    /// Start a simulation thread named `<prefix>-N`.
    pub fn fork_unnamed<F>(&self, body: F) -> SimResult<ThreadHandle>
    where
        F: FnOnce(&ThreadContext) -> ThreadResult + Send + 'static,
    {
        let parent = self.current_thread();
        self.shared.fork(parent.as_ref(), None, Box::new(body))
    }

    /// Start one thread per body, queued in iteration order.
    pub fn fork_many<I>(&self, bodies: I) -> SimResult<Vec<ThreadHandle>>
    where
        I: IntoIterator<Item = ThreadBody>,
    {
        let parent = self.current_thread();
        bodies
            .into_iter()
            .map(|body| self.shared.fork(parent.as_ref(), None, body))
            .collect()
    }

    /// The calling native thread's simulation thread, if it belongs to this
    /// manager.
    pub fn current_thread(&self) -> Option<ThreadHandle> {
        sim_thread::current().filter(|t| Arc::ptr_eq(t.manager(), &self.shared))
    }

    /// Snapshot of the threads that have not terminated.
    pub fn active_threads(&self) -> Vec<ThreadHandle> {
        self.shared.live_threads()
    }

    /// Whether any thread has not yet terminated.  Manager-side only.
    pub fn has_active_threads(&self) -> SimResult<bool> {
        if self.current_thread().is_some() {
            return Err(SimError::WrongThread {
                operation: "has_active_threads",
                reason:    "called from a simulation thread",
            });
        }
        Ok(!self.shared.live_threads().is_empty())
    }

    // ── Running ───────────────────────────────────────────────────────────

    /// Run pending threads one at a time until none is runnable.
    ///
    /// Returns when the pending queue drains (every live thread is blocked)
    /// or after [`terminate_threads`](Self::terminate_threads) has finished.
    /// A thread that ends with an unhandled error or panic stops the loop
    /// with [`SimError::UnhandledFailure`].
    pub fn execute_threads(&self) -> SimResult<()> {
        self.require_manager_thread("execute_threads")?;
        self.shared.execute()
    }

    /// Terminate every thread and wait for all of them to clean up.
    pub fn terminate_threads(&self) -> SimResult<()> {
        let caller = self.current_thread();
        info!(manager = %self.shared.name, "terminating threads");
        self.shared.terminate_all(caller.as_ref())
    }

    // ── Events ────────────────────────────────────────────────────────────

    /// Mark `event` as occurred and wake everything waiting on it, directly
    /// or through meta-events.  Callable from any thread.
    pub fn notify_of(&self, event: &Event) {
        self.shared.notify_of(event);
    }

    /// Return `event` to its not-occurred state.  Meta-events also forget
    /// which constituents they have seen.  No effect on pulse events or on
    /// [`Event::always`] and [`Event::never`].
    pub fn reset(&self, event: &Event) {
        self.shared.reset(event);
    }

    // ── Marshalling ───────────────────────────────────────────────────────

    /// Execute every call queued for the manager thread.  Returns how many
    /// ran.
    pub fn process_calls(&self) -> SimResult<usize> {
        self.require_manager_thread("process_calls")?;
        Ok(self.shared.marshaller.process_calls(&self.shared))
    }

    /// Whether calls are waiting for the manager thread.
    pub fn has_calls(&self) -> bool {
        self.shared.marshaller.has_calls()
    }

    /// Run `f` on the manager thread from whatever thread is calling.
    pub fn marshal<F, R>(&self, f: F) -> SimResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        marshal::marshal(&self.shared, f)
    }

    /// A `Send` handle other native threads can marshal calls through.
    pub fn marshal_handle(&self) -> MarshalHandle {
        MarshalHandle { manager: Arc::clone(&self.shared) }
    }
}

impl Default for SimulationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SimulationManager {
    fn drop(&mut self) {
        if !self.shared.live_threads().is_empty() {
            if self.current_thread().is_some() {
                warn!(manager = %self.shared.name, "dropped on one of its own threads; leaving threads alive");
                return;
            }
            debug!(manager = %self.shared.name, "dropped with live threads");
            if let Err(e) = self.shared.terminate_all(None) {
                warn!(manager = %self.shared.name, error = %e, "terminating threads on drop failed");
            }
        }
        self.shared.purge_terminated();
    }
}

impl fmt::Display for SimulationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shared.name)
    }
}

impl fmt::Debug for SimulationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationManager")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("active", &self.shared.active.lock().len())
            .finish()
    }
}
