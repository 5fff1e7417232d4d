//! Scheduler observer trait for tracing and test instrumentation.

use es_core::ThreadState;

use crate::event::Event;
use crate::thread::ThreadHandle;

/// Callbacks invoked by a [`SimulationManager`](crate::SimulationManager) as
/// threads move through their lifecycle.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Callbacks run on whichever native
/// thread caused the change, sometimes while the scheduler's tables are
/// locked: they must not call back into the manager or suspend.
///
/// # Example: counting turns
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct TurnCounter(AtomicUsize);
///
/// impl SchedulerObserver for TurnCounter {
///     fn on_thread_state(&self, _t: &ThreadHandle, _from: ThreadState, to: ThreadState) {
///         if to == ThreadState::Running {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait SchedulerObserver: Send + Sync + 'static {
    /// A thread was spawned and registered, before it first runs.
    fn on_thread_forked(&self, _thread: &ThreadHandle) {}

    /// A thread changed state.
    fn on_thread_state(&self, _thread: &ThreadHandle, _from: ThreadState, _to: ThreadState) {}

    /// A thread finished cleanup and left the manager.
    fn on_thread_terminated(&self, _thread: &ThreadHandle) {}

    /// `event` was notified; `woken` threads were moved to the pending queue
    /// directly (meta-event cascades report separately).
    fn on_event_notified(&self, _event: &Event, _woken: usize) {}

    /// The manager thread executed `count` marshalled calls.
    fn on_calls_processed(&self, _count: usize) {}
}

/// A [`SchedulerObserver`] that does nothing.
pub struct NoopObserver;

impl SchedulerObserver for NoopObserver {}
