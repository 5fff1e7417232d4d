//! Marshalling: running a closure on the manager thread on behalf of another
//! thread.
//!
//! A simulation thread that marshals a call enters `MARSHALLING`; the
//! scheduler notices, drains the call queue, and hands the turn back.  A
//! native thread outside the simulation parks on a private monitor until the
//! manager thread drains the queue with
//! [`SimulationManager::process_calls`](crate::SimulationManager::process_calls).
//! A call made on the manager thread itself runs inline.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use es_core::ThreadState;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::error::{SimError, SimResult, panic_message};
use crate::event::Event;
use crate::manager::ManagerShared;
use crate::thread::{self as sim_thread, Cancel, ThreadHandle};

type Slot<R> = Arc<Mutex<Option<thread::Result<R>>>>;

enum CallSource {
    Simulation(ThreadHandle),
    Native(Arc<NativeWaiter>),
}

#[derive(Default)]
struct NativeWaiter {
    done:    Mutex<bool>,
    changed: Condvar,
}

struct MarshalledCall {
    source:     CallSource,
    completion: Event,
    invoke:     Box<dyn FnOnce() + Send>,
}

impl MarshalledCall {
    fn new<F, R>(source: CallSource, f: F) -> (Self, Slot<R>)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let slot: Slot<R> = Arc::new(Mutex::new(None));
        let out = Arc::clone(&slot);
        let invoke = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f));
            *out.lock() = Some(result);
        });
        let call = MarshalledCall {
            source,
            completion: Event::unnamed_step(),
            invoke,
        };
        (call, slot)
    }
}

fn take_result<R>(slot: &Slot<R>) -> SimResult<R> {
    match slot.lock().take() {
        Some(Ok(value)) => Ok(value),
        Some(Err(payload)) => Err(SimError::MarshalledCallFailed { reason: panic_message(payload) }),
        None => Err(SimError::MarshalledCallFailed { reason: "call was never executed".into() }),
    }
}

// ── Call queue ────────────────────────────────────────────────────────────────

/// FIFO of calls waiting for the manager thread.
#[derive(Default)]
pub(crate) struct CallMarshaller {
    queue: Mutex<VecDeque<MarshalledCall>>,
}

impl CallMarshaller {
    pub(crate) fn has_calls(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    fn push(&self, call: MarshalledCall) {
        self.queue.lock().push_back(call);
    }

    /// Drop calls whose simulation caller has terminated.  Returns how many.
    pub(crate) fn discard_terminated(&self) -> usize {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|call| match &call.source {
            CallSource::Simulation(thread) => !thread.is_terminated(),
            CallSource::Native(_) => true,
        });
        before - queue.len()
    }

    /// Execute every queued call, including ones queued while draining.
    /// Must run on the manager thread.
    pub(crate) fn process_calls(&self, manager: &ManagerShared) -> usize {
        let mut count = 0;
        loop {
            let Some(call) = self.queue.lock().pop_front() else {
                break;
            };
            (call.invoke)();
            count += 1;
            match call.source {
                CallSource::Simulation(thread) => {
                    // The thread is parked waiting for RUNNING, not on the
                    // event; the scheduler resumes it.
                    if !thread.clear_marshal_completion(&call.completion) {
                        manager.notify_of(&call.completion);
                    }
                }
                CallSource::Native(waiter) => {
                    call.completion.set_occurred(true);
                    *waiter.done.lock() = true;
                    waiter.changed.notify_all();
                }
            }
        }
        if count > 0 {
            debug!(manager = %manager.name, calls = count, "processed marshalled calls");
            manager.observe_calls(count);
        }
        count
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Marshal from a simulation thread's own context.
pub(crate) fn marshal_from_thread<F, R>(thread: &ThreadHandle, f: F) -> SimResult<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (call, slot) = MarshalledCall::new(CallSource::Simulation(thread.clone()), f);
    let completion = call.completion.clone();
    trace!(thread = %thread.name(), "marshalling call");
    thread.manager().marshaller.push(call);
    thread.enter_marshalling(&completion);
    thread.wait_for_state(ThreadState::Running, false, Cancel::Terminate(thread))?;
    take_result(&slot)
}

/// Marshal from whatever context the caller is in.
pub(crate) fn marshal<F, R>(manager: &Arc<ManagerShared>, f: F) -> SimResult<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if thread::current().id() == manager.manager_thread {
        return panic::catch_unwind(AssertUnwindSafe(f))
            .map_err(|payload| SimError::MarshalledCallFailed { reason: panic_message(payload) });
    }
    if let Some(current) = sim_thread::current() {
        if Arc::ptr_eq(current.manager(), manager) {
            return marshal_from_thread(&current, f);
        }
    }

    let waiter = Arc::new(NativeWaiter::default());
    let (call, slot) = MarshalledCall::new(CallSource::Native(Arc::clone(&waiter)), f);
    manager.marshaller.push(call);
    let mut done = waiter.done.lock();
    while !*done {
        waiter.changed.wait(&mut done);
    }
    drop(done);
    take_result(&slot)
}

/// A cloneable, `Send` handle for marshalling calls onto a manager's thread.
///
/// Works from any native thread.  Calls from threads outside the simulation
/// block until the manager thread runs
/// [`SimulationManager::process_calls`](crate::SimulationManager::process_calls)
/// or [`execute_threads`](crate::SimulationManager::execute_threads).
#[derive(Clone)]
pub struct MarshalHandle {
    pub(crate) manager: Arc<ManagerShared>,
}

impl MarshalHandle {
    pub fn call<F, R>(&self, f: F) -> SimResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        marshal(&self.manager, f)
    }

    /// Whether calls are queued for the manager thread.
    pub fn has_calls(&self) -> bool {
        self.manager.marshaller.has_calls()
    }
}

impl std::fmt::Debug for MarshalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarshalHandle").field("manager", &self.manager.name).finish()
    }
}
