//! `es-sim` — deterministic cooperative scheduling of simulation threads.
//!
//! Simulation threads are native threads that take turns: at most one of a
//! manager's threads executes user code at any instant, and the turn passes
//! only when the running thread yields, blocks on an event, marshals a call,
//! or terminates.  Given the same program and seed, every run interleaves
//! the threads identically.
//!
//! # Modules
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`event`]    | `Event` (step, pulse, all, any, order), `WaitHooks`        |
//! | [`thread`]   | `ThreadHandle`, `ThreadContext`                            |
//! | [`manager`]  | `SimulationManager`: fork, notify, execute, terminate      |
//! | [`marshal`]  | `MarshalHandle`: calls run on the manager thread           |
//! | [`builder`]  | `SimulationManagerBuilder`                                 |
//! | [`observer`] | `SchedulerObserver`, `NoopObserver`                        |
//! | [`error`]    | `SimError`, `ThreadFailure`, `SimResult`, `ThreadResult`   |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use es_sim::{Event, SimulationManager};
//!
//! let manager = SimulationManager::new();
//! let ready = Event::step("ready");
//!
//! let waiter = {
//!     let ready = ready.clone();
//!     manager.fork("waiter", move |ctx| {
//!         ctx.wait_for(&ready)?;
//!         Ok(())
//!     })?
//! };
//! manager.fork("signaller", move |ctx| {
//!     ctx.notify_of(&ready);
//!     Ok(())
//! })?;
//!
//! manager.execute_threads()?;
//! assert!(waiter.is_terminated());
//! ```
//!
//! # Errors inside thread bodies
//!
//! Every suspending operation returns `SimResult`.  A body should propagate
//! [`SimError::Terminated`] with `?`; the scheduler treats it as a normal
//! exit.  Any other error (or a panic) is recorded on the thread and stops
//! [`SimulationManager::execute_threads`] with
//! [`SimError::UnhandledFailure`].

pub mod builder;
pub mod error;
pub mod event;
pub mod manager;
pub mod marshal;
pub mod observer;
pub mod thread;

mod tables;


pub use builder::SimulationManagerBuilder;
pub use error::{SimError, SimResult, ThreadFailure, ThreadResult};
pub use event::{Event, EventKind, WaitHooks};
pub use manager::SimulationManager;
pub use marshal::MarshalHandle;
pub use observer::{NoopObserver, SchedulerObserver};
pub use thread::{ThreadBody, ThreadContext, ThreadHandle};

pub use es_core::{ManagerConfig, MixingRngFactory, RngFactory, SimRng, SimThreadId, ThreadState};
