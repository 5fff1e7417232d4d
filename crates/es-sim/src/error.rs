use std::error::Error;
use std::io;
use std::sync::Arc;

use es_core::{CoreError, SimThreadId};
use thiserror::Error;

use crate::event::EventKind;

#[derive(Debug, Error)]
pub enum SimError {
    /// An operation was invoked from a context that may not perform it.
    #[error("{operation} cannot be called here: {reason}")]
    WrongThread {
        operation: &'static str,
        reason:    &'static str,
    },

    /// The calling simulation thread was terminated while suspended.
    /// Propagate it out of the thread body; the scheduler absorbs it.
    #[error("simulation thread {thread} was terminated")]
    Terminated { thread: String },

    /// The calling simulation thread was interrupted while suspended.
    #[error("simulation thread {thread} was interrupted")]
    Interrupted { thread: String },

    /// A simulation thread ended with an error or panic that its body did
    /// not handle.  Reported by `execute_threads`.
    #[error("unhandled failure in simulation thread {thread} ({id})")]
    UnhandledFailure {
        thread: String,
        id:     SimThreadId,
        #[source]
        failure: Arc<ThreadFailure>,
    },

    #[error("{kind} needs at least one constituent event")]
    EmptyMetaEvent { kind: EventKind },

    #[error("simulation thread {thread} cannot join itself")]
    SelfJoin { thread: String },

    #[error("marshalled call failed: {reason}")]
    MarshalledCallFailed { reason: String },

    #[error("failed to spawn simulation thread: {0}")]
    Spawn(#[source] io::Error),

    /// A wait hook refused the wait.
    #[error("wait on {event} refused: {reason}")]
    Hook { event: String, reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SimResult<T> = Result<T, SimError>;

/// What a simulation thread body returns.  Any error type converts with `?`.
pub type ThreadResult = Result<(), Box<dyn Error + Send + Sync + 'static>>;

/// Why a simulation thread ended abnormally.
#[derive(Debug, Error)]
pub enum ThreadFailure {
    #[error("{0}")]
    Error(Box<dyn Error + Send + Sync + 'static>),

    #[error("panicked: {0}")]
    Panic(String),
}

impl ThreadFailure {
    /// The error the body returned, if it returned one rather than panicking.
    pub fn as_error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            ThreadFailure::Error(e) => Some(e.as_ref()),
            ThreadFailure::Panic(_) => None,
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        ThreadFailure::Panic(panic_message(payload))
    }
}

pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
