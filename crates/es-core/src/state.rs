//! The simulation-thread state machine.
//!
//! ```text
//! STARTING ──► PENDING ◄──────────── BLOCKED
//!                │  ▲                   ▲
//!     scheduler  ▼  │ yield             │ wait_for
//!              RUNNING ─────────────────┘
//!               │  ▲
//!       marshal ▼  │ scheduler
//!            MARSHALLING
//!
//! any non-TERMINATED state ──► TERMINATED
//! ```

/// Where a simulation thread is in its lifecycle.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThreadState {
    /// Native thread spawned; user code has not been reached yet.
    #[default]
    Starting,
    /// Ready to run; sitting in the manager's pending queue.
    Pending,
    /// Holds the turn.  At most one thread per manager is in this state.
    Running,
    /// Waiting for the manager thread to execute a marshalled call.
    Marshalling,
    /// Waiting on an event.
    Blocked,
    /// Finished, either normally, by failure, or by cancellation.
    Terminated,
}

impl ThreadState {
    /// `true` once the thread has finished and will never run again.
    #[inline]
    pub fn is_terminated(self) -> bool {
        matches!(self, ThreadState::Terminated)
    }

    /// `true` for the states a turn can end in: the scheduler moves on to the
    /// next pending thread once it observes one of these.
    #[inline]
    pub fn ends_turn(self) -> bool {
        matches!(
            self,
            ThreadState::Pending | ThreadState::Blocked | ThreadState::Terminated
        )
    }

    /// Upper-case label used in logs and `Display` output.
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadState::Starting    => "STARTING",
            ThreadState::Pending     => "PENDING",
            ThreadState::Running     => "RUNNING",
            ThreadState::Marshalling => "MARSHALLING",
            ThreadState::Blocked     => "BLOCKED",
            ThreadState::Terminated  => "TERMINATED",
        }
    }
}

impl std::fmt::Display for ThreadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
