//! Strongly typed identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can key the scheduler's maps and
//! give events and threads a stable identity independent of their names.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty) => $label:literal;) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// The raw integer value.
            #[inline(always)]
            pub fn get(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }

        impl From<$name> for $inner {
            #[inline(always)]
            fn from(id: $name) -> $inner {
                id.0
            }
        }
    };
}

typed_id! {
    /// Identity of an event.  Allocated process-wide so events can be shared
    /// between managers, as long as each wait goes through one manager.
    pub struct EventId(u64) => "Event";
}

typed_id! {
    /// Identity of a simulation thread, unique within its manager.
    pub struct SimThreadId(u32) => "Thread";
}

typed_id! {
    /// Identity of a simulation manager, unique within the process.
    pub struct ManagerId(u32) => "Manager";
}
