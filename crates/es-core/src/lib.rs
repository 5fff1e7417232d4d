//! `es-core` — foundational types for the `rust_evsim` cooperative scheduler.
//!
//! This crate is a dependency of every other `es-*` crate.  It has no `es-*`
//! dependencies and minimal external ones (only `rand` and `thiserror`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module      | Contents                                                  |
//! |-------------|-----------------------------------------------------------|
//! | [`ids`]     | `EventId`, `SimThreadId`, `ManagerId`                     |
//! | [`state`]   | `ThreadState` — the simulation-thread state machine       |
//! | [`rng`]     | `SimRng`, `RngFactory`, `MixingRngFactory`                |
//! | [`config`]  | `ManagerConfig`                                           |
//! | [`error`]   | `CoreError`, `CoreResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to ids, states, and config. |

pub mod config;
pub mod error;
pub mod ids;
pub mod rng;
pub mod state;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::ManagerConfig;
pub use error::{CoreError, CoreResult};
pub use ids::{EventId, ManagerId, SimThreadId};
pub use rng::{MixingRngFactory, RngFactory, SimRng};
pub use state::ThreadState;
