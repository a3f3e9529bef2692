//! Protocol implementations.
//!
//! Each protocol runs its per-connection control loop on top of the
//! sequential adapters in `runtime`.
//!
//! - `echo`: newline-delimited echo with a `quit` sentinel

pub mod echo;
