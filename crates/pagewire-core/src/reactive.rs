//! Fine-grained reactive primitives.
//!
//! The graph has two kinds of nodes: [`Signal`]s hold values, [`Effect`]s are
//! computations that read signals. Reading a signal while an effect runs records
//! an edge; writing a signal re-runs its dependents synchronously, in creation
//! order, before `set` returns.

pub mod effect;
pub mod runtime;
pub mod signal;

pub use effect::{Cleanup, Effect, EffectError};
pub use runtime::{NodeId, Runtime, untrack, with_runtime};
pub use signal::Signal;
