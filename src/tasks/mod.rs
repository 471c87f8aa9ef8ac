//! Background Tasks Module
//!
//! Periodic work owned by providers. Tasks are started explicitly and stopped
//! by the owning provider's `close`.

mod sweep;

pub use sweep::spawn_sweep_task;
