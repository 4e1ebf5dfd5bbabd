//! simstub-target: the architecture-neutral processor interface.
//!
//! A simulator exposes its core to the debug stub by implementing
//! [`TargetAdapter`]. The crate also ships [`FlatTarget`], a reference
//! machine with flat RAM and a plain register file used by the demo
//! binary and by tests.

pub mod adapter;
pub mod error;
pub mod flat;
pub mod signal;

pub use adapter::{Execution, TargetAdapter};
pub use error::AdapterFault;
pub use flat::{FlatTarget, FlatTargetConfig};
pub use signal::Signal;
