//! Core systems for Horizon Dataflow.
//!
//! This crate provides the foundational pieces shared by the data layer:
//!
//! - **Signal/Slot System**: Type-safe change notification used by data
//!   providers to announce refreshes
//! - **Logging**: `tracing` targets, span names and a perf span guard
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_dataflow_core::Signal;
//! use std::sync::Arc;
//!
//! let changed = Arc::new(Signal::<u32>::new());
//!
//! let guard = changed.connect_scoped(|size| {
//!     println!("Size is now {}", size);
//! });
//!
//! changed.emit(42);
//! drop(guard);
//! assert_eq!(changed.connection_count(), 0);
//! ```

pub mod logging;
pub mod signal;

pub use logging::PerfSpan;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
