//! Logging facilities for Horizon Dataflow.
//!
//! Horizon Dataflow uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("horizon_dataflow=debug")
//!         .init();
//! }
//! ```
//!
//! Every subsystem logs under one of the [`targets`] so that noisy parts
//! (per-pass synchronization traces) can be filtered independently.

/// Span names used throughout Horizon Dataflow for tracing.
pub mod span_names {
    /// A synchronization pass of a data communicator.
    pub const SYNC_PASS: &str = "horizon_dataflow::sync_pass";
    /// Hierarchy flattening.
    pub const FLATTEN: &str = "horizon_dataflow::flatten";
    /// A data provider fetch.
    pub const FETCH: &str = "horizon_dataflow::fetch";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "horizon_dataflow_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_dataflow_core::signal";
    /// Data providers, wrappers and searchers.
    pub const PROVIDER: &str = "horizon_dataflow::provider";
    /// Data communicator synchronization.
    pub const COMMUNICATOR: &str = "horizon_dataflow::communicator";
    /// Hierarchy flattening and expand/collapse bookkeeping.
    pub const HIERARCHY: &str = "horizon_dataflow::hierarchy";
    /// Key mapping between items and client keys.
    pub const KEY_MAPPER: &str = "horizon_dataflow::key_mapper";
}

/// A guard that records a performance span for profiling.
///
/// # Example
///
/// ```ignore
/// use horizon_dataflow_core::logging::PerfSpan;
///
/// fn flatten() {
///     let _span = PerfSpan::new("flatten");
///     // ... work ...
/// }
/// ```
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::trace_span!(target: "horizon_dataflow::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Trace-level log under the core target.
#[macro_export]
macro_rules! dataflow_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "horizon_dataflow_core", $($arg)*)
    };
}

/// Debug-level log under the core target.
#[macro_export]
macro_rules! dataflow_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "horizon_dataflow_core", $($arg)*)
    };
}
