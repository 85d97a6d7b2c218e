//! Logging facilities for Horizon GridStack.
//!
//! GridStack uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! use tracing_subscriber;
//!
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     // Your application code...
//! }
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "horizon_gridstack_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_gridstack_core::signal";
    /// Layer engine target.
    pub const LAYER: &str = "horizon_gridstack::layer";
    /// Command dispatch target.
    pub const COMMAND: &str = "horizon_gridstack::command";
    /// Event propagation target.
    pub const EVENT: &str = "horizon_gridstack::event";
}
