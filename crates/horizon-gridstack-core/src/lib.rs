//! Core systems for Horizon GridStack.
//!
//! This crate provides the foundational components of the GridStack layer
//! engine:
//!
//! - **Signal/Slot System**: Type-safe, synchronous change notification
//! - **Logging**: `tracing` target constants for per-subsystem filtering
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_gridstack_core::Signal;
//!
//! // Create a signal that notifies when a value changes
//! let value_changed = Signal::<i32>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! // Emit the signal
//! value_changed.emit(42);
//!
//! // Disconnect when done
//! value_changed.disconnect(conn_id);
//! ```

pub mod logging;
pub mod signal;

pub use signal::{ConnectionGuard, ConnectionId, Signal};
