#![forbid(unsafe_code)]

//! Core: container geometry, recompute triggers, and room membership.
//!
//! Everything here is host-agnostic. The layout solver and the scheduler build
//! on these types; the browser embedding feeds them.

pub mod event;
pub mod geometry;
pub mod logging;
pub mod room;

pub use event::TriggerSource;
pub use geometry::ContainerSize;
pub use room::{ConsumerSource, RoomMembership};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, trace, trace_span, warn};
