//! Kiln Context
//!
//! Acquires a working rendering context on hardware of unknown capability:
//! - Requested framebuffer/context attributes
//! - Progressive relaxation of those attributes until the driver accepts one
//! - Driver and native window interface boundary
//! - Surface binding with guaranteed teardown

pub mod adapter;
pub mod api;
pub mod attributes;
pub mod driver;
pub mod engine;
pub mod error;
pub mod relax;
pub mod retry;
pub mod sim;
pub mod surface;

pub use api::Api;
pub use attributes::{CapabilityAttributes, ContextPriority, ContextRequest, SurfaceLimits};
pub use driver::{Driver, DriverCapabilities, ErrorCode};
pub use engine::{negotiate_context, LogPolicy, NegotiatedContext, NegotiationEngine};
pub use error::{AttemptFailure, NativeWindowError, NegotiationError, SurfaceError};
pub use retry::{RetryState, Slot, SlotState};
pub use surface::{NativeWindowProvider, RenderContext};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
