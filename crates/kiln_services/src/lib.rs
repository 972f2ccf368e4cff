//! Kiln Services Layer
//!
//! Platform-facing configuration: engine settings and their persistence.

pub mod settings;

pub use settings::{ContextSettings, Settings, SettingsError, WindowSettings};
