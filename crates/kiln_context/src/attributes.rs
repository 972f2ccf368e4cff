//! Requested framebuffer and context attributes

use crate::Api;
use serde::{Deserialize, Serialize};

/// Context scheduling priority hint, ordered lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContextPriority {
    Low,
    Medium,
    High,
}

impl ContextPriority {
    /// Value sent with the priority extension's attribute key.
    pub fn to_raw(self) -> i32 {
        match self {
            ContextPriority::High => 0x3101,
            ContextPriority::Medium => 0x3102,
            ContextPriority::Low => 0x3103,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0x3101 => Some(ContextPriority::High),
            0x3102 => Some(ContextPriority::Medium),
            0x3103 => Some(ContextPriority::Low),
            _ => None,
        }
    }
}

impl Default for ContextPriority {
    fn default() -> Self {
        ContextPriority::Medium
    }
}

/// Framebuffer/context capabilities asked of the driver.
///
/// Bit counts are targets, not guarantees: the negotiated result reports what
/// the chosen configuration actually provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityAttributes {
    pub red_bits: u32,
    pub green_bits: u32,
    pub blue_bits: u32,
    pub alpha_bits: u32,
    pub depth_bits: u32,
    pub stencil_bits: u32,
    /// MSAA sample count, 0 = disabled
    pub aa_samples: u32,
    /// Fail rather than accept a colour format other than the one requested
    pub force_exact_color_bpp: bool,
    pub debug_context: bool,
    pub context_priority: ContextPriority,
    /// Skip the search and use this configuration id
    pub explicit_config_id: Option<i32>,
}

impl CapabilityAttributes {
    /// Copy with depth/stencil clamped to what the platform can express.
    pub fn clamped(&self, limits: SurfaceLimits) -> Self {
        Self {
            depth_bits: self.depth_bits.min(limits.max_depth_bits),
            stencil_bits: self.stencil_bits.min(limits.max_stencil_bits),
            ..*self
        }
    }

    pub fn color_matches(&self, red: u32, green: u32, blue: u32, alpha: u32) -> bool {
        self.red_bits == red
            && self.green_bits == green
            && self.blue_bits == blue
            && self.alpha_bits == alpha
    }
}

impl Default for CapabilityAttributes {
    fn default() -> Self {
        Self {
            red_bits: 8,
            green_bits: 8,
            blue_bits: 8,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 0,
            aa_samples: 0,
            force_exact_color_bpp: false,
            debug_context: cfg!(debug_assertions),
            context_priority: ContextPriority::Medium,
            explicit_config_id: None,
        }
    }
}

/// Largest depth/stencil sizes sent to config enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLimits {
    pub max_depth_bits: u32,
    pub max_stencil_bits: u32,
}

impl SurfaceLimits {
    pub const DEFAULT_MAX_DEPTH_BITS: u32 = 24;
    pub const DEFAULT_MAX_STENCIL_BITS: u32 = 8;
}

impl Default for SurfaceLimits {
    fn default() -> Self {
        Self {
            max_depth_bits: Self::DEFAULT_MAX_DEPTH_BITS,
            max_stencil_bits: Self::DEFAULT_MAX_STENCIL_BITS,
        }
    }
}

/// Everything a caller asks for when acquiring a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextRequest {
    pub attributes: CapabilityAttributes,
    pub min_api: Api,
    pub max_api: Api,
}

impl Default for ContextRequest {
    fn default() -> Self {
        Self {
            attributes: CapabilityAttributes::default(),
            min_api: Api::OpenGLES2,
            max_api: Api::OpenGLES32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limits_depth_and_stencil() {
        let attrs = CapabilityAttributes {
            depth_bits: 32,
            stencil_bits: 16,
            ..Default::default()
        };
        let clamped = attrs.clamped(SurfaceLimits::default());
        assert_eq!(clamped.depth_bits, 24);
        assert_eq!(clamped.stencil_bits, 8);
        assert_eq!(clamped.red_bits, attrs.red_bits);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let attrs: CapabilityAttributes = serde_json::from_str(r#"{ "stencil_bits": 8 }"#).unwrap();
        assert_eq!(attrs.stencil_bits, 8);
        assert_eq!(attrs.depth_bits, 24);
        assert_eq!(attrs.context_priority, ContextPriority::Medium);
        assert_eq!(attrs.explicit_config_id, None);
    }

    #[test]
    fn priority_raw_values() {
        for priority in [ContextPriority::Low, ContextPriority::Medium, ContextPriority::High] {
            assert_eq!(ContextPriority::from_raw(priority.to_raw()), Some(priority));
        }
        assert_eq!(ContextPriority::from_raw(0), None);
    }
}
