//! Driver interface boundary
//!
//! Mirrors the entry points of an EGL-style driver. Fallible calls return
//! `None` and leave a code in the driver's last-error register, which
//! `last_error` reads and clears.

use crate::attributes::SurfaceLimits;
use crate::{Api, NegotiationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque native display from the window system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NativeDisplay(pub u64);

/// Opaque native window from the window system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NativeWindow(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DisplayHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConfigHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// Driver error code (EGL numbering).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const SUCCESS: Self = Self(0x3000);
    pub const NOT_INITIALIZED: Self = Self(0x3001);
    pub const BAD_ACCESS: Self = Self(0x3002);
    pub const BAD_ALLOC: Self = Self(0x3003);
    pub const BAD_ATTRIBUTE: Self = Self(0x3004);
    pub const BAD_CONFIG: Self = Self(0x3005);
    pub const BAD_CONTEXT: Self = Self(0x3006);
    pub const BAD_CURRENT_SURFACE: Self = Self(0x3007);
    pub const BAD_DISPLAY: Self = Self(0x3008);
    pub const BAD_MATCH: Self = Self(0x3009);
    pub const BAD_NATIVE_PIXMAP: Self = Self(0x300A);
    pub const BAD_NATIVE_WINDOW: Self = Self(0x300B);
    pub const BAD_PARAMETER: Self = Self(0x300C);
    pub const BAD_SURFACE: Self = Self(0x300D);
    pub const CONTEXT_LOST: Self = Self(0x300E);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// `None` for [`ErrorCode::SUCCESS`], the code otherwise.
    pub fn failure(self) -> Option<Self> {
        (!self.is_success()).then_some(self)
    }

    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::SUCCESS => "SUCCESS",
            Self::NOT_INITIALIZED => "NOT_INITIALIZED",
            Self::BAD_ACCESS => "BAD_ACCESS",
            Self::BAD_ALLOC => "BAD_ALLOC",
            Self::BAD_ATTRIBUTE => "BAD_ATTRIBUTE",
            Self::BAD_CONFIG => "BAD_CONFIG",
            Self::BAD_CONTEXT => "BAD_CONTEXT",
            Self::BAD_CURRENT_SURFACE => "BAD_CURRENT_SURFACE",
            Self::BAD_DISPLAY => "BAD_DISPLAY",
            Self::BAD_MATCH => "BAD_MATCH",
            Self::BAD_NATIVE_PIXMAP => "BAD_NATIVE_PIXMAP",
            Self::BAD_NATIVE_WINDOW => "BAD_NATIVE_WINDOW",
            Self::BAD_PARAMETER => "BAD_PARAMETER",
            Self::BAD_SURFACE => "BAD_SURFACE",
            Self::CONTEXT_LOST => "CONTEXT_LOST",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:04X})", self.0),
            None => write!(f, "unknown error (0x{:04X})", self.0),
        }
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorCode({self})")
    }
}

/// Keys of a config attribute list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    RedSize,
    GreenSize,
    BlueSize,
    AlphaSize,
    DepthSize,
    StencilSize,
    SampleBuffers,
    Samples,
    RenderableType,
    ConfigId,
}

/// Keys of a context attribute list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// Major version, for drivers without the create-context extension
    ClientVersion,
    MajorVersion,
    MinorVersion,
    /// Context flag bits; see [`CONTEXT_FLAG_DEBUG`]
    Flags,
    Priority,
}

pub const CONTEXT_FLAG_DEBUG: i32 = 0x0001;

/// What a config actually provides, queried back from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDescription {
    pub config_id: i32,
    pub red_bits: u32,
    pub green_bits: u32,
    pub blue_bits: u32,
    pub alpha_bits: u32,
    pub depth_bits: u32,
    pub stencil_bits: u32,
    pub samples: u32,
}

/// Driver string queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryName {
    Vendor,
    Version,
    Extensions,
}

pub const EXT_CREATE_CONTEXT: &str = "EGL_KHR_create_context";
pub const EXT_CONTEXT_PRIORITY: &str = "EGL_IMG_context_priority";

/// Graphics driver entry points.
///
/// Implementations must keep a last-error register: every failing call sets
/// it, `last_error` returns it and resets it to [`ErrorCode::SUCCESS`].
pub trait Driver {
    fn get_display(&mut self, native: NativeDisplay) -> Option<DisplayHandle>;

    /// Initialize the display, returning the driver's (major, minor) version.
    fn initialize(&mut self, display: DisplayHandle) -> Option<(i32, i32)>;

    fn terminate(&mut self, display: DisplayHandle) -> bool;

    fn bind_api(&mut self) -> bool;

    fn query_string(&mut self, display: DisplayHandle, name: QueryName) -> Option<String>;

    /// Configs matching `attribs`, in driver preference order.
    fn choose_configs(
        &mut self,
        display: DisplayHandle,
        attribs: &[(ConfigKey, i32)],
    ) -> Option<Vec<ConfigHandle>>;

    fn describe_config(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
    ) -> Option<ConfigDescription>;

    fn create_context(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
        attribs: &[(ContextKey, i32)],
    ) -> Option<ContextHandle>;

    fn destroy_context(&mut self, display: DisplayHandle, context: ContextHandle) -> bool;

    /// Read back an attribute of a created context, as the driver granted it.
    fn query_context(
        &mut self,
        display: DisplayHandle,
        context: ContextHandle,
        key: ContextKey,
    ) -> Option<i32>;

    fn create_window_surface(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
        window: NativeWindow,
    ) -> Option<SurfaceHandle>;

    fn destroy_surface(&mut self, display: DisplayHandle, surface: SurfaceHandle) -> bool;

    /// `None` for both surface and context releases the current binding.
    fn make_current(
        &mut self,
        display: DisplayHandle,
        surface: Option<SurfaceHandle>,
        context: Option<ContextHandle>,
    ) -> bool;

    fn swap_buffers(&mut self, display: DisplayHandle, surface: SurfaceHandle) -> bool;

    fn last_error(&mut self) -> ErrorCode;
}

/// Runtime capability probe, taken once before negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCapabilities {
    pub max_api: Api,
    pub supports_create_context: bool,
    pub supports_context_priority: bool,
    pub limits: SurfaceLimits,
}

impl DriverCapabilities {
    /// Probe extensions and the newest API any config can render.
    ///
    /// Fails when no config supports even the oldest API, carrying the last
    /// error the driver raised along the way, if any.
    pub fn probe<D: Driver + ?Sized>(
        driver: &mut D,
        display: DisplayHandle,
    ) -> Result<Self, NegotiationError> {
        let extensions = driver
            .query_string(display, QueryName::Extensions)
            .unwrap_or_default();
        // A missing extension string is not an error worth keeping around
        driver.last_error();

        let has = |name: &str| extensions.split_whitespace().any(|ext| ext == name);
        let supports_create_context = has(EXT_CREATE_CONTEXT);
        let supports_context_priority = has(EXT_CONTEXT_PRIORITY);

        let mut observed = None;
        let max_api = Api::NEWEST_FIRST.into_iter().find(|api| {
            api_supported(driver, display, *api, supports_create_context, &mut observed)
        });
        let Some(max_api) = max_api else {
            return Err(NegotiationError::DriverUnavailable {
                stage: "capability probe",
                code: observed,
            });
        };

        Ok(Self {
            max_api,
            supports_create_context,
            supports_context_priority,
            limits: SurfaceLimits::default(),
        })
    }
}

fn api_supported<D: Driver + ?Sized>(
    driver: &mut D,
    display: DisplayHandle,
    api: Api,
    supports_create_context: bool,
    observed: &mut Option<ErrorCode>,
) -> bool {
    let mut note = |driver: &mut D| {
        if let Some(code) = driver.last_error().failure() {
            *observed = Some(code);
        }
    };

    if api.needs_create_context_extension() && !supports_create_context {
        return false;
    }
    let attribs = [(ConfigKey::RenderableType, api.renderable_bit())];
    let Some(configs) = driver.choose_configs(display, &attribs) else {
        note(&mut *driver);
        return false;
    };
    if !api.needs_create_context_extension() {
        return !configs.is_empty();
    }

    // 3.x minor versions share a renderable bit; only a trial context tells them apart.
    // Any config will do, a single one may be refused for unrelated reasons.
    let attribs = [
        (ContextKey::MajorVersion, api.major()),
        (ContextKey::MinorVersion, api.minor()),
    ];
    for config in configs {
        let Some(context) = driver.create_context(display, config, &attribs) else {
            note(&mut *driver);
            continue;
        };
        if !driver.destroy_context(display, context) {
            let code = driver.last_error();
            tracing::warn!(%code, "failed to destroy probe context");
        }
        driver.last_error();
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_display() {
        assert_eq!(ErrorCode::BAD_MATCH.to_string(), "BAD_MATCH (0x3009)");
        assert_eq!(ErrorCode(0x1234).to_string(), "unknown error (0x1234)");
        assert!(ErrorCode::SUCCESS.is_success());
        assert_eq!(ErrorCode::SUCCESS.failure(), None);
        assert_eq!(ErrorCode::BAD_ALLOC.failure(), Some(ErrorCode::BAD_ALLOC));
    }
}
