//! Simulated driver
//!
//! A software stand-in for a real driver: configs, extensions and context
//! rejection rules come from a [`DriverProfile`]. It keeps a read-and-clear
//! last-error register and counts calls and live objects, so it can run the
//! engine headless and check it for leaks.

use crate::driver::{
    ConfigDescription, ConfigHandle, ConfigKey, ContextHandle, ContextKey, DisplayHandle, Driver,
    ErrorCode, NativeDisplay, NativeWindow, QueryName, SurfaceHandle, CONTEXT_FLAG_DEBUG,
    EXT_CONTEXT_PRIORITY, EXT_CREATE_CONTEXT,
};
use crate::surface::NativeWindowProvider;
use crate::{Api, ContextPriority, NativeWindowError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Declarative reason for a simulated driver to refuse a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ContextRule {
    RejectDebug,
    MaxSamples { samples: u32 },
    MaxDepthBits { bits: u32 },
    RejectStencil,
    RejectPriority { priority: ContextPriority },
}

impl ContextRule {
    pub fn check(
        &self,
        config: &ConfigDescription,
        request: &RequestedContext,
    ) -> Option<ErrorCode> {
        let rejected = match *self {
            ContextRule::RejectDebug => request.debug,
            ContextRule::MaxSamples { samples } => config.samples > samples,
            ContextRule::MaxDepthBits { bits } => config.depth_bits > bits,
            ContextRule::RejectStencil => config.stencil_bits > 0,
            ContextRule::RejectPriority { priority } => request.priority == priority,
        };
        rejected.then_some(ErrorCode::BAD_MATCH)
    }
}

/// Everything the simulated driver pretends to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverProfile {
    pub vendor: String,
    pub version: (i32, i32),
    /// Newest API any config can render
    pub max_api: Api,
    pub extensions: Vec<String>,
    /// Highest priority granted; higher requests are quietly lowered
    pub max_priority: ContextPriority,
    pub configs: Vec<ConfigDescription>,
    pub rules: Vec<ContextRule>,
}

impl Default for DriverProfile {
    fn default() -> Self {
        let config = |config_id, (r, g, b, a), depth_bits, stencil_bits, samples| {
            ConfigDescription {
                config_id,
                red_bits: r,
                green_bits: g,
                blue_bits: b,
                alpha_bits: a,
                depth_bits,
                stencil_bits,
                samples,
            }
        };
        Self {
            vendor: "Kiln Simulated".to_string(),
            version: (1, 5),
            max_api: Api::OpenGLES32,
            extensions: vec![EXT_CREATE_CONTEXT.to_string(), EXT_CONTEXT_PRIORITY.to_string()],
            max_priority: ContextPriority::High,
            configs: vec![
                config(1, (8, 8, 8, 8), 24, 8, 0),
                config(2, (8, 8, 8, 8), 24, 8, 4),
                config(3, (8, 8, 8, 0), 24, 8, 0),
                config(4, (5, 6, 5, 0), 16, 0, 0),
            ],
            rules: Vec::new(),
        }
    }
}

/// Context attributes as decoded by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedContext {
    pub major: i32,
    pub minor: i32,
    pub debug: bool,
    pub priority: ContextPriority,
}

impl RequestedContext {
    pub fn parse(attribs: &[(ContextKey, i32)]) -> Option<Self> {
        let mut request = Self {
            major: 1,
            minor: 0,
            debug: false,
            priority: ContextPriority::Medium,
        };
        for &(key, value) in attribs {
            match key {
                ContextKey::ClientVersion | ContextKey::MajorVersion => request.major = value,
                ContextKey::MinorVersion => request.minor = value,
                ContextKey::Flags => {
                    if value & !CONTEXT_FLAG_DEBUG != 0 {
                        return None;
                    }
                    request.debug = value & CONTEXT_FLAG_DEBUG != 0;
                }
                ContextKey::Priority => request.priority = ContextPriority::from_raw(value)?,
            }
        }
        Some(request)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriverStats {
    pub choose_calls: usize,
    pub create_context_calls: usize,
    pub contexts_created: usize,
    pub contexts_destroyed: usize,
    pub surfaces_created: usize,
    pub surfaces_destroyed: usize,
    pub frames_presented: usize,
}

type ContextFilter = Box<dyn FnMut(&ConfigDescription, &RequestedContext) -> Option<ErrorCode>>;

pub struct SimulatedDriver {
    profile: DriverProfile,
    filters: Vec<ContextFilter>,
    last_error: ErrorCode,
    initialized: bool,
    fail_initialize: bool,
    fail_surfaces: bool,
    partial_context_error: Option<ErrorCode>,
    next_handle: u64,
    live_contexts: HashMap<ContextHandle, RequestedContext>,
    live_surfaces: HashSet<SurfaceHandle>,
    current: (Option<SurfaceHandle>, Option<ContextHandle>),
    stats: DriverStats,
}

impl SimulatedDriver {
    const DISPLAY: DisplayHandle = DisplayHandle(1);

    pub fn new(profile: DriverProfile) -> Self {
        Self {
            profile,
            filters: Vec::new(),
            last_error: ErrorCode::SUCCESS,
            initialized: false,
            fail_initialize: false,
            fail_surfaces: false,
            partial_context_error: None,
            next_handle: 1,
            live_contexts: HashMap::new(),
            live_surfaces: HashSet::new(),
            current: (None, None),
            stats: DriverStats::default(),
        }
    }

    /// Extra programmatic rejection on top of the profile rules.
    pub fn with_context_filter<F>(mut self, filter: F) -> Self
    where
        F: FnMut(&ConfigDescription, &RequestedContext) -> Option<ErrorCode> + 'static,
    {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn with_failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn with_failing_surfaces(mut self) -> Self {
        self.fail_surfaces = true;
        self
    }

    /// The next created context is returned together with `code`.
    pub fn with_partial_context_error(mut self, code: ErrorCode) -> Self {
        self.partial_context_error = Some(code);
        self
    }

    pub fn profile(&self) -> &DriverProfile {
        &self.profile
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DriverStats::default();
    }

    pub fn live_contexts(&self) -> usize {
        self.live_contexts.len()
    }

    pub fn live_surfaces(&self) -> usize {
        self.live_surfaces.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Raise `code` without a failing call, as a misbehaving driver would.
    pub fn raise(&mut self, code: ErrorCode) {
        self.last_error = code;
    }

    fn fail<T>(&mut self, code: ErrorCode) -> Option<T> {
        self.last_error = code;
        None
    }

    fn refuse(&mut self, code: ErrorCode) -> bool {
        self.last_error = code;
        false
    }

    fn check_display(&mut self, display: DisplayHandle) -> bool {
        if display != Self::DISPLAY {
            return self.refuse(ErrorCode::BAD_DISPLAY);
        }
        if !self.initialized {
            return self.refuse(ErrorCode::NOT_INITIALIZED);
        }
        true
    }

    fn config(&self, handle: ConfigHandle) -> Option<ConfigDescription> {
        let index = usize::try_from(handle.0).ok()?.checked_sub(1)?;
        self.profile.configs.get(index).copied()
    }

    fn renderable_bits(&self) -> i32 {
        Api::NEWEST_FIRST
            .into_iter()
            .filter(|api| *api <= self.profile.max_api)
            .fold(0, |bits, api| bits | api.renderable_bit())
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new(DriverProfile::default())
    }
}

/// Config size criteria: every requested size is a minimum.
fn satisfies(config: &ConfigDescription, key: ConfigKey, value: u32) -> bool {
    match key {
        ConfigKey::RedSize => config.red_bits >= value,
        ConfigKey::GreenSize => config.green_bits >= value,
        ConfigKey::BlueSize => config.blue_bits >= value,
        ConfigKey::AlphaSize => config.alpha_bits >= value,
        ConfigKey::DepthSize => config.depth_bits >= value,
        ConfigKey::StencilSize => config.stencil_bits >= value,
        ConfigKey::SampleBuffers => value == 0 || config.samples > 0,
        ConfigKey::Samples => config.samples >= value,
        ConfigKey::RenderableType | ConfigKey::ConfigId => true,
    }
}

impl Driver for SimulatedDriver {
    fn get_display(&mut self, _native: NativeDisplay) -> Option<DisplayHandle> {
        Some(Self::DISPLAY)
    }

    fn initialize(&mut self, display: DisplayHandle) -> Option<(i32, i32)> {
        if display != Self::DISPLAY {
            return self.fail(ErrorCode::BAD_DISPLAY);
        }
        if self.fail_initialize {
            return self.fail(ErrorCode::NOT_INITIALIZED);
        }
        self.initialized = true;
        Some(self.profile.version)
    }

    fn terminate(&mut self, display: DisplayHandle) -> bool {
        if display != Self::DISPLAY {
            return self.refuse(ErrorCode::BAD_DISPLAY);
        }
        self.initialized = false;
        true
    }

    fn bind_api(&mut self) -> bool {
        true
    }

    fn query_string(&mut self, display: DisplayHandle, name: QueryName) -> Option<String> {
        if !self.check_display(display) {
            return None;
        }
        let value = match name {
            QueryName::Vendor => self.profile.vendor.clone(),
            QueryName::Version => {
                let (major, minor) = self.profile.version;
                format!("{major}.{minor} {}", self.profile.vendor)
            }
            QueryName::Extensions => self.profile.extensions.join(" "),
        };
        Some(value)
    }

    fn choose_configs(
        &mut self,
        display: DisplayHandle,
        attribs: &[(ConfigKey, i32)],
    ) -> Option<Vec<ConfigHandle>> {
        self.stats.choose_calls += 1;
        if !self.check_display(display) {
            return None;
        }
        if attribs.iter().any(|(_, value)| *value < 0) {
            return self.fail(ErrorCode::BAD_ATTRIBUTE);
        }

        if let Some(&(_, id)) = attribs.iter().find(|(key, _)| *key == ConfigKey::ConfigId) {
            let handles = self
                .profile
                .configs
                .iter()
                .position(|config| config.config_id == id)
                .map(|index| ConfigHandle(index as u64 + 1))
                .into_iter()
                .collect();
            return Some(handles);
        }

        let renderable = self.renderable_bits();
        let wanted = attribs
            .iter()
            .find(|(key, _)| *key == ConfigKey::RenderableType)
            .map_or(0, |(_, bits)| *bits);
        if wanted & renderable != wanted {
            return Some(Vec::new());
        }

        let mut matches: Vec<(usize, u32)> = self
            .profile
            .configs
            .iter()
            .enumerate()
            .filter(|(_, config)| {
                attribs
                    .iter()
                    .all(|&(key, value)| satisfies(config, key, value as u32))
            })
            .map(|(index, config)| (index, config.samples))
            .collect();
        // Fewest samples first, otherwise profile order
        matches.sort_by_key(|&(_, samples)| samples);
        Some(
            matches
                .into_iter()
                .map(|(index, _)| ConfigHandle(index as u64 + 1))
                .collect(),
        )
    }

    fn describe_config(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
    ) -> Option<ConfigDescription> {
        if !self.check_display(display) {
            return None;
        }
        match self.config(config) {
            Some(description) => Some(description),
            None => self.fail(ErrorCode::BAD_CONFIG),
        }
    }

    fn create_context(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
        attribs: &[(ContextKey, i32)],
    ) -> Option<ContextHandle> {
        self.stats.create_context_calls += 1;
        if !self.check_display(display) {
            return None;
        }
        let Some(description) = self.config(config) else {
            return self.fail(ErrorCode::BAD_CONFIG);
        };
        let Some(request) = RequestedContext::parse(attribs) else {
            return self.fail(ErrorCode::BAD_ATTRIBUTE);
        };

        let max_api = self.profile.max_api;
        if (request.major, request.minor) > (max_api.major(), max_api.minor()) {
            return self.fail(ErrorCode::BAD_MATCH);
        }
        let rejected = self
            .profile
            .rules
            .iter()
            .find_map(|rule| rule.check(&description, &request));
        if let Some(code) = rejected {
            return self.fail(code);
        }
        for filter in &mut self.filters {
            if let Some(code) = filter(&description, &request) {
                self.last_error = code;
                return None;
            }
        }

        let granted = RequestedContext {
            priority: request.priority.min(self.profile.max_priority),
            ..request
        };
        let context = ContextHandle(self.next_handle());
        self.live_contexts.insert(context, granted);
        self.stats.contexts_created += 1;
        if let Some(code) = self.partial_context_error.take() {
            self.last_error = code;
        }
        Some(context)
    }

    fn destroy_context(&mut self, display: DisplayHandle, context: ContextHandle) -> bool {
        if !self.check_display(display) {
            return false;
        }
        if self.live_contexts.remove(&context).is_none() {
            return self.refuse(ErrorCode::BAD_CONTEXT);
        }
        self.stats.contexts_destroyed += 1;
        true
    }

    fn query_context(
        &mut self,
        display: DisplayHandle,
        context: ContextHandle,
        key: ContextKey,
    ) -> Option<i32> {
        if !self.check_display(display) {
            return None;
        }
        let Some(granted) = self.live_contexts.get(&context).copied() else {
            return self.fail(ErrorCode::BAD_CONTEXT);
        };
        let value = match key {
            ContextKey::ClientVersion | ContextKey::MajorVersion => granted.major,
            ContextKey::MinorVersion => granted.minor,
            ContextKey::Flags => {
                if granted.debug {
                    CONTEXT_FLAG_DEBUG
                } else {
                    0
                }
            }
            ContextKey::Priority => granted.priority.to_raw(),
        };
        Some(value)
    }

    fn create_window_surface(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
        window: NativeWindow,
    ) -> Option<SurfaceHandle> {
        if !self.check_display(display) {
            return None;
        }
        if self.config(config).is_none() {
            return self.fail(ErrorCode::BAD_CONFIG);
        }
        if window.0 == 0 || self.fail_surfaces {
            return self.fail(ErrorCode::BAD_NATIVE_WINDOW);
        }
        let surface = SurfaceHandle(self.next_handle());
        self.live_surfaces.insert(surface);
        self.stats.surfaces_created += 1;
        Some(surface)
    }

    fn destroy_surface(&mut self, display: DisplayHandle, surface: SurfaceHandle) -> bool {
        if !self.check_display(display) {
            return false;
        }
        if !self.live_surfaces.remove(&surface) {
            return self.refuse(ErrorCode::BAD_SURFACE);
        }
        self.stats.surfaces_destroyed += 1;
        true
    }

    fn make_current(
        &mut self,
        display: DisplayHandle,
        surface: Option<SurfaceHandle>,
        context: Option<ContextHandle>,
    ) -> bool {
        if !self.check_display(display) {
            return false;
        }
        match (surface, context) {
            (None, None) => {}
            (Some(surface), Some(context)) => {
                if !self.live_surfaces.contains(&surface) {
                    return self.refuse(ErrorCode::BAD_SURFACE);
                }
                if !self.live_contexts.contains_key(&context) {
                    return self.refuse(ErrorCode::BAD_CONTEXT);
                }
            }
            _ => return self.refuse(ErrorCode::BAD_MATCH),
        }
        self.current = (surface, context);
        true
    }

    fn swap_buffers(&mut self, display: DisplayHandle, surface: SurfaceHandle) -> bool {
        if !self.check_display(display) {
            return false;
        }
        if self.current.0 != Some(surface) {
            return self.refuse(ErrorCode::BAD_SURFACE);
        }
        self.stats.frames_presented += 1;
        true
    }

    fn last_error(&mut self) -> ErrorCode {
        std::mem::replace(&mut self.last_error, ErrorCode::SUCCESS)
    }
}

/// Window provider that hands out ids without a window system.
#[derive(Debug, Default)]
pub struct HeadlessWindows {
    next_id: u64,
    live_displays: usize,
    live_windows: usize,
    fail_windows: bool,
}

impl HeadlessWindows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_windows(mut self) -> Self {
        self.fail_windows = true;
        self
    }

    pub fn live_displays(&self) -> usize {
        self.live_displays
    }

    pub fn live_windows(&self) -> usize {
        self.live_windows
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl NativeWindowProvider for HeadlessWindows {
    fn create_native_display(&mut self) -> Result<NativeDisplay, NativeWindowError> {
        self.live_displays += 1;
        Ok(NativeDisplay(self.next_id()))
    }

    fn create_native_window(
        &mut self,
        _display: NativeDisplay,
        width: u32,
        height: u32,
    ) -> Result<NativeWindow, NativeWindowError> {
        if self.fail_windows || width == 0 || height == 0 {
            return Err(NativeWindowError::Window {
                width,
                height,
                reason: "headless window refused".to_string(),
            });
        }
        self.live_windows += 1;
        Ok(NativeWindow(self.next_id()))
    }

    fn destroy_native_window(&mut self, _display: NativeDisplay, _window: NativeWindow) {
        self.live_windows = self.live_windows.saturating_sub(1);
    }

    fn release_native_display(&mut self, _display: NativeDisplay) {
        self.live_displays = self.live_displays.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized() -> SimulatedDriver {
        let mut driver = SimulatedDriver::default();
        let display = driver.get_display(NativeDisplay(1)).unwrap();
        driver.initialize(display).unwrap();
        driver
    }

    #[test]
    fn last_error_reads_and_clears() {
        let mut driver = SimulatedDriver::default();
        assert!(driver.choose_configs(SimulatedDriver::DISPLAY, &[]).is_none());
        assert_eq!(driver.last_error(), ErrorCode::NOT_INITIALIZED);
        assert_eq!(driver.last_error(), ErrorCode::SUCCESS);
    }

    #[test]
    fn sizes_are_minimums_and_fewest_samples_first() {
        let mut driver = initialized();
        let configs = driver
            .choose_configs(
                SimulatedDriver::DISPLAY,
                &[(ConfigKey::AlphaSize, 8), (ConfigKey::StencilSize, 8)],
            )
            .unwrap();
        assert_eq!(configs, vec![ConfigHandle(1), ConfigHandle(2)]);

        let configs = driver
            .choose_configs(SimulatedDriver::DISPLAY, &[(ConfigKey::Samples, 2)])
            .unwrap();
        assert_eq!(configs, vec![ConfigHandle(2)]);
    }

    #[test]
    fn config_id_ignores_other_criteria() {
        let mut driver = initialized();
        let configs = driver
            .choose_configs(
                SimulatedDriver::DISPLAY,
                &[(ConfigKey::ConfigId, 4), (ConfigKey::AlphaSize, 8)],
            )
            .unwrap();
        assert_eq!(configs, vec![ConfigHandle(4)]);
        let configs = driver
            .choose_configs(SimulatedDriver::DISPLAY, &[(ConfigKey::ConfigId, 42)])
            .unwrap();
        assert!(configs.is_empty());
    }

    #[test]
    fn rules_reject_contexts() {
        let mut profile = DriverProfile::default();
        profile.rules.push(ContextRule::RejectDebug);
        let mut driver = SimulatedDriver::new(profile);
        driver.initialize(SimulatedDriver::DISPLAY).unwrap();

        let debug = [(ContextKey::MajorVersion, 3), (ContextKey::Flags, CONTEXT_FLAG_DEBUG)];
        assert!(driver.create_context(SimulatedDriver::DISPLAY, ConfigHandle(1), &debug).is_none());
        assert_eq!(driver.last_error(), ErrorCode::BAD_MATCH);

        let plain = [(ContextKey::MajorVersion, 3)];
        let context = driver
            .create_context(SimulatedDriver::DISPLAY, ConfigHandle(1), &plain)
            .unwrap();
        assert_eq!(driver.live_contexts(), 1);
        assert!(driver.destroy_context(SimulatedDriver::DISPLAY, context));
        assert_eq!(driver.live_contexts(), 0);
    }

    #[test]
    fn priority_is_capped_and_read_back() {
        let mut driver = SimulatedDriver::new(DriverProfile {
            max_priority: ContextPriority::Medium,
            ..Default::default()
        });
        driver.initialize(SimulatedDriver::DISPLAY).unwrap();

        let high = [
            (ContextKey::MajorVersion, 3),
            (ContextKey::Priority, ContextPriority::High.to_raw()),
        ];
        let context = driver
            .create_context(SimulatedDriver::DISPLAY, ConfigHandle(1), &high)
            .unwrap();
        let display = SimulatedDriver::DISPLAY;
        let priority = driver.query_context(display, context, ContextKey::Priority);
        assert_eq!(priority, Some(ContextPriority::Medium.to_raw()));
        let major = driver.query_context(display, context, ContextKey::MajorVersion);
        assert_eq!(major, Some(3));

        assert!(driver.destroy_context(display, context));
        let gone = driver.query_context(display, context, ContextKey::Priority);
        assert_eq!(gone, None);
        assert_eq!(driver.last_error(), ErrorCode::BAD_CONTEXT);
    }

    #[test]
    fn profile_round_trips_through_json() {
        let json = r#"{
            "max_api": "OpenGLES3",
            "rules": [ { "rule": "max_samples", "samples": 2 }, { "rule": "reject_debug" } ]
        }"#;
        let profile: DriverProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.max_api, Api::OpenGLES3);
        assert_eq!(
            profile.rules,
            vec![ContextRule::MaxSamples { samples: 2 }, ContextRule::RejectDebug]
        );
        assert_eq!(profile.configs.len(), 4);
    }
}
