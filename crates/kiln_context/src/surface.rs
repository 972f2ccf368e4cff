//! Surface binding
//!
//! Brings up display, negotiated context and window surface as one value.
//! Resources are recorded as they are acquired and released in reverse
//! order when the value drops, including a value abandoned halfway through
//! `create`.

use crate::driver::{
    ContextHandle, DisplayHandle, Driver, NativeDisplay, NativeWindow, SurfaceHandle,
};
use crate::engine::{negotiate_context, LogPolicy, NegotiatedContext};
use crate::{
    Api, CapabilityAttributes, ContextRequest, NativeWindowError, NegotiationError, SurfaceError,
};

/// Window-system collaborator.
pub trait NativeWindowProvider {
    fn create_native_display(&mut self) -> Result<NativeDisplay, NativeWindowError>;

    fn create_native_window(
        &mut self,
        display: NativeDisplay,
        width: u32,
        height: u32,
    ) -> Result<NativeWindow, NativeWindowError>;

    fn destroy_native_window(&mut self, display: NativeDisplay, window: NativeWindow);

    fn release_native_display(&mut self, display: NativeDisplay);
}

/// A context made current on a window surface.
pub struct RenderContext<'a, D: Driver, W: NativeWindowProvider> {
    driver: &'a mut D,
    windows: &'a mut W,
    native_display: Option<NativeDisplay>,
    native_window: Option<NativeWindow>,
    display: Option<DisplayHandle>,
    context: Option<ContextHandle>,
    surface: Option<SurfaceHandle>,
    current: bool,
    negotiated: Option<NegotiatedContext>,
}

impl<'a, D: Driver, W: NativeWindowProvider> RenderContext<'a, D, W> {
    pub fn create(
        driver: &'a mut D,
        windows: &'a mut W,
        request: &ContextRequest,
        width: u32,
        height: u32,
        log: &mut LogPolicy,
    ) -> Result<Self, SurfaceError> {
        let mut this = Self {
            driver,
            windows,
            native_display: None,
            native_window: None,
            display: None,
            context: None,
            surface: None,
            current: false,
            negotiated: None,
        };

        let native_display = this.windows.create_native_display()?;
        this.native_display = Some(native_display);

        let display = this.open_display(native_display)?;

        let negotiated = negotiate_context(&mut *this.driver, display, request, log)?;
        this.context = Some(negotiated.context);
        let config = negotiated.config;
        this.negotiated = Some(negotiated);

        let window = this.windows.create_native_window(native_display, width, height)?;
        this.native_window = Some(window);

        let Some(surface) = this.driver.create_window_surface(display, config, window) else {
            return Err(SurfaceError::SurfaceCreationFailed(this.driver.last_error()));
        };
        this.surface = Some(surface);

        this.make_current()?;
        tracing::info!(width, height, "render surface ready");
        Ok(this)
    }

    fn open_display(&mut self, native: NativeDisplay) -> Result<DisplayHandle, NegotiationError> {
        let Some(display) = self.driver.get_display(native) else {
            return Err(self.unavailable("get display"));
        };
        let Some((major, minor)) = self.driver.initialize(display) else {
            return Err(self.unavailable("initialize"));
        };
        self.display = Some(display);
        tracing::debug!(major, minor, "driver initialized");

        if !self.driver.bind_api() {
            return Err(self.unavailable("bind api"));
        }
        Ok(display)
    }

    fn unavailable(&mut self, stage: &'static str) -> NegotiationError {
        NegotiationError::DriverUnavailable {
            stage,
            code: self.driver.last_error().failure(),
        }
    }

    pub fn negotiated(&self) -> Option<&NegotiatedContext> {
        self.negotiated.as_ref()
    }

    /// Granted attributes; `None` only while the value is half-built.
    pub fn attributes(&self) -> Option<&CapabilityAttributes> {
        self.negotiated.as_ref().map(|n| &n.attributes)
    }

    pub fn api(&self) -> Option<Api> {
        self.negotiated.as_ref().map(|n| n.api)
    }

    pub fn is_current(&self) -> bool {
        self.current
    }

    pub fn make_current(&mut self) -> Result<(), SurfaceError> {
        let (Some(display), Some(surface), Some(context)) =
            (self.display, self.surface, self.context)
        else {
            return Err(SurfaceError::MakeCurrentFailed(
                crate::ErrorCode::NOT_INITIALIZED,
            ));
        };
        if !self.driver.make_current(display, Some(surface), Some(context)) {
            return Err(SurfaceError::MakeCurrentFailed(self.driver.last_error()));
        }
        self.current = true;
        Ok(())
    }

    pub fn release_current(&mut self) -> Result<(), SurfaceError> {
        let Some(display) = self.display else {
            return Ok(());
        };
        if self.current && !self.driver.make_current(display, None, None) {
            return Err(SurfaceError::MakeCurrentFailed(self.driver.last_error()));
        }
        self.current = false;
        Ok(())
    }

    pub fn swap_buffers(&mut self) -> Result<(), SurfaceError> {
        let (Some(display), Some(surface)) = (self.display, self.surface) else {
            return Err(SurfaceError::SwapFailed(crate::ErrorCode::BAD_SURFACE));
        };
        if !self.driver.swap_buffers(display, surface) {
            return Err(SurfaceError::SwapFailed(self.driver.last_error()));
        }
        Ok(())
    }

    fn teardown(&mut self) {
        if let Err(err) = self.release_current() {
            tracing::warn!(%err, "releasing current context failed");
            self.current = false;
        }
        if let Some(display) = self.display {
            if let Some(surface) = self.surface.take() {
                if !self.driver.destroy_surface(display, surface) {
                    let code = self.driver.last_error();
                    tracing::warn!(?surface, %code, "destroying surface failed");
                }
            }
            if let Some(context) = self.context.take() {
                if !self.driver.destroy_context(display, context) {
                    let code = self.driver.last_error();
                    tracing::warn!(?context, %code, "destroying context failed");
                }
            }
            self.display = None;
            if !self.driver.terminate(display) {
                let code = self.driver.last_error();
                tracing::warn!(%code, "terminating display failed");
            }
        }
        if let Some(native_display) = self.native_display.take() {
            if let Some(window) = self.native_window.take() {
                self.windows.destroy_native_window(native_display, window);
            }
            self.windows.release_native_display(native_display);
        }
    }
}

impl<D: Driver, W: NativeWindowProvider> Drop for RenderContext<'_, D, W> {
    fn drop(&mut self) {
        self.teardown();
    }
}
