//! Translation between capability attributes and driver attribute lists
//!
//! Both adapters own the last-error discipline: any code they observe is read
//! (and thereby cleared) before they return, so nothing stale reaches the next
//! attempt.

use crate::driver::{
    ConfigDescription, ConfigHandle, ConfigKey, ContextHandle, ContextKey, DisplayHandle, Driver,
    DriverCapabilities, ErrorCode, CONTEXT_FLAG_DEBUG,
};
use crate::{Api, CapabilityAttributes, ContextPriority};

/// A config together with what the driver says it provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumeratedConfig {
    pub handle: ConfigHandle,
    pub description: ConfigDescription,
}

/// Result of one enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    pub configs: Vec<EnumeratedConfig>,
    /// Driver error seen while enumerating, kept for diagnostics
    pub error: Option<ErrorCode>,
}

pub struct ConfigEnumerator {
    api: Api,
}

impl ConfigEnumerator {
    pub fn new(api: Api) -> Self {
        Self { api }
    }

    /// Attribute list for `attrs`. An explicit config id replaces every
    /// other selection criterion.
    pub fn attribute_list(&self, attrs: &CapabilityAttributes) -> Vec<(ConfigKey, i32)> {
        if let Some(id) = attrs.explicit_config_id {
            return vec![(ConfigKey::ConfigId, id)];
        }

        let mut list = vec![
            (ConfigKey::RedSize, bits(attrs.red_bits)),
            (ConfigKey::GreenSize, bits(attrs.green_bits)),
            (ConfigKey::BlueSize, bits(attrs.blue_bits)),
            (ConfigKey::AlphaSize, bits(attrs.alpha_bits)),
            (ConfigKey::DepthSize, bits(attrs.depth_bits)),
            (ConfigKey::StencilSize, bits(attrs.stencil_bits)),
        ];
        if attrs.aa_samples > 0 {
            list.push((ConfigKey::SampleBuffers, 1));
            list.push((ConfigKey::Samples, bits(attrs.aa_samples)));
        }
        list.push((ConfigKey::RenderableType, self.api.renderable_bit()));
        list
    }

    /// Never fails: a driver error yields an empty enumeration with the code
    /// recorded.
    pub fn enumerate<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        display: DisplayHandle,
        attrs: &CapabilityAttributes,
    ) -> Enumeration {
        let list = self.attribute_list(attrs);
        let Some(handles) = driver.choose_configs(display, &list) else {
            let code = driver.last_error();
            tracing::debug!(%code, "config enumeration failed");
            return Enumeration {
                configs: Vec::new(),
                error: Some(code),
            };
        };

        let mut enumeration = Enumeration::default();
        for handle in handles {
            match driver.describe_config(display, handle) {
                Some(description) => enumeration
                    .configs
                    .push(EnumeratedConfig { handle, description }),
                None => {
                    let code = driver.last_error();
                    tracing::warn!(?handle, %code, "skipping config that cannot be described");
                    enumeration.error = Some(code);
                }
            }
        }
        enumeration
    }
}

pub struct ContextAttemptor {
    api: Api,
    supports_create_context: bool,
    supports_context_priority: bool,
}

impl ContextAttemptor {
    pub fn new(api: Api, caps: &DriverCapabilities) -> Self {
        Self {
            api,
            supports_create_context: caps.supports_create_context,
            supports_context_priority: caps.supports_context_priority,
        }
    }

    pub fn context_attributes(&self, attrs: &CapabilityAttributes) -> Vec<(ContextKey, i32)> {
        let mut list = Vec::with_capacity(4);
        if self.supports_create_context {
            list.push((ContextKey::MajorVersion, self.api.major()));
            list.push((ContextKey::MinorVersion, self.api.minor()));
            if attrs.debug_context {
                list.push((ContextKey::Flags, CONTEXT_FLAG_DEBUG));
            }
        } else {
            list.push((ContextKey::ClientVersion, self.api.major()));
        }
        if self.supports_context_priority && attrs.context_priority != ContextPriority::Medium {
            list.push((ContextKey::Priority, attrs.context_priority.to_raw()));
        }
        list
    }

    /// Create a context on `config`. On failure nothing stays allocated on
    /// the driver side and the error register is clear.
    pub fn create_context<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        display: DisplayHandle,
        config: ConfigHandle,
        attrs: &CapabilityAttributes,
    ) -> Result<ContextHandle, ErrorCode> {
        let stale = driver.last_error();
        if !stale.is_success() {
            tracing::trace!(code = %stale, "discarding stale driver error");
        }

        let list = self.context_attributes(attrs);
        let Some(context) = driver.create_context(display, config, &list) else {
            return Err(failure_code(driver.last_error()));
        };

        // Some drivers hand back a context and raise an error at the same time
        let code = driver.last_error();
        if !code.is_success() {
            tracing::warn!(%code, "driver returned a context alongside an error, destroying it");
            if !driver.destroy_context(display, context) {
                let destroy_code = driver.last_error();
                tracing::warn!(code = %destroy_code, "destroying partial context failed");
            }
            return Err(code);
        }
        Ok(context)
    }
}

fn bits(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// A failing call that left no code behind still counts as a failure.
fn failure_code(code: ErrorCode) -> ErrorCode {
    if code.is_success() {
        ErrorCode::BAD_MATCH
    } else {
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::SurfaceLimits;

    fn caps(create_context: bool, priority: bool) -> DriverCapabilities {
        DriverCapabilities {
            max_api: Api::OpenGLES32,
            supports_create_context: create_context,
            supports_context_priority: priority,
            limits: SurfaceLimits::default(),
        }
    }

    #[test]
    fn config_list_includes_samples_only_when_requested() {
        let enumerator = ConfigEnumerator::new(Api::OpenGLES3);
        let attrs = CapabilityAttributes {
            aa_samples: 0,
            ..Default::default()
        };
        let list = enumerator.attribute_list(&attrs);
        assert!(!list.iter().any(|(key, _)| *key == ConfigKey::Samples));
        assert_eq!(list.last(), Some(&(ConfigKey::RenderableType, 0x40)));

        let list = enumerator.attribute_list(&CapabilityAttributes { aa_samples: 4, ..attrs });
        assert!(list.contains(&(ConfigKey::SampleBuffers, 1)));
        assert!(list.contains(&(ConfigKey::Samples, 4)));
    }

    #[test]
    fn explicit_id_replaces_criteria() {
        let enumerator = ConfigEnumerator::new(Api::OpenGLES2);
        let attrs = CapabilityAttributes {
            explicit_config_id: Some(42),
            ..Default::default()
        };
        assert_eq!(enumerator.attribute_list(&attrs), vec![(ConfigKey::ConfigId, 42)]);
    }

    #[test]
    fn context_list_without_extensions() {
        let attemptor = ContextAttemptor::new(Api::OpenGLES3, &caps(false, false));
        let attrs = CapabilityAttributes {
            debug_context: true,
            context_priority: ContextPriority::High,
            ..Default::default()
        };
        assert_eq!(attemptor.context_attributes(&attrs), vec![(ContextKey::ClientVersion, 3)]);
    }

    #[test]
    fn context_list_with_extensions() {
        let attemptor = ContextAttemptor::new(Api::OpenGLES31, &caps(true, true));
        let attrs = CapabilityAttributes {
            debug_context: true,
            context_priority: ContextPriority::High,
            ..Default::default()
        };
        assert_eq!(
            attemptor.context_attributes(&attrs),
            vec![
                (ContextKey::MajorVersion, 3),
                (ContextKey::MinorVersion, 1),
                (ContextKey::Flags, CONTEXT_FLAG_DEBUG),
                (ContextKey::Priority, ContextPriority::High.to_raw()),
            ]
        );
    }
}
