//! Negotiation engine
//!
//! Drives the relax -> enumerate -> create loop until a context is created or
//! there is nothing left to relax. Each iteration makes at most one
//! enumeration and one creation call; the number of iterations is bounded by
//! [`RetryState::MAX_ITERATIONS`].

use crate::adapter::{ConfigEnumerator, ContextAttemptor, EnumeratedConfig};
use crate::driver::{
    ConfigDescription, ConfigHandle, ContextHandle, ContextKey, DisplayHandle, Driver,
    DriverCapabilities, ErrorCode,
};
use crate::relax::relax;
use crate::retry::{RetryState, Slot, SlotState, SLOT_COUNT};
use crate::{
    Api, AttemptFailure, CapabilityAttributes, ContextPriority, ContextRequest, NegotiationError,
};

/// Caller-owned logging policy. The first negotiation run with a verbose
/// policy reports the probed driver capabilities at `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogPolicy {
    verbose: bool,
}

impl LogPolicy {
    pub fn verbose_once() -> Self {
        Self { verbose: true }
    }

    pub fn quiet() -> Self {
        Self { verbose: false }
    }

    fn take_verbose(&mut self) -> bool {
        std::mem::replace(&mut self.verbose, false)
    }
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self::verbose_once()
    }
}

/// A successfully negotiated context. The caller owns the handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedContext {
    /// What the chosen config actually provides
    pub attributes: CapabilityAttributes,
    pub config: ConfigHandle,
    pub config_id: i32,
    pub context: ContextHandle,
    pub api: Api,
    /// Relaxations that were needed, in priority order
    pub relaxed: Vec<Slot>,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Failed(AttemptFailure),
    /// Context created but discarded to re-test without tentative relaxations
    RolledBack { config_id: i32, reset: Vec<Slot> },
    Created { config_id: i32 },
}

/// One iteration of the negotiation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub iteration: usize,
    pub candidate: CapabilityAttributes,
    /// Slot states the candidate was derived from
    pub states: [SlotState; SLOT_COUNT],
    pub outcome: AttemptOutcome,
}

enum Attempt {
    Created {
        config: EnumeratedConfig,
        context: ContextHandle,
    },
    Failed(AttemptFailure),
}

pub struct NegotiationEngine<'d, D: Driver + ?Sized> {
    driver: &'d mut D,
    display: DisplayHandle,
    original: CapabilityAttributes,
    api: Api,
    supports_priority: bool,
    enumerator: ConfigEnumerator,
    attemptor: ContextAttemptor,
    history: Vec<AttemptRecord>,
    last_code: Option<ErrorCode>,
}

impl<'d, D: Driver + ?Sized> NegotiationEngine<'d, D> {
    /// Resolve the API level and prepare the effective request.
    pub fn new(
        driver: &'d mut D,
        display: DisplayHandle,
        caps: &DriverCapabilities,
        request: &ContextRequest,
    ) -> Result<Self, NegotiationError> {
        if request.min_api > request.max_api || request.min_api > caps.max_api {
            return Err(NegotiationError::RequestedApiUnsupported {
                requested: request.min_api,
                supported: caps.max_api.min(request.max_api),
            });
        }
        let api = request.max_api.min(caps.max_api);

        let mut original = request.attributes.clamped(caps.limits);
        if original.debug_context && !caps.supports_create_context {
            tracing::debug!("driver cannot create debug contexts, dropping the debug bit");
            original.debug_context = false;
        }

        Ok(Self {
            driver,
            display,
            original,
            api,
            supports_priority: caps.supports_context_priority,
            enumerator: ConfigEnumerator::new(api),
            attemptor: ContextAttemptor::new(api, caps),
            history: Vec::new(),
            last_code: None,
        })
    }

    pub fn api(&self) -> Api {
        self.api
    }

    /// The request after clamping and capability adjustments.
    pub fn original(&self) -> &CapabilityAttributes {
        &self.original
    }

    /// Iterations of the last `run`, successful or not.
    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    pub fn run(&mut self) -> Result<NegotiatedContext, NegotiationError> {
        let mut retry = RetryState::new(&self.original);
        let mut last_failure = None;
        self.history.clear();
        self.last_code = None;

        for iteration in 0..RetryState::MAX_ITERATIONS {
            let candidate = relax(&self.original, &retry);
            let states = *retry.states();
            tracing::debug!(
                iteration,
                testing = ?retry.testing(),
                ?candidate,
                "attempting configuration"
            );

            match self.attempt(&candidate)? {
                Attempt::Created { config, context } => {
                    let config_id = config.description.config_id;
                    let reset = retry.confirm_success();
                    if !reset.is_empty() {
                        tracing::debug!(
                            iteration,
                            config_id,
                            ?reset,
                            "context created, re-testing without tentative relaxations"
                        );
                        self.release(context);
                        self.history.push(AttemptRecord {
                            iteration,
                            candidate,
                            states,
                            outcome: AttemptOutcome::RolledBack { config_id, reset },
                        });
                        continue;
                    }

                    self.history.push(AttemptRecord {
                        iteration,
                        candidate,
                        states,
                        outcome: AttemptOutcome::Created { config_id },
                    });
                    let attributes = self.granted(&candidate, &config.description, context);
                    let relaxed = retry.applied();
                    tracing::info!(
                        config_id,
                        api = %self.api,
                        iterations = iteration + 1,
                        ?relaxed,
                        "context negotiated"
                    );
                    return Ok(NegotiatedContext {
                        attributes,
                        config: config.handle,
                        config_id,
                        context,
                        api: self.api,
                        relaxed,
                        iterations: iteration + 1,
                    });
                }
                Attempt::Failed(failure) => {
                    tracing::debug!(iteration, %failure, "attempt failed");
                    self.history.push(AttemptRecord {
                        iteration,
                        candidate,
                        states,
                        outcome: AttemptOutcome::Failed(failure),
                    });
                    last_failure = Some(failure);
                }
            }

            if let Some(id) = self.original.explicit_config_id {
                return Err(NegotiationError::ExplicitConfigUnavailable {
                    id,
                    code: self.last_code,
                });
            }

            if let Some(slot) = retry.reject_testing() {
                tracing::debug!(%slot, "relaxation alone was not enough, keeping it tentatively");
            }
            match retry.next_untried() {
                Some(slot) => {
                    retry.begin_testing(slot);
                    tracing::debug!(%slot, "relaxing");
                }
                None => return Err(self.exhausted(&retry, last_failure)),
            }
        }

        Err(self.exhausted(&retry, last_failure))
    }

    fn attempt(&mut self, candidate: &CapabilityAttributes) -> Result<Attempt, NegotiationError> {
        let enumeration = self.enumerator.enumerate(&mut *self.driver, self.display, candidate);
        if enumeration.error.is_some() {
            self.last_code = enumeration.error;
        }

        let force_exact = self.original.force_exact_color_bpp;
        let mut configs = enumeration.configs;
        if force_exact && configs.is_empty() {
            return Err(self.exact_color_unavailable());
        }
        if !force_exact {
            configs.truncate(1);
        }

        if let Some(id) = self.original.explicit_config_id {
            configs.retain(|config| config.description.config_id == id);
            if configs.is_empty() {
                return Err(NegotiationError::ExplicitConfigUnavailable {
                    id,
                    code: self.last_code,
                });
            }
        }

        let chosen = if force_exact {
            let original = self.original;
            configs.into_iter().find(|config| {
                let d = &config.description;
                original.color_matches(d.red_bits, d.green_bits, d.blue_bits, d.alpha_bits)
            })
        } else {
            configs.into_iter().next()
        };
        let Some(config) = chosen else {
            let failure = if force_exact {
                AttemptFailure::NoExactColorMatch
            } else {
                AttemptFailure::NoMatchingConfiguration
            };
            return Ok(Attempt::Failed(failure));
        };

        match self
            .attemptor
            .create_context(&mut *self.driver, self.display, config.handle, candidate)
        {
            Ok(context) => Ok(Attempt::Created { config, context }),
            Err(code) => {
                self.last_code = Some(code);
                Ok(Attempt::Failed(AttemptFailure::ContextCreationFailed(code)))
            }
        }
    }

    /// Candidate with the bit counts the config really has and the priority
    /// the driver granted.
    fn granted(
        &mut self,
        candidate: &CapabilityAttributes,
        description: &ConfigDescription,
        context: ContextHandle,
    ) -> CapabilityAttributes {
        CapabilityAttributes {
            red_bits: description.red_bits,
            green_bits: description.green_bits,
            blue_bits: description.blue_bits,
            alpha_bits: description.alpha_bits,
            depth_bits: description.depth_bits,
            stencil_bits: description.stencil_bits,
            aa_samples: description.samples,
            context_priority: self.granted_priority(context),
            ..*candidate
        }
    }

    fn granted_priority(&mut self, context: ContextHandle) -> ContextPriority {
        if !self.supports_priority {
            return ContextPriority::Medium;
        }
        let raw = self
            .driver
            .query_context(self.display, context, ContextKey::Priority);
        match raw.and_then(ContextPriority::from_raw) {
            Some(priority) => priority,
            None => {
                let code = self.driver.last_error();
                tracing::debug!(?raw, %code, "driver did not report a context priority");
                ContextPriority::Medium
            }
        }
    }

    fn release(&mut self, context: ContextHandle) {
        if !self.driver.destroy_context(self.display, context) {
            let code = self.driver.last_error();
            tracing::warn!(?context, %code, "failed to destroy discarded context");
        }
    }

    fn exact_color_unavailable(&self) -> NegotiationError {
        NegotiationError::ExactColorUnavailable {
            red: self.original.red_bits,
            green: self.original.green_bits,
            blue: self.original.blue_bits,
            alpha: self.original.alpha_bits,
            code: self.last_code,
        }
    }

    fn exhausted(
        &self,
        retry: &RetryState,
        last_failure: Option<AttemptFailure>,
    ) -> NegotiationError {
        if last_failure == Some(AttemptFailure::NoExactColorMatch) {
            return self.exact_color_unavailable();
        }
        NegotiationError::ExhaustedRelaxationOptions {
            relaxable: retry.relaxable_count(),
            iterations: self.history.len(),
            code: self.last_code,
        }
    }
}

/// Probe the driver on an initialized display and negotiate a context for
/// `request`.
pub fn negotiate_context<D: Driver + ?Sized>(
    driver: &mut D,
    display: DisplayHandle,
    request: &ContextRequest,
    log: &mut LogPolicy,
) -> Result<NegotiatedContext, NegotiationError> {
    let span = tracing::info_span!(
        "negotiate_context",
        min_api = %request.min_api,
        max_api = %request.max_api
    );
    let _enter = span.enter();

    let caps = DriverCapabilities::probe(driver, display)?;
    if log.take_verbose() {
        tracing::info!(?caps, "driver capabilities");
    } else {
        tracing::debug!(?caps, "driver capabilities");
    }

    NegotiationEngine::new(driver, display, &caps, request)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_policy_fires_once() {
        let mut log = LogPolicy::verbose_once();
        assert!(log.take_verbose());
        assert!(!log.take_verbose());
        assert!(!LogPolicy::quiet().take_verbose());
    }
}
