//! Candidate attribute computation
//!
//! Pure function of the original request and the retry state: every family
//! is evaluated independently, so the same state always yields the same
//! candidate.

use crate::retry::{RetryState, Slot, SlotState};
use crate::CapabilityAttributes;

/// Build the next candidate from `original` with every applied relaxation.
///
/// `original` is expected to be clamped to the platform limits already.
pub fn relax(original: &CapabilityAttributes, retry: &RetryState) -> CapabilityAttributes {
    let mut candidate = *original;

    if retry.is_applied(Slot::ColorBpp) {
        candidate.red_bits = 1;
        candidate.green_bits = 1;
        candidate.blue_bits = 1;
    }

    candidate.alpha_bits = reduce_or_disable(
        original.alpha_bits,
        retry.state(Slot::ReduceAlpha),
        retry.state(Slot::DisableAlpha),
    );
    candidate.stencil_bits = reduce_or_disable(
        original.stencil_bits,
        retry.state(Slot::ReduceStencil),
        retry.state(Slot::DisableStencil),
    );

    if retry.is_applied(Slot::ReduceDepth) {
        candidate.depth_bits = 1;
    }

    if retry.is_applied(Slot::Antialias) {
        candidate.aa_samples = original.aa_samples >> 1;
    }

    if retry.is_applied(Slot::DebugBit) {
        candidate.debug_context = false;
    }

    candidate
}

/// Two mutually exclusive slots over one bit count: a slot under test wins,
/// otherwise the stronger applied relaxation, otherwise the original.
fn reduce_or_disable(original: u32, reduce: SlotState, disable: SlotState) -> u32 {
    if disable == SlotState::CurrentlyTesting {
        0
    } else if reduce == SlotState::CurrentlyTesting {
        1
    } else if disable.is_applied() {
        0
    } else if reduce.is_applied() {
        1
    } else {
        original
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn original() -> CapabilityAttributes {
        CapabilityAttributes {
            red_bits: 8,
            green_bits: 8,
            blue_bits: 8,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 8,
            aa_samples: 4,
            debug_context: true,
            ..Default::default()
        }
    }

    #[test]
    fn fresh_state_changes_nothing() {
        let original = original();
        let retry = RetryState::new(&original);
        assert_eq!(relax(&original, &retry), original);
    }

    #[test]
    fn testing_slot_is_relaxed() {
        let original = original();
        let mut retry = RetryState::new(&original);

        retry.begin_testing(Slot::Antialias);
        let candidate = relax(&original, &retry);
        assert_eq!(candidate.aa_samples, 2);
        assert!(candidate.debug_context);

        retry.reject_testing();
        retry.begin_testing(Slot::ColorBpp);
        let candidate = relax(&original, &retry);
        assert_eq!((candidate.red_bits, candidate.green_bits, candidate.blue_bits), (1, 1, 1));
        // Tentative removal stays applied while a later slot is tested
        assert_eq!(candidate.aa_samples, 2);
    }

    #[test]
    fn disable_beats_reduce() {
        let original = original();
        let mut retry = RetryState::new(&original);
        retry.begin_testing(Slot::ReduceStencil);
        assert_eq!(relax(&original, &retry).stencil_bits, 1);

        retry.reject_testing();
        retry.begin_testing(Slot::DisableStencil);
        assert_eq!(relax(&original, &retry).stencil_bits, 0);
    }

    #[test]
    fn permanent_relaxation_survives_rollback() {
        let original = original();
        let mut retry = RetryState::new(&original);
        retry.begin_testing(Slot::ReduceAlpha);
        retry.reject_testing();
        retry.begin_testing(Slot::DisableAlpha);
        retry.confirm_success();

        let candidate = relax(&original, &retry);
        assert_eq!(retry.state(Slot::ReduceAlpha), SlotState::NotTried);
        assert_eq!(candidate.alpha_bits, 0);
    }

    #[test]
    fn relax_is_idempotent() {
        let original = original();
        let mut retry = RetryState::new(&original);
        retry.begin_testing(Slot::DebugBit);
        retry.reject_testing();
        retry.begin_testing(Slot::ReduceDepth);
        let first = relax(&original, &retry);
        let second = relax(&original, &retry);
        assert_eq!(first, second);
        assert_eq!(first.depth_bits, 1);
        assert!(!first.debug_context);
    }
}
