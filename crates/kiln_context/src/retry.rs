//! Per-attribute retry bookkeeping
//!
//! One slot per relaxable attribute family. Slots only move forward
//! (NotTried -> CurrentlyTesting -> TentativelyRemoved/PermanentlyFixed), except
//! that a TentativelyRemoved slot may go back to NotTried once.

use crate::CapabilityAttributes;
use std::fmt;

/// Relaxable attribute family, declared in relaxation priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    DebugBit,
    Antialias,
    ReduceStencil,
    DisableStencil,
    ReduceDepth,
    ColorBpp,
    ReduceAlpha,
    DisableAlpha,
}

pub const SLOT_COUNT: usize = 8;

impl Slot {
    /// Order in which capabilities are sacrificed.
    pub const PRIORITY: [Slot; SLOT_COUNT] = [
        Slot::DebugBit,
        Slot::Antialias,
        Slot::ReduceStencil,
        Slot::DisableStencil,
        Slot::ReduceDepth,
        Slot::ColorBpp,
        Slot::ReduceAlpha,
        Slot::DisableAlpha,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether relaxing this family would change anything for `original`.
    pub fn is_relaxable(self, original: &CapabilityAttributes) -> bool {
        match self {
            Slot::DebugBit => original.debug_context,
            Slot::Antialias => original.aa_samples > 0,
            Slot::ReduceStencil => original.stencil_bits > 1,
            Slot::DisableStencil => original.stencil_bits > 0,
            Slot::ReduceDepth => original.depth_bits > 1,
            Slot::ColorBpp => {
                !original.force_exact_color_bpp
                    && (original.red_bits > 1 || original.green_bits > 1 || original.blue_bits > 1)
            }
            Slot::ReduceAlpha => original.alpha_bits > 1,
            Slot::DisableAlpha => original.alpha_bits > 0,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Slot::DebugBit => "debug-bit",
            Slot::Antialias => "antialias",
            Slot::ReduceStencil => "reduce-stencil",
            Slot::DisableStencil => "disable-stencil",
            Slot::ReduceDepth => "reduce-depth",
            Slot::ColorBpp => "color-bpp",
            Slot::ReduceAlpha => "reduce-alpha",
            Slot::DisableAlpha => "disable-alpha",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// Nothing to relax for this request
    Inactive,
    NotTried,
    CurrentlyTesting,
    /// Relaxed, but relaxing it alone was not enough
    TentativelyRemoved,
    /// Relaxation confirmed as needed
    PermanentlyFixed,
}

impl SlotState {
    /// Whether the slot's relaxation is part of the next candidate.
    #[inline]
    pub fn is_applied(self) -> bool {
        matches!(
            self,
            SlotState::CurrentlyTesting
                | SlotState::TentativelyRemoved
                | SlotState::PermanentlyFixed
        )
    }
}

/// Tri-state retry tracking for one negotiation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    states: [SlotState; SLOT_COUNT],
    reset_used: [bool; SLOT_COUNT],
}

impl RetryState {
    /// Upper bound on engine iterations: every slot can start testing twice
    /// (once after its single reset), every rollback fixes one slot, plus
    /// the terminal attempt.
    pub const MAX_ITERATIONS: usize = 3 * SLOT_COUNT + 1;

    pub fn new(original: &CapabilityAttributes) -> Self {
        let mut states = [SlotState::Inactive; SLOT_COUNT];
        for slot in Slot::PRIORITY {
            if slot.is_relaxable(original) {
                states[slot.index()] = SlotState::NotTried;
            }
        }
        Self {
            states,
            reset_used: [false; SLOT_COUNT],
        }
    }

    #[inline]
    pub fn state(&self, slot: Slot) -> SlotState {
        self.states[slot.index()]
    }

    #[inline]
    pub fn is_applied(&self, slot: Slot) -> bool {
        self.state(slot).is_applied()
    }

    pub fn testing(&self) -> Option<Slot> {
        Slot::PRIORITY
            .into_iter()
            .find(|slot| self.state(*slot) == SlotState::CurrentlyTesting)
    }

    /// Number of slots that had something to relax.
    pub fn relaxable_count(&self) -> usize {
        self.states.iter().filter(|s| **s != SlotState::Inactive).count()
    }

    /// Slots whose relaxation is currently applied, in priority order.
    pub fn applied(&self) -> Vec<Slot> {
        Slot::PRIORITY
            .into_iter()
            .filter(|slot| self.is_applied(*slot))
            .collect()
    }

    /// First untried slot in priority order.
    pub fn next_untried(&self) -> Option<Slot> {
        Slot::PRIORITY
            .into_iter()
            .find(|slot| self.state(*slot) == SlotState::NotTried)
    }

    /// Start testing `slot`. Only a NotTried slot may begin, and only while
    /// nothing else is under test.
    pub fn begin_testing(&mut self, slot: Slot) -> bool {
        if self.state(slot) != SlotState::NotTried || self.testing().is_some() {
            return false;
        }
        self.states[slot.index()] = SlotState::CurrentlyTesting;
        true
    }

    /// The slot under test did not produce a context on its own.
    pub fn reject_testing(&mut self) -> Option<Slot> {
        let slot = self.testing()?;
        self.states[slot.index()] = SlotState::TentativelyRemoved;
        Some(slot)
    }

    /// A context was created. Fixes the slot under test and resets the
    /// tentative removals that it may have made unnecessary. Returns the
    /// slots sent back to NotTried; empty means the result is final.
    pub fn confirm_success(&mut self) -> Vec<Slot> {
        let Some(testing) = self.testing() else {
            return Vec::new();
        };
        self.states[testing.index()] = SlotState::PermanentlyFixed;

        let mut reset = Vec::new();
        for slot in Slot::PRIORITY {
            let i = slot.index();
            if self.states[i] == SlotState::TentativelyRemoved && !self.reset_used[i] {
                self.states[i] = SlotState::NotTried;
                self.reset_used[i] = true;
                reset.push(slot);
            }
        }
        reset
    }

    pub fn states(&self) -> &[SlotState; SLOT_COUNT] {
        &self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> CapabilityAttributes {
        CapabilityAttributes {
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 8,
            aa_samples: 4,
            debug_context: true,
            ..Default::default()
        }
    }

    #[test]
    fn zero_attributes_start_inactive() {
        let original = CapabilityAttributes {
            alpha_bits: 0,
            stencil_bits: 0,
            aa_samples: 0,
            debug_context: false,
            ..Default::default()
        };
        let state = RetryState::new(&original);
        assert_eq!(state.state(Slot::DebugBit), SlotState::Inactive);
        assert_eq!(state.state(Slot::Antialias), SlotState::Inactive);
        assert_eq!(state.state(Slot::DisableStencil), SlotState::Inactive);
        assert_eq!(state.state(Slot::DisableAlpha), SlotState::Inactive);
        assert_eq!(state.state(Slot::ReduceDepth), SlotState::NotTried);
        assert_eq!(state.state(Slot::ColorBpp), SlotState::NotTried);
        assert_eq!(state.relaxable_count(), 2);
    }

    #[test]
    fn exact_color_keeps_color_slot_inactive() {
        let original = CapabilityAttributes {
            force_exact_color_bpp: true,
            ..attrs()
        };
        let state = RetryState::new(&original);
        assert_eq!(state.state(Slot::ColorBpp), SlotState::Inactive);
        assert_eq!(state.state(Slot::ReduceAlpha), SlotState::NotTried);
    }

    #[test]
    fn only_one_slot_tests_at_a_time() {
        let mut state = RetryState::new(&attrs());
        assert!(state.begin_testing(Slot::DebugBit));
        assert!(!state.begin_testing(Slot::Antialias));
        assert_eq!(state.testing(), Some(Slot::DebugBit));
    }

    #[test]
    fn inactive_slot_never_begins() {
        let mut state = RetryState::new(&CapabilityAttributes {
            debug_context: false,
            ..attrs()
        });
        assert!(!state.begin_testing(Slot::DebugBit));
        assert_eq!(state.next_untried(), Some(Slot::Antialias));
    }

    #[test]
    fn success_resets_tentative_slots_once() {
        let mut state = RetryState::new(&attrs());
        state.begin_testing(Slot::DebugBit);
        assert_eq!(state.reject_testing(), Some(Slot::DebugBit));
        state.begin_testing(Slot::Antialias);

        assert_eq!(state.confirm_success(), vec![Slot::DebugBit]);
        assert_eq!(state.state(Slot::Antialias), SlotState::PermanentlyFixed);
        assert_eq!(state.state(Slot::DebugBit), SlotState::NotTried);

        // Second round: debug removal is needed after all
        state.begin_testing(Slot::DebugBit);
        state.reject_testing();
        state.begin_testing(Slot::ReduceStencil);
        assert!(state.confirm_success().is_empty());
        assert_eq!(state.state(Slot::DebugBit), SlotState::TentativelyRemoved);
        assert!(state.is_applied(Slot::DebugBit));
    }

    #[test]
    fn success_without_test_is_final() {
        let mut state = RetryState::new(&attrs());
        assert!(state.confirm_success().is_empty());
        assert!(state.applied().is_empty());
    }
}
