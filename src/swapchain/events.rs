//! C5.4: event dispatch, expressed as a pure reducer over plain structs
//! so it is unit-testable without a live connection (spec §4.5.4, and
//! SPEC_FULL's note that this is "written as a pure function over plain
//! structs, not over live X11 types, specifically so it is
//! unit-testable").

use crate::{error::Status, utils::x11rb::CompleteMode};

/// The bookkeeping fields of one slot the reducer needs to read or
/// write. A thin mirror of the relevant fields of
/// [`crate::image::ImageSlot`], kept separate so this module has no
/// dependency on x11rb types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBookkeeping {
    /// Server-side pixmap id, used to match `IDLE_NOTIFY` to a slot.
    pub pixmap: u32,
    /// Spec invariant 2.
    pub busy: bool,
    /// Spec invariant 3.
    pub present_queued: bool,
    /// `send_sbc` value at the last present of this slot.
    pub serial: u64,
}

/// Everything the reducer needs from the swapchain, and everything it
/// may mutate, gathered in one place so `apply_event` can be a pure
/// function of `(state, event)`.
#[derive(Debug)]
pub struct ReducerState<'a> {
    /// Every slot's bookkeeping, in ring order.
    pub slots: &'a mut [SlotBookkeeping],
    /// The extent the swapchain was created with; never changes here.
    pub locked_extent: (u16, u16),
    /// Images currently owned by the server (spec invariant 1).
    pub sent_image_count: u32,
    /// Most recent MSC reported by the server.
    pub last_present_msc: u64,
    /// Latched once a flip is observed (spec §4.5.4 "mode=FLIP").
    pub copy_is_suboptimal: bool,
}

/// One decoded Present event, reduced to exactly the fields that affect
/// dispatch (a reducer-local mirror of
/// [`crate::utils::x11rb::SpecialEvent`]).
#[derive(Debug, Clone, Copy)]
pub enum ReducerEvent {
    /// `CONFIGURE_NOTIFY`.
    Configure {
        /// Reported width.
        width: u16,
        /// Reported height.
        height: u16,
    },
    /// `IDLE_NOTIFY`.
    Idle {
        /// The pixmap that became idle.
        pixmap: u32,
    },
    /// `COMPLETE_NOTIFY`, kind=Pixmap.
    Complete {
        /// Serial this completion matches.
        serial: u32,
        /// MSC the server reports.
        msc: u64,
        /// Flip, copy, or suboptimal-copy.
        mode: CompleteMode,
    },
}

/// Result of folding one event into `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    /// The status this event contributes (fed through the caller's
    /// [`crate::error::StatusLatch`]).
    pub status: Status,
    /// Set when an `IDLE_NOTIFY` identified a slot that should be
    /// pushed onto the acquire queue (fifo modes only; the caller
    /// decides whether an acquire queue exists at all).
    pub became_idle: Option<usize>,
}

/// Applies one Present event to `state`, per spec §4.5.4.
pub fn apply_event(state: &mut ReducerState<'_>, event: ReducerEvent) -> EventOutcome {
    match event {
        ReducerEvent::Configure { width, height } => {
            let status = if (width, height) != state.locked_extent {
                Status::Suboptimal
            } else {
                Status::Success
            };
            EventOutcome {
                status,
                became_idle: None,
            }
        }
        ReducerEvent::Idle { pixmap } => {
            let became_idle = state.slots.iter().position(|s| s.pixmap == pixmap);
            if let Some(idx) = became_idle {
                state.slots[idx].busy = false;
                state.sent_image_count = state.sent_image_count.saturating_sub(1);
            }
            EventOutcome {
                status: Status::Success,
                became_idle,
            }
        }
        ReducerEvent::Complete { serial, msc, mode } => {
            // Only one present is ever outstanding per slot (invariant 3),
            // so matching on the low 32 bits of the serial the wire
            // format carries is unambiguous even though `send_sbc`
            // itself never wraps in practice.
            let matched = state
                .slots
                .iter()
                .position(|s| s.present_queued && (s.serial as u32) == serial);

            if let Some(idx) = matched {
                state.slots[idx].present_queued = false;
            }
            if msc > state.last_present_msc {
                state.last_present_msc = msc;
            }

            let status = match mode {
                CompleteMode::Copy => {
                    if state.copy_is_suboptimal {
                        Status::Suboptimal
                    } else {
                        Status::Success
                    }
                }
                CompleteMode::Flip => {
                    state.copy_is_suboptimal = true;
                    Status::Success
                }
                CompleteMode::SuboptimalCopy => Status::Suboptimal,
            };

            EventOutcome {
                status,
                became_idle: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots() -> Vec<SlotBookkeeping> {
        vec![
            SlotBookkeeping { pixmap: 10, busy: true, present_queued: false, serial: 0 },
            SlotBookkeeping { pixmap: 11, busy: true, present_queued: true, serial: 1 },
            SlotBookkeeping { pixmap: 12, busy: false, present_queued: false, serial: 0 },
        ]
    }

    fn state(slots: &mut [SlotBookkeeping]) -> ReducerState<'_> {
        ReducerState {
            slots,
            locked_extent: (800, 600),
            sent_image_count: 2,
            last_present_msc: 5,
            copy_is_suboptimal: false,
        }
    }

    #[test]
    fn configure_matching_extent_is_success() {
        let mut slots = slots();
        let mut state = state(&mut slots);
        let outcome = apply_event(&mut state, ReducerEvent::Configure { width: 800, height: 600 });
        assert_eq!(outcome.status, Status::Success);
    }

    #[test]
    fn configure_mismatched_extent_is_suboptimal_without_resizing() {
        let mut slots = slots();
        let mut state = state(&mut slots);
        let outcome = apply_event(&mut state, ReducerEvent::Configure { width: 801, height: 600 });
        assert_eq!(outcome.status, Status::Suboptimal);
        assert_eq!(state.locked_extent, (800, 600));
    }

    #[test]
    fn idle_clears_busy_and_decrements_sent_count() {
        let mut slots = slots();
        let mut state = state(&mut slots);
        let outcome = apply_event(&mut state, ReducerEvent::Idle { pixmap: 11 });
        assert_eq!(outcome.became_idle, Some(1));
        assert!(!state.slots[1].busy);
        assert_eq!(state.sent_image_count, 1);
    }

    #[test]
    fn idle_for_unknown_pixmap_is_a_noop() {
        let mut slots = slots();
        let mut state = state(&mut slots);
        let outcome = apply_event(&mut state, ReducerEvent::Idle { pixmap: 999 });
        assert_eq!(outcome.became_idle, None);
        assert_eq!(state.sent_image_count, 2);
    }

    #[test]
    fn complete_copy_before_any_flip_is_success() {
        let mut slots = slots();
        let mut state = state(&mut slots);
        let outcome = apply_event(
            &mut state,
            ReducerEvent::Complete { serial: 1, msc: 6, mode: CompleteMode::Copy },
        );
        assert_eq!(outcome.status, Status::Success);
        assert!(!state.slots[1].present_queued);
        assert_eq!(state.last_present_msc, 6);
    }

    #[test]
    fn flip_then_copy_reports_suboptimal_and_stays_latched() {
        let mut slots = slots();
        let mut state = state(&mut slots);

        let flip = apply_event(
            &mut state,
            ReducerEvent::Complete { serial: 1, msc: 6, mode: CompleteMode::Flip },
        );
        assert_eq!(flip.status, Status::Success);
        assert!(state.copy_is_suboptimal);

        slots[1].present_queued = true;
        slots[1].serial = 2;
        let copy = apply_event(
            &mut state,
            ReducerEvent::Complete { serial: 2, msc: 7, mode: CompleteMode::Copy },
        );
        assert_eq!(copy.status, Status::Suboptimal);
    }

    #[test]
    fn suboptimal_copy_mode_is_always_suboptimal() {
        let mut slots = slots();
        let mut state = state(&mut slots);
        let outcome = apply_event(
            &mut state,
            ReducerEvent::Complete { serial: 1, msc: 6, mode: CompleteMode::SuboptimalCopy },
        );
        assert_eq!(outcome.status, Status::Suboptimal);
    }

    #[test]
    fn complete_with_no_matching_serial_still_advances_msc() {
        let mut slots = slots();
        let mut state = state(&mut slots);
        let outcome = apply_event(
            &mut state,
            ReducerEvent::Complete { serial: 999, msc: 9, mode: CompleteMode::Copy },
        );
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(state.last_present_msc, 9);
    }
}
