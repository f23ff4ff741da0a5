//! Signal phases and the per-episode signal state.
//!
//! The junction runs one of eight phases, a green/yellow pair for each of the
//! four logical directions. Actions index the green phases:
//!
//! | action | green       | yellow       |
//! |--------|-------------|--------------|
//! | 0      | `NsGreen`   | `NsYellow`   |
//! | 1      | `NslGreen`  | `NslYellow`  |
//! | 2      | `EwGreen`   | `EwYellow`   |
//! | 3      | `EwlGreen`  | `EwlYellow`  |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of discrete high-level actions.
pub const NUM_ACTIONS: usize = 4;

/// Action substituted for anything outside `0..NUM_ACTIONS`.
pub const FALLBACK_ACTION: usize = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    NsGreen,
    NsYellow,
    NslGreen,
    NslYellow,
    EwGreen,
    EwYellow,
    EwlGreen,
    EwlYellow,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::NsGreen,
        Phase::NsYellow,
        Phase::NslGreen,
        Phase::NslYellow,
        Phase::EwGreen,
        Phase::EwYellow,
        Phase::EwlGreen,
        Phase::EwlYellow,
    ];

    /// Phase index as understood by the simulator.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Phase> {
        Phase::ALL.get(index).copied()
    }

    /// Green phase for an action. Out-of-range actions map to `NslGreen`.
    pub fn green_for(action: usize) -> Phase {
        Phase::ALL[normalize_action(action) * 2]
    }

    /// Yellow phase that closes the green phase of `action`.
    pub fn yellow_for(action: usize) -> Phase {
        Phase::ALL[normalize_action(action) * 2 + 1]
    }

    pub fn is_yellow(self) -> bool {
        self.index() % 2 == 1
    }

    /// The action whose green/yellow pair this phase belongs to.
    pub fn action(self) -> usize {
        self.index() / 2
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::NsGreen => "NS_GREEN",
            Phase::NsYellow => "NS_YELLOW",
            Phase::NslGreen => "NSL_GREEN",
            Phase::NslYellow => "NSL_YELLOW",
            Phase::EwGreen => "EW_GREEN",
            Phase::EwYellow => "EW_YELLOW",
            Phase::EwlGreen => "EWL_GREEN",
            Phase::EwlYellow => "EWL_YELLOW",
        };
        f.write_str(name)
    }
}

/// Maps any requested action onto the valid action range.
pub fn normalize_action(action: usize) -> usize {
    if action < NUM_ACTIONS {
        action
    } else {
        FALLBACK_ACTION
    }
}

/// Mutable signal state owned by the environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignalState {
    /// Action held during the previous step, `None` right after reset
    pub last_action: Option<usize>,
    /// Ticks spent in the phase most recently commanded
    pub ticks_in_phase: usize,
    /// Phase most recently commanded, `None` right after reset
    pub current_phase: Option<Phase>,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase commands needed to serve `action` from this state.
    ///
    /// Returns the yellow phase to run first (if the action changed) and the
    /// green phase to hold afterwards.
    pub fn plan(&self, action: usize) -> (Option<Phase>, Phase) {
        let action = normalize_action(action);
        let yellow = match self.last_action {
            Some(last) if last != action => Some(Phase::yellow_for(last)),
            _ => None,
        };
        (yellow, Phase::green_for(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yellow_follows_green() {
        for action in 0..NUM_ACTIONS {
            let green = Phase::green_for(action);
            let yellow = Phase::yellow_for(action);
            assert_eq!(green.index(), action * 2);
            assert_eq!(yellow.index(), green.index() + 1);
            assert!(!green.is_yellow());
            assert!(yellow.is_yellow());
            assert_eq!(yellow.action(), action);
        }
    }

    #[test]
    fn test_out_of_range_action_is_ns_left() {
        assert_eq!(Phase::green_for(4), Phase::NslGreen);
        assert_eq!(Phase::green_for(usize::MAX), Phase::NslGreen);
        assert_eq!(Phase::yellow_for(17), Phase::NslYellow);
    }

    #[test]
    fn test_plan_first_step_has_no_yellow() {
        let state = SignalState::new();
        assert_eq!(state.plan(2), (None, Phase::EwGreen));
    }

    #[test]
    fn test_plan_changed_action_goes_through_yellow() {
        let state = SignalState {
            last_action: Some(0),
            ..SignalState::default()
        };
        assert_eq!(state.plan(2), (Some(Phase::NsYellow), Phase::EwGreen));
        assert_eq!(state.plan(0), (None, Phase::NsGreen));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Phase::EwlYellow.to_string(), "EWL_YELLOW");
        assert_eq!(Phase::from_index(4), Some(Phase::EwGreen));
        assert_eq!(Phase::from_index(8), None);
    }
}
