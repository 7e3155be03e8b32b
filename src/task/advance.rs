//! Task advance policy
//!
//! Decides when a transition may move the active index forward. Depending
//! on the configured mode the pilot must arm points first; the request to
//! arm is surfaced through `need_to_arm` and the `request_arm` event.

use super::TaskPointKind;

/// Pilot-configured advance behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdvanceMode {
    /// Advance on every qualifying transition
    #[default]
    Auto,
    /// The start must be armed, later points advance automatically
    ArmStart,
    /// Every point must be armed
    Arm,
    /// Only explicit calls advance the task
    Manual,
}

/// Advance state machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskAdvance {
    mode: AdvanceMode,
    armed: bool,
    request_armed: bool,
}

impl TaskAdvance {
    pub fn new(mode: AdvanceMode) -> Self {
        Self {
            mode,
            armed: false,
            request_armed: false,
        }
    }

    pub fn mode(&self) -> AdvanceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AdvanceMode) {
        self.mode = mode;
        self.reset();
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn set_armed(&mut self, armed: bool) {
        self.armed = armed;
        self.request_armed = false;
    }

    /// A qualifying transition happened but the point was not armed.
    pub fn need_to_arm(&self) -> bool {
        self.request_armed
    }

    pub fn reset(&mut self) {
        self.armed = false;
        self.request_armed = false;
    }

    /// Whether the transition pair of the active point allows advancing now.
    ///
    /// A start advances on exiting its zone while the gate is open; an
    /// intermediate on entering; a finish never advances. When the mode
    /// requires arming and the point is not armed, the request is latched
    /// instead.
    pub fn check_ready_to_advance(
        &mut self,
        kind: TaskPointKind,
        transition_enter: bool,
        transition_exit: bool,
        start_gate_open: bool,
    ) -> bool {
        let state_ready = match kind {
            TaskPointKind::Start => transition_exit && start_gate_open,
            TaskPointKind::Intermediate(_) => transition_enter,
            TaskPointKind::Finish => false,
        };

        let needs_arm = match (self.mode, kind) {
            (AdvanceMode::Manual, _) => return false,
            (AdvanceMode::Auto, _) => false,
            (AdvanceMode::Arm, _) => true,
            (AdvanceMode::ArmStart, TaskPointKind::Start) => true,
            (AdvanceMode::ArmStart, _) => false,
        };

        if !needs_arm {
            return state_ready;
        }

        if self.armed {
            state_ready
        } else {
            if state_ready {
                self.request_armed = true;
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::IntermediateKind;

    const RACING: TaskPointKind = TaskPointKind::Intermediate(IntermediateKind::Racing);

    #[test]
    fn test_auto_advances_on_transitions() {
        let mut adv = TaskAdvance::new(AdvanceMode::Auto);
        assert!(adv.check_ready_to_advance(TaskPointKind::Start, false, true, true));
        assert!(adv.check_ready_to_advance(RACING, true, false, true));
        assert!(!adv.check_ready_to_advance(TaskPointKind::Finish, true, false, true));
    }

    #[test]
    fn test_start_gate_blocks_auto_start() {
        let mut adv = TaskAdvance::new(AdvanceMode::Auto);
        assert!(!adv.check_ready_to_advance(TaskPointKind::Start, false, true, false));
    }

    #[test]
    fn test_manual_never_advances() {
        let mut adv = TaskAdvance::new(AdvanceMode::Manual);
        assert!(!adv.check_ready_to_advance(TaskPointKind::Start, false, true, true));
        assert!(!adv.need_to_arm());
    }

    #[test]
    fn test_arm_latches_request() {
        let mut adv = TaskAdvance::new(AdvanceMode::Arm);
        assert!(!adv.check_ready_to_advance(RACING, true, false, true));
        assert!(adv.need_to_arm());

        adv.set_armed(true);
        assert!(!adv.need_to_arm());
        assert!(adv.check_ready_to_advance(RACING, true, false, true));
    }

    #[test]
    fn test_arm_start_only_gates_the_start() {
        let mut adv = TaskAdvance::new(AdvanceMode::ArmStart);
        assert!(!adv.check_ready_to_advance(TaskPointKind::Start, false, true, true));
        assert!(adv.need_to_arm());

        adv.set_armed(true);
        assert!(adv.check_ready_to_advance(TaskPointKind::Start, false, true, true));

        adv.set_armed(false);
        assert!(adv.check_ready_to_advance(RACING, true, false, true));
    }

    #[test]
    fn test_no_transition_no_request() {
        let mut adv = TaskAdvance::new(AdvanceMode::Arm);
        assert!(!adv.check_ready_to_advance(RACING, false, false, true));
        assert!(!adv.need_to_arm());
    }
}
