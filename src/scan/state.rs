use serde::{Deserialize, Serialize};

use crate::history::History;

/// The single in-flight decoded value awaiting an operator decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingValidation {
    pub payload: String,
}

/// One tagged state value instead of independent flags: being suspended
/// with no pending value is unrepresentable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
    Suspended {
        pending: PendingValidation,
    },
}

impl ScanState {
    pub fn is_suspended(&self) -> bool {
        matches!(self, ScanState::Suspended { .. })
    }
}

/// The controller-owned state tuple. Mutated only behind the controller's
/// mutex so no two transitions interleave.
#[derive(Debug, Default)]
pub(crate) struct ControllerState {
    pub scan: ScanState,
    pub last_payload: Option<String>,
    pub device_id: Option<String>,
    pub history: History,
}

impl ControllerState {
    pub fn begin(&mut self, device_id: &str) {
        self.scan = ScanState::Scanning;
        self.device_id = Some(device_id.to_string());
    }

    /// Duplicate-suppression gate. Returns true when the payload was fresh
    /// and the state moved to `Suspended`; a payload equal to the
    /// previously seen one is dropped with no side effect.
    pub fn try_suspend(&mut self, payload: &str) -> bool {
        if !matches!(self.scan, ScanState::Scanning) {
            return false;
        }
        if self.last_payload.as_deref() == Some(payload) {
            return false;
        }

        self.last_payload = Some(payload.to_string());
        self.scan = ScanState::Suspended {
            pending: PendingValidation {
                payload: payload.to_string(),
            },
        };
        true
    }

    /// Operator accepted: hand back the payload and return to `Scanning`.
    /// `last_payload` stays set so the still-visible code keeps being
    /// suppressed.
    pub fn accept_pending(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.scan, ScanState::Scanning) {
            ScanState::Suspended { pending } => Some(pending.payload),
            other => {
                self.scan = other;
                None
            }
        }
    }

    /// Operator rejected: drop the pending value and forget the payload so
    /// the same code can trigger again on a later frame.
    pub fn reject_pending(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.scan, ScanState::Scanning) {
            ScanState::Suspended { pending } => {
                self.last_payload = None;
                Some(pending.payload)
            }
            other => {
                self.scan = other;
                None
            }
        }
    }

    /// Back to `Idle`; any pending value is discarded unrecorded.
    pub fn halt(&mut self) {
        self.scan = ScanState::Idle;
        self.device_id = None;
    }

    pub fn pending_payload(&self) -> Option<&str> {
        match &self.scan {
            ScanState::Suspended { pending } => Some(pending.payload.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanning_state() -> ControllerState {
        let mut state = ControllerState::default();
        state.begin("cam0");
        state
    }

    #[test]
    fn decode_is_ignored_while_idle() {
        let mut state = ControllerState::default();
        assert!(!state.try_suspend("A"));
        assert_eq!(state.scan, ScanState::Idle);
        assert_eq!(state.last_payload, None);
    }

    #[test]
    fn fresh_payload_suspends_and_marks_last() {
        let mut state = scanning_state();
        assert!(state.try_suspend("A"));
        assert!(state.scan.is_suspended());
        assert_eq!(state.pending_payload(), Some("A"));
        assert_eq!(state.last_payload.as_deref(), Some("A"));
    }

    #[test]
    fn repeated_payload_is_dropped_without_resuspension() {
        let mut state = scanning_state();
        assert!(state.try_suspend("A"));
        assert_eq!(state.accept_pending().as_deref(), Some("A"));

        assert!(!state.try_suspend("A"));
        assert_eq!(state.scan, ScanState::Scanning);
    }

    #[test]
    fn decode_while_suspended_is_ignored() {
        let mut state = scanning_state();
        assert!(state.try_suspend("A"));
        assert!(!state.try_suspend("B"));
        assert_eq!(state.pending_payload(), Some("A"));
    }

    #[test]
    fn accept_keeps_suppression_reject_resets_it() {
        let mut state = scanning_state();
        state.try_suspend("A");
        state.accept_pending();
        assert_eq!(state.last_payload.as_deref(), Some("A"));

        state.try_suspend("B");
        state.reject_pending();
        assert_eq!(state.last_payload, None);

        // Rejected payloads are detectable again.
        assert!(state.try_suspend("B"));
    }

    #[test]
    fn accept_and_reject_are_noops_when_nothing_pending() {
        let mut state = scanning_state();
        assert_eq!(state.accept_pending(), None);
        assert_eq!(state.reject_pending(), None);
        assert_eq!(state.scan, ScanState::Scanning);

        let mut idle = ControllerState::default();
        assert_eq!(idle.accept_pending(), None);
        assert_eq!(idle.scan, ScanState::Idle);
    }

    #[test]
    fn halt_discards_pending() {
        let mut state = scanning_state();
        state.try_suspend("A");
        state.halt();
        assert_eq!(state.scan, ScanState::Idle);
        assert_eq!(state.pending_payload(), None);
        assert_eq!(state.device_id, None);
    }

    #[test]
    fn state_serializes_with_status_tag() {
        let state = ScanState::Suspended {
            pending: PendingValidation {
                payload: "A".into(),
            },
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "suspended");
        assert_eq!(json["pending"]["payload"], "A");

        let idle = serde_json::to_value(ScanState::Idle).unwrap();
        assert_eq!(idle["status"], "idle");
    }
}
