use mira_core::{ApprovedCall, ControllerError, GateKind, PendingAction};
use mira_policy::{normalize_tool, SessionTrust};
use tracing::info;

/// Single-slot holder for a gated tool call awaiting the operator.
///
/// Every offered action gets exactly one resolution: confirm once, reject,
/// or trust-and-confirm. The gate never consults session trust on offer;
/// the caller skips it for trusted tools.
#[derive(Debug, Default)]
pub struct PendingActionGate {
    pending: Option<PendingAction>,
}

impl PendingActionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    pub fn offer(&mut self, action: PendingAction) -> Result<(), ControllerError> {
        if let Some(open) = &self.pending {
            return Err(ControllerError::ProtocolViolation {
                open: GateKind::PendingAction,
                rejected: format!("tool call '{}' (holding '{}')", action.tool, open.tool),
            });
        }
        info!("Holding tool call for confirmation: {}", action.tool);
        self.pending = Some(action);
        Ok(())
    }

    pub fn confirm_once(&mut self) -> Result<ApprovedCall, ControllerError> {
        let action = self.pending.take().ok_or(ControllerError::NothingPending)?;
        Ok(approved(action))
    }

    pub fn reject(&mut self) -> Result<PendingAction, ControllerError> {
        self.pending.take().ok_or(ControllerError::NothingPending)
    }

    /// Grant session trust for `tool` and release the pending call.
    ///
    /// `tool` must name the pending call. Nothing changes on error.
    pub fn trust_and_confirm(
        &mut self,
        tool: &str,
        trust: &mut SessionTrust,
    ) -> Result<ApprovedCall, ControllerError> {
        let pending = self.pending.as_ref().ok_or(ControllerError::NothingPending)?;
        if normalize_tool(&pending.tool) != normalize_tool(tool) {
            return Err(ControllerError::ToolMismatch {
                pending: pending.tool.clone(),
                requested: tool.to_string(),
            });
        }
        trust
            .grant(tool)
            .map_err(|e| ControllerError::Storage(e.to_string()))?;
        self.confirm_once()
    }

    pub fn clear(&mut self) -> Option<PendingAction> {
        self.pending.take()
    }
}

fn approved(action: PendingAction) -> ApprovedCall {
    ApprovedCall {
        tool: action.tool,
        args: action.args,
        call_id: action.call_id,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use mira_memory::{KeyValueStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    fn action(tool: &str) -> PendingAction {
        PendingAction {
            tool: tool.to_string(),
            message: format!("Run {}?", tool),
            args: json!({"policy_id": "P-1"}),
            call_id: Some("call-1".to_string()),
        }
    }

    #[test]
    fn test_confirm_once_returns_call_and_clears() {
        let mut gate = PendingActionGate::new();
        gate.offer(action("updatePolicy")).unwrap();

        let call = gate.confirm_once().unwrap();
        assert_eq!(call.tool, "updatePolicy");
        assert_eq!(call.args, json!({"policy_id": "P-1"}));
        assert!(!gate.is_open());
        assert!(matches!(gate.confirm_once(), Err(ControllerError::NothingPending)));
    }

    #[test]
    fn test_second_offer_is_violation_and_keeps_first() {
        let mut gate = PendingActionGate::new();
        gate.offer(action("updatePolicy")).unwrap();

        let err = gate.offer(action("deleteCustomer")).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::ProtocolViolation {
                open: GateKind::PendingAction,
                ..
            }
        ));
        assert_eq!(gate.current().unwrap().tool, "updatePolicy");
    }

    #[test]
    fn test_reject_returns_action_without_call() {
        let mut gate = PendingActionGate::new();
        gate.offer(action("submitQuote")).unwrap();
        let rejected = gate.reject().unwrap();
        assert_eq!(rejected.tool, "submitQuote");
        assert!(gate.current().is_none());
    }

    #[test]
    fn test_trust_and_confirm_grants_session_trust() {
        let store = Arc::new(MemoryStore::new());
        let mut trust = SessionTrust::hydrate(store.clone());
        let mut gate = PendingActionGate::new();
        gate.offer(action("sendEmail")).unwrap();

        let call = gate.trust_and_confirm("sendEmail", &mut trust).unwrap();
        assert_eq!(call.tool, "sendEmail");
        assert!(trust.contains("sendemail"));
        assert!(store.get(mira_memory::keys::TRUSTED_SKILLS).is_some());
        assert!(!gate.is_open());
    }

    #[test]
    fn test_trust_and_confirm_rejects_other_tool() {
        let mut trust = SessionTrust::hydrate(Arc::new(MemoryStore::new()));
        let mut gate = PendingActionGate::new();
        gate.offer(action("sendEmail")).unwrap();

        let err = gate.trust_and_confirm("deleteCustomer", &mut trust).unwrap_err();
        assert!(matches!(err, ControllerError::ToolMismatch { .. }));
        assert!(trust.is_empty());
        assert!(gate.is_open());
    }
}
