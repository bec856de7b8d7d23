use serde::Serialize;
use tripwire_core::Alert;

use crate::expr::Variables;
use crate::model::RuleGroup;

/// An action that ran, with its expressions already evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolvedAction {
    SetVariable { name: String, value: f64 },
    Notify(Alert),
}

/// One executed action and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmittedAction {
    pub group: RuleGroup,
    /// State whose rule ran the action.
    pub state: String,
    pub event_name: String,
    pub action: ResolvedAction,
}

impl EmittedAction {
    pub fn alert(&self) -> Option<&Alert> {
        match &self.action {
            ResolvedAction::Notify(alert) => Some(alert),
            ResolvedAction::SetVariable { .. } => None,
        }
    }
}

/// Result of processing one reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub key: String,
    /// This reading created the instance (and ran the initial `onEnter`).
    pub created: bool,
    pub previous_state: String,
    pub state: String,
    /// Every action run, in execution order.
    pub actions: Vec<EmittedAction>,
}

impl Evaluation {
    pub fn transitioned(&self) -> bool {
        self.previous_state != self.state
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.actions.iter().filter_map(EmittedAction::alert)
    }

    pub fn into_alerts(self) -> Vec<Alert> {
        self.actions
            .into_iter()
            .filter_map(|a| match a.action {
                ResolvedAction::Notify(alert) => Some(alert),
                ResolvedAction::SetVariable { .. } => None,
            })
            .collect()
    }
}

/// Point-in-time copy of one detector instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    pub key: String,
    pub state: String,
    pub variables: Variables,
}
