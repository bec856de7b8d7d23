use serde::{Deserialize, Serialize};

use super::{default_condition, expression_text, ActionDefinition};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateDefinition {
    pub state_name: String,
    #[serde(default)]
    pub on_input: OnInputDefinition,
    #[serde(default)]
    pub on_enter: RuleGroupDefinition,
    #[serde(default)]
    pub on_exit: RuleGroupDefinition,
}

/// `onInput` rules. `events` run before `transitionEvents`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnInputDefinition {
    #[serde(default)]
    pub events: Vec<EventDefinition>,
    #[serde(default)]
    pub transition_events: Vec<TransitionEventDefinition>,
}

/// `onEnter` / `onExit` rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroupDefinition {
    #[serde(default)]
    pub events: Vec<EventDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinition {
    pub event_name: String,
    #[serde(default = "default_condition", deserialize_with = "expression_text")]
    pub condition: String,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEventDefinition {
    pub event_name: String,
    #[serde(default = "default_condition", deserialize_with = "expression_text")]
    pub condition: String,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
    pub next_state: String,
}
