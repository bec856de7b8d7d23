use serde::{Deserialize, Serialize};
use tripwire_core::PayloadFormat;

use super::expression_text;

/// Externally tagged: `{ setVariable: {..} }` or `{ sns: {..} }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ActionDefinition {
    SetVariable(SetVariableAction),
    #[serde(rename = "sns", alias = "notify")]
    Notify(NotifyAction),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetVariableAction {
    pub variable_name: String,
    #[serde(deserialize_with = "expression_text")]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotifyAction {
    /// Routing target handed to the sink (a topic ARN in the source format).
    #[serde(alias = "target")]
    pub target_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<PayloadDefinition>,
}

/// Message template attached to a notify action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PayloadDefinition {
    pub content_expression: String,
    #[serde(rename = "type", default)]
    pub format: PayloadFormat,
}
