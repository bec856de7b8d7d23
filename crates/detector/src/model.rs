//! Validated, immutable detector model.
//!
//! Built only by [`crate::validation`]. Every state index and transition
//! target inside a `DetectorModel` is known to be in range, so the engine
//! never has to look states up by name.

use std::fmt;

use serde::Serialize;
use tripwire_core::PayloadFormat;

use crate::expr::Expr;
use crate::schema::EvaluationMethod;

/// Which of a state's rule groups a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuleGroup {
    #[serde(rename = "onEnter")]
    OnEnter,
    #[serde(rename = "onInput")]
    OnInput,
    #[serde(rename = "onExit")]
    OnExit,
}

impl fmt::Display for RuleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleGroup::OnEnter => "onEnter",
            RuleGroup::OnInput => "onInput",
            RuleGroup::OnExit => "onExit",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub name: String,
    /// Declared attribute paths. Empty means every path is accepted.
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Minijinja template rendered against the firing instance.
    pub template: String,
    pub format: PayloadFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetVariable { name: String, value: Expr },
    Notify { target: String, payload: Option<Payload> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Diagnostic name; not unique.
    pub name: String,
    pub condition: Expr,
    pub actions: Vec<Action>,
    /// Index of the target state, for transition rules.
    pub next_state: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub name: String,
    pub on_enter: Vec<Rule>,
    /// Plain events first, then transition events, in declaration order.
    pub on_input: Vec<Rule>,
    pub on_exit: Vec<Rule>,
}

impl State {
    pub fn rules(&self, group: RuleGroup) -> &[Rule] {
        match group {
            RuleGroup::OnEnter => &self.on_enter,
            RuleGroup::OnInput => &self.on_input,
            RuleGroup::OnExit => &self.on_exit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorModel {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) key: Option<String>,
    pub(crate) evaluation_method: EvaluationMethod,
    pub(crate) input: Option<ModelInput>,
    pub(crate) states: Vec<State>,
    pub(crate) initial: usize,
}

impl DetectorModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Attribute path holding the instance key, when the model names one.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn evaluation_method(&self) -> EvaluationMethod {
        self.evaluation_method
    }

    pub fn input(&self) -> Option<&ModelInput> {
        self.input.as_ref()
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Indices come from `state_index` or from validated transition
    /// targets, so they are always in range.
    pub(crate) fn state(&self, index: usize) -> &State {
        &self.states[index]
    }

    pub fn state_named(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s.name == name)
    }

    pub(crate) fn initial_state(&self) -> usize {
        self.initial
    }

    pub fn initial_state_name(&self) -> &str {
        &self.states[self.initial].name
    }

    /// Declared input attribute paths, or `None` when every path is accepted.
    pub fn declared_attributes(&self) -> Option<&[String]> {
        self.input
            .as_ref()
            .map(|i| i.attributes.as_slice())
            .filter(|attrs| !attrs.is_empty())
    }
}
