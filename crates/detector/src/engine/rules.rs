//! Execution of one state's rule group against one instance.

use tripwire_core::{Alert, AttributeSet};

use crate::expr::Variables;
use crate::model::{Action, DetectorModel, Rule, RuleGroup};
use crate::schema::EvaluationMethod;

use super::payload::{self, PayloadContext};
use super::types::{EmittedAction, ResolvedAction};

/// Mutable state of one detector instance.
#[derive(Debug, Clone)]
pub(crate) struct Instance {
    pub state: usize,
    pub variables: Variables,
    /// `onEnter` of the initial state has run.
    pub initialized: bool,
}

impl Instance {
    pub fn new(initial: usize) -> Self {
        Self {
            state: initial,
            variables: Variables::new(),
            initialized: false,
        }
    }
}

/// One `process` call, holding the instance's lock for its duration.
pub(crate) struct Run<'a> {
    pub model: &'a DetectorModel,
    pub key: &'a str,
    pub attributes: &'a AttributeSet,
    pub instance: &'a mut Instance,
    pub actions: Vec<EmittedAction>,
}

impl Run<'_> {
    /// Run `group` of the instance's current state.
    ///
    /// Returns the target of the first transition rule that fires; rules
    /// after it are not evaluated.
    pub fn group(&mut self, group: RuleGroup) -> Option<usize> {
        let model = self.model;
        let state = model.state(self.instance.state);
        let rules = state.rules(group);
        if rules.is_empty() {
            return None;
        }

        match model.evaluation_method() {
            EvaluationMethod::Serial => self.serial(group, &state.name, rules),
            EvaluationMethod::Batch => self.batch(group, &state.name, rules),
        }
    }

    /// Each write is visible to every later guard and value.
    fn serial(&mut self, group: RuleGroup, state: &str, rules: &[Rule]) -> Option<usize> {
        for rule in rules {
            if !self.fires(rule, None) {
                continue;
            }
            for action in &rule.actions {
                let emitted = self.resolve(group, state, rule, action, None);
                if let Some(ResolvedAction::SetVariable { name, value }) = &emitted {
                    self.instance.variables.insert(name.clone(), *value);
                }
                self.emit(group, state, rule, emitted);
            }
            if rule.next_state.is_some() {
                return rule.next_state;
            }
        }
        None
    }

    /// Guards and values see the variables as they were when the group
    /// started; writes are applied in order once the group is done.
    fn batch(&mut self, group: RuleGroup, state: &str, rules: &[Rule]) -> Option<usize> {
        let snapshot = self.instance.variables.clone();
        let mut writes: Vec<(String, f64)> = Vec::new();
        let mut transition = None;

        for rule in rules {
            if !self.fires(rule, Some(&snapshot)) {
                continue;
            }
            for action in &rule.actions {
                let emitted = self.resolve(group, state, rule, action, Some(&snapshot));
                if let Some(ResolvedAction::SetVariable { name, value }) = &emitted {
                    writes.push((name.clone(), *value));
                }
                self.emit(group, state, rule, emitted);
            }
            if rule.next_state.is_some() {
                transition = rule.next_state;
                break;
            }
        }

        for (name, value) in writes {
            self.instance.variables.insert(name, value);
        }
        transition
    }

    fn fires(&self, rule: &Rule, snapshot: Option<&Variables>) -> bool {
        let variables = snapshot.unwrap_or(&self.instance.variables);
        let fired = rule.condition.evaluate(self.attributes, variables).is_true();
        tracing::debug!(key = self.key, rule = %rule.name, fired, "rule evaluated");
        fired
    }

    fn resolve(
        &self,
        group: RuleGroup,
        state: &str,
        rule: &Rule,
        action: &Action,
        snapshot: Option<&Variables>,
    ) -> Option<ResolvedAction> {
        let variables = snapshot.unwrap_or(&self.instance.variables);
        match action {
            Action::SetVariable { name, value } => {
                match value.evaluate(self.attributes, variables).as_number() {
                    Some(v) => Some(ResolvedAction::SetVariable {
                        name: name.clone(),
                        value: v,
                    }),
                    None => {
                        tracing::debug!(
                            key = self.key,
                            %group,
                            rule = %rule.name,
                            variable = %name,
                            "value unavailable, variable left unchanged"
                        );
                        None
                    }
                }
            }
            Action::Notify { target, payload } => {
                let message = payload.as_ref().and_then(|p| {
                    payload::render(
                        p,
                        &PayloadContext {
                            detector_model: self.model.name(),
                            key: self.key,
                            state,
                            event_name: &rule.name,
                            target,
                            variables,
                            input: self.attributes,
                        },
                    )
                });
                Some(ResolvedAction::Notify(Alert {
                    detector_model: self.model.name().to_string(),
                    key: self.key.to_string(),
                    state: state.to_string(),
                    event_name: rule.name.clone(),
                    target: target.clone(),
                    variables: variables.clone(),
                    message,
                    format: payload.as_ref().map(|p| p.format).unwrap_or_default(),
                }))
            }
        }
    }

    fn emit(&mut self, group: RuleGroup, state: &str, rule: &Rule, action: Option<ResolvedAction>) {
        if let Some(action) = action {
            self.actions.push(EmittedAction {
                group,
                state: state.to_string(),
                event_name: rule.name.clone(),
                action,
            });
        }
    }
}
