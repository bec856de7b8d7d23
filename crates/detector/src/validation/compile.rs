//! Structural checks and model construction.

use std::collections::{BTreeSet, HashMap};

use crate::model::{Action, DetectorModel, ModelInput, Payload, Rule, State};
use crate::schema::{
    ActionDefinition, DetectorModelDocument, EventDefinition, InputDefinition, StateDefinition,
    TransitionEventDefinition,
};

use super::expressions;
use super::fuzzy::{fuzzy_match, is_identifier};
use super::ValidationResult;

const DEFAULT_MODEL_NAME: &str = "detector";

struct Compiler<'a> {
    result: ValidationResult,
    input: Option<&'a InputDefinition>,
    /// First occurrence wins for duplicated names (which are errors anyway).
    state_index: HashMap<&'a str, usize>,
    state_names: Vec<&'a str>,
    /// Variables read by any expression, with where they were read.
    reads: Vec<(String, String)>,
    writes: BTreeSet<String>,
    /// States some transition can reach.
    targets: BTreeSet<usize>,
}

/// Build the model, or `None` if any error was found.
pub(super) fn compile(doc: &DetectorModelDocument) -> (Option<DetectorModel>, ValidationResult) {
    let definition = &doc.detector_model_definition;
    let mut c = Compiler {
        result: ValidationResult::new(),
        input: doc.input.as_ref(),
        state_index: HashMap::new(),
        state_names: definition.states.iter().map(|s| s.state_name.as_str()).collect(),
        reads: Vec::new(),
        writes: BTreeSet::new(),
        targets: BTreeSet::new(),
    };

    c.check_document(doc);
    c.index_states(&definition.states);

    let initial = match c.state_index.get(definition.initial_state_name.as_str()) {
        Some(&i) => Some(i),
        None => {
            if !definition.states.is_empty() {
                let suggestion = fuzzy_match(&definition.initial_state_name, &c.state_names);
                c.result.error_with_suggestion(
                    "initialStateName",
                    format!("initial state '{}' does not exist", definition.initial_state_name),
                    suggestion,
                );
            }
            None
        }
    };

    let states: Vec<State> = definition
        .states
        .iter()
        .enumerate()
        .map(|(i, s)| c.state(i, s))
        .collect();

    c.warn_unset_variables();
    if let Some(initial) = initial {
        c.warn_unreachable(&states, initial);
    }

    let Compiler { result, .. } = c;
    let model = match initial {
        Some(initial) if result.valid => Some(DetectorModel {
            name: doc
                .detector_model_name
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            description: doc.detector_model_description.clone(),
            key: doc.key.clone(),
            evaluation_method: doc.evaluation_method,
            input: doc.input.as_ref().map(|i| ModelInput {
                name: i.input_name.clone(),
                attributes: i.attributes.iter().map(|a| a.json_path.clone()).collect(),
            }),
            states,
            initial,
        }),
        _ => None,
    };
    (model, result)
}

impl<'a> Compiler<'a> {
    // ── Document-level settings ─────────────────────────────────────

    fn check_document(&mut self, doc: &DetectorModelDocument) {
        if let Some(name) = &doc.detector_model_name {
            if name.trim().is_empty() {
                self.result.error("detectorModelName", "model name must not be empty");
            }
        }
        if let Some(key) = &doc.key {
            if key.trim().is_empty() {
                self.result.error("key", "key attribute path must not be empty");
            } else if let Some(input) = &doc.input {
                let declared = input.paths();
                if !declared.is_empty() && !declared.contains(&key.as_str()) {
                    self.result.warn(
                        "key",
                        format!("key attribute '{key}' is not declared by input '{}'", input.input_name),
                    );
                }
            }
        }
        if let Some(input) = &doc.input {
            if input.input_name.trim().is_empty() {
                self.result.error("input.inputName", "input name must not be empty");
            }
            let mut seen = BTreeSet::new();
            for (i, attr) in input.attributes.iter().enumerate() {
                let path = format!("input.attributes[{i}].jsonPath");
                if attr.json_path.trim().is_empty() {
                    self.result.error(path, "attribute path must not be empty");
                } else if !seen.insert(attr.json_path.as_str()) {
                    self.result
                        .error(path, format!("attribute '{}' is declared twice", attr.json_path));
                }
            }
        }
    }

    // ── States ──────────────────────────────────────────────────────

    fn index_states(&mut self, states: &'a [StateDefinition]) {
        if states.is_empty() {
            self.result.error("states", "model must define at least one state");
        }
        for (i, state) in states.iter().enumerate() {
            let name = state.state_name.as_str();
            if name.trim().is_empty() {
                self.result
                    .error(format!("states[{i}].stateName"), "state name must not be empty");
            }
            if let Some(&first) = self.state_index.get(name) {
                self.result.error(
                    format!("states[{i}].stateName"),
                    format!("duplicate state name '{name}' (first defined at states[{first}])"),
                );
            } else {
                self.state_index.insert(name, i);
            }
        }
    }

    fn state(&mut self, i: usize, def: &StateDefinition) -> State {
        let base = format!("states[{i}]");
        let on_enter = self.events(&format!("{base}.onEnter.events"), &def.on_enter.events);
        let mut on_input = self.events(&format!("{base}.onInput.events"), &def.on_input.events);
        on_input.extend(self.transitions(
            &format!("{base}.onInput.transitionEvents"),
            &def.on_input.transition_events,
        ));
        let on_exit = self.events(&format!("{base}.onExit.events"), &def.on_exit.events);

        State {
            name: def.state_name.clone(),
            on_enter,
            on_input,
            on_exit,
        }
    }

    // ── Rules ───────────────────────────────────────────────────────

    fn events(&mut self, base: &str, events: &[EventDefinition]) -> Vec<Rule> {
        events
            .iter()
            .enumerate()
            .filter_map(|(j, e)| {
                self.rule(&format!("{base}[{j}]"), &e.event_name, &e.condition, &e.actions, None)
            })
            .collect()
    }

    fn transitions(&mut self, base: &str, events: &[TransitionEventDefinition]) -> Vec<Rule> {
        events
            .iter()
            .enumerate()
            .filter_map(|(j, e)| {
                let path = format!("{base}[{j}]");
                let target = match self.state_index.get(e.next_state.as_str()) {
                    Some(&t) => {
                        self.targets.insert(t);
                        Some(t)
                    }
                    None => {
                        let suggestion = fuzzy_match(&e.next_state, &self.state_names);
                        self.result.error_with_suggestion(
                            format!("{path}.nextState"),
                            format!("transition target '{}' does not exist", e.next_state),
                            suggestion,
                        );
                        None
                    }
                };
                let rule = self.rule(&path, &e.event_name, &e.condition, &e.actions, target)?;
                target.map(|_| rule)
            })
            .collect()
    }

    fn rule(
        &mut self,
        path: &str,
        name: &str,
        condition: &str,
        actions: &[ActionDefinition],
        next_state: Option<usize>,
    ) -> Option<Rule> {
        if name.trim().is_empty() {
            self.result.warn(format!("{path}.eventName"), "event has no name");
        }

        let condition_path = format!("{path}.condition");
        let condition = expressions::guard(&condition_path, condition, self.input, &mut self.result);
        if let Some(expr) = &condition {
            self.record_reads(&condition_path, expr);
        }

        let mut compiled = Vec::with_capacity(actions.len());
        let mut actions_ok = true;
        for (k, action) in actions.iter().enumerate() {
            match self.action(&format!("{path}.actions[{k}]"), action) {
                Some(a) => compiled.push(a),
                None => actions_ok = false,
            }
        }

        let condition = condition?;
        actions_ok.then(|| Rule {
            name: name.to_string(),
            condition,
            actions: compiled,
            next_state,
        })
    }

    fn record_reads(&mut self, path: &str, expr: &crate::expr::Expr) {
        for name in expr.variable_refs() {
            self.reads.push((path.to_string(), name.to_string()));
        }
    }

    // ── Actions ─────────────────────────────────────────────────────

    fn action(&mut self, path: &str, action: &ActionDefinition) -> Option<Action> {
        match action {
            ActionDefinition::SetVariable(set) => {
                let name_ok = is_identifier(&set.variable_name);
                if !name_ok {
                    self.result.error(
                        format!("{path}.setVariable.variableName"),
                        format!(
                            "variable name '{}' must start with a letter or '_' and contain only letters, digits and '_'",
                            set.variable_name
                        ),
                    );
                }
                let value_path = format!("{path}.setVariable.value");
                let value = expressions::value(&value_path, &set.value, self.input, &mut self.result);
                if let Some(expr) = &value {
                    self.record_reads(&value_path, expr);
                }
                self.writes.insert(set.variable_name.clone());

                let value = value?;
                name_ok.then(|| Action::SetVariable {
                    name: set.variable_name.clone(),
                    value,
                })
            }
            ActionDefinition::Notify(notify) => {
                let mut ok = true;
                if notify.target_arn.trim().is_empty() {
                    self.result
                        .error(format!("{path}.sns.targetArn"), "notify target must not be empty");
                    ok = false;
                }
                if let Some(payload) = &notify.payload {
                    ok &= expressions::payload_template(
                        &format!("{path}.sns.payload.contentExpression"),
                        &payload.content_expression,
                        &mut self.result,
                    );
                }
                ok.then(|| Action::Notify {
                    target: notify.target_arn.clone(),
                    payload: notify.payload.as_ref().map(|p| Payload {
                        template: p.content_expression.clone(),
                        format: p.format,
                    }),
                })
            }
        }
    }

    // ── Advisory checks ─────────────────────────────────────────────

    fn warn_unset_variables(&mut self) {
        let reads = std::mem::take(&mut self.reads);
        for (path, name) in reads {
            if !self.writes.contains(&name) {
                self.result.warn(
                    path,
                    format!("variable '{name}' is read but never set, so it always reads as 0"),
                );
            }
        }
    }

    fn warn_unreachable(&mut self, states: &[State], initial: usize) {
        for (i, state) in states.iter().enumerate() {
            if i != initial && !self.targets.contains(&i) {
                self.result.warn(
                    format!("states[{i}]"),
                    format!("state '{}' is never entered", state.name),
                );
            }
        }
    }
}
