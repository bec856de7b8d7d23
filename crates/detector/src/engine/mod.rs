//! Keyed detector engine.
//!
//! Owns one [`Instance`] per key, created lazily on the first reading for
//! that key. The instance map is only locked for lookup and insert; a
//! reading holds just its own key's mutex while rules run, so readings for
//! different keys never wait on each other and readings for the same key
//! are applied one at a time.

mod payload;
mod rules;
mod types;

#[cfg(test)]
mod tests;

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tripwire_core::{AttributeSet, CoreError, Reading};

use crate::model::{DetectorModel, RuleGroup};

use self::rules::{Instance, Run};
pub use self::types::{EmittedAction, Evaluation, InstanceSnapshot, ResolvedAction};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model '{0}' has no key attribute; readings must carry an explicit key")]
    NoKeyAttribute(String),

    #[error(transparent)]
    Reading(#[from] CoreError),
}

pub struct DetectorEngine {
    model: Arc<DetectorModel>,
    instances: RwLock<HashMap<String, Arc<Mutex<Instance>>>>,
}

impl DetectorEngine {
    pub fn new(model: Arc<DetectorModel>) -> Self {
        Self {
            model,
            instances: RwLock::new(HashMap::new()),
        }
    }

    pub fn model(&self) -> &Arc<DetectorModel> {
        &self.model
    }

    /// Apply one reading to the instance for `key`.
    ///
    /// A new key starts in the initial state and runs its `onEnter` rules
    /// first. Then the current state's `onInput` rules run; if one of them
    /// selects a transition, the old state's `onExit` and the new state's
    /// `onEnter` follow.
    pub fn process(&self, key: &str, attributes: &AttributeSet) -> Evaluation {
        let attributes = self.declared(attributes);
        let instance = self.instance_for(key);
        let mut instance = instance.lock().unwrap_or_else(PoisonError::into_inner);

        let mut run = Run {
            model: &self.model,
            key,
            attributes: &attributes,
            instance: &mut instance,
            actions: Vec::new(),
        };

        let created = !run.instance.initialized;
        if created {
            run.instance.initialized = true;
            run.group(RuleGroup::OnEnter);
            tracing::debug!(
                model = %self.model.name(),
                key,
                state = %self.model.state(run.instance.state).name,
                "instance created"
            );
        }

        let previous = run.instance.state;
        if let Some(target) = run.group(RuleGroup::OnInput) {
            run.group(RuleGroup::OnExit);
            run.instance.state = target;
            run.group(RuleGroup::OnEnter);
            tracing::info!(
                model = %self.model.name(),
                key,
                from = %self.model.state(previous).name,
                to = %self.model.state(target).name,
                "state transition"
            );
        }

        let state = run.instance.state;
        Evaluation {
            key: key.to_string(),
            created,
            previous_state: self.model.state(previous).name.clone(),
            state: self.model.state(state).name.clone(),
            actions: run.actions,
        }
    }

    pub fn process_reading(&self, reading: &Reading) -> Evaluation {
        self.process(&reading.key, &reading.attributes)
    }

    /// Build a reading from a raw JSON payload using the model's key attribute.
    pub fn reading_from_payload(&self, payload: &serde_json::Value) -> Result<Reading, EngineError> {
        let key_path = self
            .model
            .key()
            .ok_or_else(|| EngineError::NoKeyAttribute(self.model.name().to_string()))?;
        Ok(Reading::from_payload(key_path, payload)?)
    }

    /// Accept either an explicit envelope, `{"key": .., "attributes": {..}}`
    /// (`payload` is an alias for `attributes`), or a raw payload keyed by
    /// the model's key attribute.
    pub fn reading_from_json(&self, value: &serde_json::Value) -> Result<Reading, EngineError> {
        let envelope = value.as_object().and_then(|object| {
            let key = object.get("key")?.as_str()?;
            let body = object.get("attributes").or_else(|| object.get("payload"))?;
            (object.len() == 2 && body.is_object()).then_some((key, body))
        });

        match envelope {
            Some((key, _)) if key.is_empty() => Err(CoreError::MissingKey("key".to_string()).into()),
            Some((key, body)) => Ok(Reading::new(key, AttributeSet::from_json(body)?)),
            None => self.reading_from_payload(value),
        }
    }

    /// Snapshot of the instance for `key`, if one exists.
    pub fn instance(&self, key: &str) -> Option<InstanceSnapshot> {
        let instance = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;
        let instance = instance.lock().unwrap_or_else(PoisonError::into_inner);
        Some(InstanceSnapshot {
            key: key.to_string(),
            state: self.model.state(instance.state).name.clone(),
            variables: instance.variables.clone(),
        })
    }

    /// Keys of all live instances, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.instances.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn instance_for(&self, key: &str) -> Arc<Mutex<Instance>> {
        if let Some(existing) = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(existing);
        }

        let mut instances = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            instances
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Instance::new(self.model.initial_state())))),
        )
    }

    /// Drop attributes the model's input does not declare.
    fn declared<'a>(&self, attributes: &'a AttributeSet) -> Cow<'a, AttributeSet> {
        match self.model.declared_attributes() {
            Some(declared) if attributes.iter().any(|(p, _)| !declared.iter().any(|d| d == p)) => {
                let mut filtered = attributes.clone();
                filtered.retain_declared(declared);
                Cow::Owned(filtered)
            }
            _ => Cow::Borrowed(attributes),
        }
    }
}
