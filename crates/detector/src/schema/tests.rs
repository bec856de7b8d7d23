//! Tests for schema types.

use super::*;
use tripwire_core::PayloadFormat;

/// The definition exactly as exported by the source deployment.
const SOURCE_DEFINITION_JSON: &str = r#"
{
  "states": [
    {
      "stateName": "Normal",
      "onInput": {
        "events": [],
        "transitionEvents": [
          {
            "eventName": "Overpressurized",
            "condition": "$input.PressureInput.sensorData.pressure > 70",
            "actions": [
              { "setVariable": { "variableName": "pressureThresholdBreached",
                                 "value": "$variable.pressureThresholdBreached + 3" } }
            ],
            "nextState": "Dangerous"
          }
        ]
      },
      "onEnter": {
        "events": [
          {
            "eventName": "init",
            "condition": "true",
            "actions": [
              { "setVariable": { "variableName": "pressureThresholdBreached", "value": "0" } }
            ]
          }
        ]
      },
      "onExit": { "events": [] }
    },
    {
      "stateName": "Dangerous",
      "onEnter": {
        "events": [
          {
            "eventName": "Pressure Threshold Breached",
            "condition": "$variable.pressureThresholdBreached > 1",
            "actions": [ { "sns": { "targetArn": "arn:aws:sns:us-east-1:123456789012:alerts" } } ]
          }
        ]
      }
    }
  ],
  "initialStateName": "Normal"
}
"#;

#[test]
fn parse_source_definition() {
    let def: DetectorModelDefinition = serde_json::from_str(SOURCE_DEFINITION_JSON).unwrap();
    assert_eq!(def.initial_state_name, "Normal");
    assert_eq!(def.states.len(), 2);

    let normal = &def.states[0];
    assert_eq!(normal.on_enter.events[0].event_name, "init");
    assert_eq!(normal.on_input.transition_events[0].next_state, "Dangerous");
    match &normal.on_enter.events[0].actions[0] {
        ActionDefinition::SetVariable(a) => {
            assert_eq!(a.variable_name, "pressureThresholdBreached");
            assert_eq!(a.value, "0");
        }
        other => panic!("expected setVariable, got {other:?}"),
    }

    // Missing rule groups default to empty.
    let dangerous = &def.states[1];
    assert!(dangerous.on_input.events.is_empty());
    assert!(dangerous.on_exit.events.is_empty());
    match &dangerous.on_enter.events[0].actions[0] {
        ActionDefinition::Notify(n) => {
            assert_eq!(n.target_arn, "arn:aws:sns:us-east-1:123456789012:alerts");
            assert!(n.payload.is_none());
        }
        other => panic!("expected sns, got {other:?}"),
    }
}

#[test]
fn bare_definition_is_wrapped_with_defaults() {
    let value: serde_json::Value = serde_json::from_str(SOURCE_DEFINITION_JSON).unwrap();
    let doc = DetectorModelDocument::from_value(value).unwrap();
    assert_eq!(doc.evaluation_method, EvaluationMethod::Serial);
    assert!(doc.key.is_none());
    assert!(doc.input.is_none());
    assert_eq!(doc.detector_model_definition.states.len(), 2);
}

#[test]
fn full_document_from_yaml() {
    let yaml = r#"
detectorModelName: MotorDetectorModel
key: motorid
evaluationMethod: BATCH
input:
  inputName: PressureInput
  attributes:
    - jsonPath: sensorData.pressure
    - jsonPath: motorid
detectorModelDefinition:
  initialStateName: Normal
  states:
    - stateName: Normal
"#;
    let value: serde_json::Value = serde_yaml::from_str(yaml).unwrap();
    let doc = DetectorModelDocument::from_value(value).unwrap();
    assert_eq!(doc.detector_model_name.as_deref(), Some("MotorDetectorModel"));
    assert_eq!(doc.key.as_deref(), Some("motorid"));
    assert_eq!(doc.evaluation_method, EvaluationMethod::Batch);
    let input = doc.input.unwrap();
    assert_eq!(input.input_name, "PressureInput");
    assert_eq!(input.paths(), vec!["sensorData.pressure", "motorid"]);
}

#[test]
fn yaml_scalars_are_accepted_as_expressions() {
    let yaml = r#"
eventName: init
condition: true
actions:
  - setVariable:
      variableName: counter
      value: 0
  - setVariable:
      variableName: ratio
      value: 0.5
"#;
    let value: serde_json::Value = serde_yaml::from_str(yaml).unwrap();
    let event: EventDefinition = serde_json::from_value(value).unwrap();
    assert_eq!(event.condition, "true");
    let values: Vec<&str> = event
        .actions
        .iter()
        .filter_map(|a| match a {
            ActionDefinition::SetVariable(s) => Some(s.value.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(values, vec!["0", "0.5"]);
}

#[test]
fn missing_condition_defaults_to_true() {
    let event: EventDefinition = serde_json::from_str(r#"{ "eventName": "always" }"#).unwrap();
    assert_eq!(event.condition, "true");
    assert!(event.actions.is_empty());
}

#[test]
fn notify_alias_and_payload() {
    let json = r#"{
        "notify": {
            "target": "pressure-alerts",
            "payload": { "contentExpression": "{\"key\": \"{{ key }}\"}", "type": "JSON" }
        }
    }"#;
    let action: ActionDefinition = serde_json::from_str(json).unwrap();
    let ActionDefinition::Notify(notify) = action else {
        panic!("expected notify action");
    };
    assert_eq!(notify.target_arn, "pressure-alerts");
    let payload = notify.payload.unwrap();
    assert_eq!(payload.format, PayloadFormat::Json);
}

#[test]
fn unknown_action_kind_is_rejected() {
    let json = r#"{ "lambda": { "functionArn": "x" } }"#;
    assert!(serde_json::from_str::<ActionDefinition>(json).is_err());
}

#[test]
fn transition_requires_next_state() {
    let json = r#"{ "eventName": "t", "condition": "true" }"#;
    assert!(serde_json::from_str::<TransitionEventDefinition>(json).is_err());
}
