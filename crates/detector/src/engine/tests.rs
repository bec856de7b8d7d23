//! Tests for the detector engine.

use std::sync::Arc;

use serde_json::json;
use tripwire_core::AttributeSet;

use super::*;
use crate::loader::{parse_model, ModelFormat};

const MOTOR_MODEL: &str = include_str!("../../../../data/models/motor-pressure.yml");
const COUNTER: &str = "pressureThresholdBreached";

fn motor_engine(method: &str) -> DetectorEngine {
    let yaml = MOTOR_MODEL.replace("evaluationMethod: BATCH", &format!("evaluationMethod: {method}"));
    let model = parse_model(&yaml, ModelFormat::Yaml, "motor").unwrap();
    DetectorEngine::new(Arc::new(model))
}

fn engine(yaml: &str) -> DetectorEngine {
    DetectorEngine::new(Arc::new(parse_model(yaml, ModelFormat::Yaml, "test").unwrap()))
}

fn pressure(p: f64) -> AttributeSet {
    AttributeSet::new()
        .with("sensorData.pressure", p)
        .with("motorid", "Fulton-A32")
}

fn counter(engine: &DetectorEngine, key: &str) -> f64 {
    engine.instance(key).unwrap().variables[COUNTER]
}

fn notify_count(eval: &Evaluation) -> usize {
    eval.alerts().count()
}

// ── Source model behavior ───────────────────────────────────────────

#[test]
fn hysteresis_batch() {
    let engine = motor_engine("BATCH");

    let first = engine.process("m1", &pressure(71.0));
    assert!(first.created);
    assert_eq!(first.previous_state, "Normal");
    assert_eq!(first.state, "Dangerous");
    assert_eq!(counter(&engine, "m1"), 3.0);
    assert_eq!(notify_count(&first), 1);

    let second = engine.process("m1", &pressure(71.0));
    assert_eq!(second.state, "Dangerous");
    assert_eq!(counter(&engine, "m1"), 6.0);
    assert_eq!(notify_count(&second), 0);

    // Counter drains one per reading; the transition guard sees the counter
    // from before the group's own write, so it takes one reading past zero.
    for expected in [5.0, 4.0, 3.0, 2.0, 1.0, 0.0] {
        let eval = engine.process("m1", &pressure(60.0));
        assert_eq!(eval.state, "Dangerous");
        assert_eq!(counter(&engine, "m1"), expected);
    }

    let back = engine.process("m1", &pressure(60.0));
    assert_eq!(back.previous_state, "Dangerous");
    assert_eq!(back.state, "Normal");
    assert_eq!(notify_count(&back), 1);
    assert_eq!(counter(&engine, "m1"), 0.0);
}

#[test]
fn hysteresis_serial() {
    let engine = motor_engine("SERIAL");

    engine.process("m1", &pressure(71.0));
    engine.process("m1", &pressure(71.0));
    assert_eq!(counter(&engine, "m1"), 6.0);

    for expected in [5.0, 4.0, 3.0, 2.0, 1.0] {
        let eval = engine.process("m1", &pressure(60.0));
        assert_eq!(eval.state, "Dangerous");
        assert_eq!(counter(&engine, "m1"), expected);
    }

    // The decrement to 0 is visible to the transition guard in the same reading.
    let back = engine.process("m1", &pressure(60.0));
    assert_eq!(back.state, "Normal");
    assert_eq!(counter(&engine, "m1"), 0.0);
}

#[test]
fn actions_are_reported_in_execution_order() {
    let engine = motor_engine("BATCH");
    let eval = engine.process("m1", &pressure(71.0));

    let trace: Vec<(RuleGroup, &str, &str)> = eval
        .actions
        .iter()
        .map(|a| (a.group, a.state.as_str(), a.event_name.as_str()))
        .collect();
    assert_eq!(
        trace,
        vec![
            (RuleGroup::OnEnter, "Normal", "init"),
            (RuleGroup::OnInput, "Normal", "Overpressurized"),
            (RuleGroup::OnEnter, "Dangerous", "Pressure Threshold Breached"),
        ]
    );
    assert_eq!(
        eval.actions[1].action,
        ResolvedAction::SetVariable {
            name: COUNTER.to_string(),
            value: 3.0
        }
    );

    let alert = eval.alerts().next().unwrap();
    assert_eq!(alert.detector_model, "MotorDetectorModel");
    assert_eq!(alert.key, "m1");
    assert_eq!(alert.target, "pressure-alerts");
    assert_eq!(alert.variables[COUNTER], 3.0);
    assert_eq!(
        alert.message.as_deref(),
        Some("Motor m1 is over pressure (breach counter 3.0)")
    );
}

#[test]
fn exit_notification_has_no_payload() {
    let engine = motor_engine("SERIAL");
    engine.process("m1", &pressure(71.0));
    // 3 -> 2 -> 1 -> 0, and the last decrement lets the transition through.
    assert_eq!(engine.process("m1", &pressure(10.0)).state, "Dangerous");
    assert_eq!(engine.process("m1", &pressure(10.0)).state, "Dangerous");
    let back = engine.process("m1", &pressure(10.0));
    assert_eq!(back.state, "Normal");

    let alert = back.alerts().next().unwrap();
    assert_eq!(alert.event_name, "Normal Pressure Restored");
    assert_eq!(alert.state, "Dangerous");
    assert!(alert.message.is_none());
}

// ── Engine properties ───────────────────────────────────────────────

#[test]
fn enter_rules_run_once_on_creation() {
    let engine = motor_engine("BATCH");

    let first = engine.process("m1", &pressure(50.0));
    assert!(first.created);
    assert_eq!(first.actions.len(), 1);
    assert_eq!(first.actions[0].event_name, "init");
    assert_eq!(first.state, "Normal");

    let second = engine.process("m1", &pressure(50.0));
    assert!(!second.created);
    assert!(second.actions.is_empty());
}

#[test]
fn keys_are_isolated() {
    let engine = motor_engine("BATCH");
    engine.process("hot", &pressure(90.0));
    engine.process("cold", &pressure(20.0));
    engine.process("hot", &pressure(90.0));

    assert_eq!(engine.instance("hot").unwrap().state, "Dangerous");
    assert_eq!(counter(&engine, "hot"), 6.0);
    assert_eq!(engine.instance("cold").unwrap().state, "Normal");
    assert_eq!(counter(&engine, "cold"), 0.0);
}

#[test]
fn processing_is_deterministic() {
    let readings = [71.0, 80.0, 60.0, 55.0, 90.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0];
    let run = || {
        let engine = motor_engine("BATCH");
        readings
            .iter()
            .map(|p| engine.process("m1", &pressure(*p)))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn missing_attribute_never_fires_guards() {
    let engine = motor_engine("BATCH");
    engine.process("m1", &pressure(71.0));

    let no_pressure = AttributeSet::new().with("motorid", "m1");
    let eval = engine.process("m1", &no_pressure);
    assert_eq!(eval.state, "Dangerous");
    assert!(eval.actions.is_empty());
    assert_eq!(counter(&engine, "m1"), 3.0);

    let fresh = engine.process("m2", &AttributeSet::new());
    assert_eq!(fresh.state, "Normal");
    assert_eq!(fresh.actions.len(), 1, "only the initial onEnter runs");
}

#[test]
fn undeclared_attributes_are_dropped() {
    let engine = engine(
        r#"
input:
  inputName: In
  attributes:
    - jsonPath: level
detectorModelDefinition:
  initialStateName: S
  states:
    - stateName: S
      onInput:
        events:
          - eventName: report
            actions:
              - notify:
                  target: t
                  payload:
                    contentExpression: "{% if input['secret'] is defined %}leak{% else %}clean{% endif %} {{ input['level'] }}"
                    type: STRING
"#,
    );
    let attrs = AttributeSet::new().with("level", 2.5).with("secret", "hunter2");
    let eval = engine.process("k", &attrs);
    let alert = eval.alerts().next().unwrap();
    assert_eq!(alert.message.as_deref(), Some("clean 2.5"));
}

#[test]
fn unavailable_value_leaves_variable_unchanged() {
    let engine = engine(
        r#"
initialStateName: S
states:
  - stateName: S
    onEnter:
      events:
        - eventName: init
          actions:
            - setVariable: { variableName: level, value: "7" }
    onInput:
      events:
        - eventName: track
          actions:
            - setVariable: { variableName: level, value: "$input.In.level * 2" }
"#,
    );
    let eval = engine.process("k", &AttributeSet::new());
    assert_eq!(eval.actions.len(), 1);
    assert_eq!(engine.instance("k").unwrap().variables["level"], 7.0);

    engine.process("k", &AttributeSet::new().with("level", 4.0));
    assert_eq!(engine.instance("k").unwrap().variables["level"], 8.0);
}

#[test]
fn missing_attribute_blocks_an_or_guard() {
    let engine = engine(
        r#"
initialStateName: A
states:
  - stateName: A
    onInput:
      transitionEvents:
        - eventName: either
          condition: $input.In.p > 70 || $variable.x >= 0
          nextState: B
  - stateName: B
"#,
    );
    let eval = engine.process("k", &AttributeSet::new().with("other", 1.0));
    assert_eq!(eval.state, "A");

    let eval = engine.process("k", &AttributeSet::new().with("p", 1.0));
    assert_eq!(eval.state, "B");
}

#[test]
fn first_matching_transition_wins() {
    let engine = engine(
        r#"
initialStateName: Start
states:
  - stateName: Start
    onInput:
      transitionEvents:
        - eventName: to-a
          condition: $input.In.go > 0
          nextState: A
        - eventName: to-b
          condition: $input.In.go > 0
          nextState: B
  - stateName: A
  - stateName: B
"#,
    );
    let eval = engine.process("k", &AttributeSet::new().with("go", 1.0));
    assert_eq!(eval.state, "A");
}

#[test]
fn transition_stops_later_input_rules() {
    let engine = engine(
        r#"
initialStateName: Start
states:
  - stateName: Start
    onInput:
      events:
        - eventName: before
          actions:
            - setVariable: { variableName: seen, value: "$variable.seen + 1" }
      transitionEvents:
        - eventName: go
          nextState: End
        - eventName: never
          actions:
            - setVariable: { variableName: never, value: "1" }
          nextState: Start
  - stateName: End
"#,
    );
    let eval = engine.process("k", &AttributeSet::new());
    assert_eq!(eval.state, "End");
    let vars = engine.instance("k").unwrap().variables;
    assert_eq!(vars.get("seen"), Some(&1.0));
    assert!(!vars.contains_key("never"));
}

const WRITE_THEN_READ: &str = r#"
evaluationMethod: METHOD
detectorModelDefinition:
  initialStateName: S
  states:
    - stateName: S
      onInput:
        events:
          - eventName: bump
            actions:
              - setVariable: { variableName: x, value: "$variable.x + 1" }
          - eventName: copy
            actions:
              - setVariable: { variableName: y, value: "$variable.x" }
"#;

#[test]
fn serial_writes_are_visible_to_later_rules() {
    let engine = engine(&WRITE_THEN_READ.replace("METHOD", "SERIAL"));
    engine.process("k", &AttributeSet::new());
    let vars = engine.instance("k").unwrap().variables;
    assert_eq!((vars["x"], vars["y"]), (1.0, 1.0));
}

#[test]
fn batch_rules_see_the_group_start_snapshot() {
    let engine = engine(&WRITE_THEN_READ.replace("METHOD", "BATCH"));
    engine.process("k", &AttributeSet::new());
    let vars = engine.instance("k").unwrap().variables;
    assert_eq!((vars["x"], vars["y"]), (1.0, 0.0));
}

#[test]
fn no_enter_notification_for_small_counter() {
    let engine = engine(
        r#"
initialStateName: Normal
states:
  - stateName: Normal
    onInput:
      transitionEvents:
        - eventName: breach
          condition: $input.In.p > 70
          actions:
            - setVariable: { variableName: c, value: "$variable.c + 1" }
          nextState: Dangerous
  - stateName: Dangerous
    onEnter:
      events:
        - eventName: alarm
          condition: $variable.c > 1
          actions:
            - sns: { targetArn: t }
"#,
    );
    let eval = engine.process("k", &AttributeSet::new().with("p", 80.0));
    assert_eq!(eval.state, "Dangerous");
    assert_eq!(notify_count(&eval), 0);
}

// ── Introspection and keys ──────────────────────────────────────────

#[test]
fn introspection() {
    let engine = motor_engine("BATCH");
    assert!(engine.is_empty());
    assert!(engine.instance("nobody").is_none());

    engine.process("b", &pressure(10.0));
    engine.process("a", &pressure(90.0));
    assert_eq!(engine.len(), 2);
    assert_eq!(engine.keys(), vec!["a".to_string(), "b".to_string()]);

    let snapshot = engine.instance("a").unwrap();
    assert_eq!(snapshot.key, "a");
    assert_eq!(snapshot.state, "Dangerous");
}

#[test]
fn reading_from_payload_uses_model_key() {
    let engine = motor_engine("BATCH");
    let payload = json!({ "motorid": "Fulton-A32", "sensorData": { "pressure": 23, "temperature": 47 } });
    let reading = engine.reading_from_payload(&payload).unwrap();
    assert_eq!(reading.key, "Fulton-A32");

    let eval = engine.process_reading(&reading);
    assert_eq!(eval.key, "Fulton-A32");
    assert_eq!(eval.state, "Normal");

    let err = engine.reading_from_payload(&json!({ "sensorData": { "pressure": 1 } }));
    assert!(matches!(err, Err(EngineError::Reading(_))));
}

#[test]
fn reading_from_json_accepts_envelopes_and_raw_payloads() {
    let engine = motor_engine("BATCH");

    let reading = engine
        .reading_from_json(&json!({ "key": "m7", "attributes": { "sensorData": { "pressure": 80 } } }))
        .unwrap();
    assert_eq!(reading.key, "m7");
    assert!(reading.attributes.contains("sensorData.pressure"));

    let reading = engine
        .reading_from_json(&json!({ "key": "m8", "payload": { "motorid": "ignored" } }))
        .unwrap();
    assert_eq!(reading.key, "m8");

    // Extra fields mean it is not an envelope; the model key applies.
    let reading = engine
        .reading_from_json(&json!({ "key": "x", "attributes": {}, "motorid": "m9" }))
        .unwrap();
    assert_eq!(reading.key, "m9");

    let err = engine.reading_from_json(&json!({ "key": "", "attributes": {} }));
    assert!(matches!(err, Err(EngineError::Reading(_))));
    assert!(engine.reading_from_json(&json!([1, 2])).is_err());
}

#[test]
fn model_without_key_rejects_raw_payloads() {
    let engine = engine("initialStateName: S\nstates:\n  - stateName: S\n");
    let err = engine.reading_from_payload(&json!({ "id": "x" })).unwrap_err();
    assert!(matches!(err, EngineError::NoKeyAttribute(ref m) if m == "test"));
}

#[test]
fn distinct_keys_process_concurrently() {
    let engine = motor_engine("SERIAL");
    std::thread::scope(|scope| {
        for t in 0..8 {
            let engine = &engine;
            scope.spawn(move || {
                let key = format!("motor-{t}");
                for _ in 0..50 {
                    engine.process(&key, &pressure(90.0));
                }
            });
        }
    });

    assert_eq!(engine.len(), 8);
    for key in engine.keys() {
        // First reading enters Dangerous with 3, each of the other 49 adds 3.
        assert_eq!(counter(&engine, &key), 150.0);
    }
}

#[test]
fn same_key_readings_are_serialized() {
    let engine = motor_engine("SERIAL");
    engine.process("shared", &pressure(90.0));
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let engine = &engine;
            scope.spawn(move || {
                for _ in 0..25 {
                    engine.process("shared", &pressure(90.0));
                }
            });
        }
    });
    assert_eq!(counter(&engine, "shared"), 3.0 + 100.0 * 3.0);
}
