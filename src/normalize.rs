//! The Score Normalizer (§4.5): the single choke point that coerces whatever
//! an evaluator returned into a [`Score`].

use serde_json::Value;

use crate::model::{EvaluationResultCell, Score, ScoreValue};

/// Raw JSON returned by a user evaluator, before normalization.
///
/// Evaluators are user code observed only through JSON: this mirrors how the
/// engine treats `Output` from jobs (§4.4) - the normalizer never trusts a
/// typed Rust return, only the `serde_json::Value` shape spec.md describes.
pub fn normalize_score(raw: Value) -> Score {
    match raw {
        Value::Bool(b) => Score {
            value: ScoreValue::Bool(b),
            pass: Some(b),
            explanation: None,
        },
        Value::Number(n) => Score::new(ScoreValue::Num(n.as_f64().unwrap_or(f64::NAN))),
        Value::String(s) => Score::new(ScoreValue::Str(s)),
        Value::Null => Score {
            value: ScoreValue::Bool(false),
            pass: Some(false),
            explanation: None,
        },
        Value::Object(ref map) if map.contains_key("value") => normalize_structured(raw),
        other => Score::new(ScoreValue::Raw(other)),
    }
}

fn normalize_structured(raw: Value) -> Score {
    let Value::Object(map) = raw else {
        return Score::new(ScoreValue::Raw(raw));
    };
    let pass = map.get("pass").and_then(Value::as_bool);
    let explanation = map
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::to_string);
    let value = map.get("value").cloned().unwrap_or(Value::Null);

    let (score_value, inherited_pass) = match value {
        Value::Bool(b) => (ScoreValue::Bool(b), pass),
        Value::Number(n) => (ScoreValue::Num(n.as_f64().unwrap_or(f64::NAN)), pass),
        Value::String(s) => (ScoreValue::Str(s), pass),
        Value::Object(ref obj) => match parse_cell(obj) {
            Some(cell) => (ScoreValue::Cell(cell), pass),
            None => (ScoreValue::Raw(Value::Object(obj.clone())), pass),
        },
        Value::Null => (ScoreValue::Bool(false), pass),
        other => (ScoreValue::Raw(other), pass),
    };

    Score {
        value: score_value,
        pass: inherited_pass,
        explanation,
    }
}

fn parse_cell(obj: &serde_json::Map<String, Value>) -> Option<EvaluationResultCell> {
    let kind = obj.get("type")?.as_str()?.to_string();
    let value_obj = obj.get("value")?.as_object()?;
    let mut value = std::collections::HashMap::with_capacity(value_obj.len());
    for (k, v) in value_obj {
        value.insert(k.clone(), v.as_f64()?);
    }
    Some(EvaluationResultCell { kind, value })
}

/// Normalization applied when a job or evaluator fails (§4.4.c.i, §4.5 "thrown error" row).
pub fn failed_score(explanation: &str) -> Score {
    Score {
        value: ScoreValue::Num(0.0),
        pass: Some(false),
        explanation: Some(explanation.to_string()),
    }
}

#[cfg(test)]
#[cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bool_primitive_sets_pass_from_truthiness() {
        let score = normalize_score(json!(true));
        assert_eq!(score.value, ScoreValue::Bool(true));
        assert_eq!(score.pass, Some(true));

        let score = normalize_score(json!(false));
        assert_eq!(score.pass, Some(false));
    }

    #[test]
    fn number_primitive_leaves_pass_unset() {
        let score = normalize_score(json!(0.8));
        assert_eq!(score.value, ScoreValue::Num(0.8));
        assert_eq!(score.pass, None);
    }

    #[test]
    fn string_primitive_leaves_pass_unset() {
        let score = normalize_score(json!("good"));
        assert_eq!(score.value, ScoreValue::Str("good".to_string()));
        assert_eq!(score.pass, None);
    }

    #[test]
    fn null_becomes_false_value_and_pass() {
        let score = normalize_score(Value::Null);
        assert_eq!(score.value, ScoreValue::Bool(false));
        assert_eq!(score.pass, Some(false));
    }

    #[test]
    fn structured_object_inherits_explicit_pass_and_explanation() {
        let score = normalize_score(json!({
            "value": 0.5,
            "pass": true,
            "explanation": "close enough"
        }));
        assert_eq!(score.value, ScoreValue::Num(0.5));
        assert_eq!(score.pass, Some(true));
        assert_eq!(score.explanation, Some("close enough".to_string()));
    }

    #[test]
    fn structured_object_with_bool_value_and_no_explicit_pass_leaves_pass_unset() {
        let score = normalize_score(json!({ "value": false }));
        assert_eq!(score.value, ScoreValue::Bool(false));
        assert_eq!(score.pass, None);
    }

    #[test]
    fn structured_object_with_cell_value_preserves_cell_verbatim() {
        let score = normalize_score(json!({
            "value": { "type": "similarity", "value": { "cosine": 0.92 } },
            "pass": true
        }));
        match score.value {
            ScoreValue::Cell(cell) => {
                assert_eq!(cell.kind, "similarity");
                assert_eq!(cell.value.get("cosine"), Some(&0.92));
            }
            other => panic!("expected Cell, got {other:?}"),
        }
        assert_eq!(score.pass, Some(true));
    }

    #[test]
    fn structured_object_with_arbitrary_object_value_preserves_as_raw() {
        let score = normalize_score(json!({
            "value": { "foo": "bar", "nested": { "a": 1 } }
        }));
        match score.value {
            ScoreValue::Raw(v) => assert_eq!(v, json!({"foo": "bar", "nested": {"a": 1}})),
            other => panic!("expected Raw, got {other:?}"),
        }
    }

    #[test]
    fn object_without_value_key_is_preserved_as_raw() {
        let score = normalize_score(json!({ "foo": "bar" }));
        assert_eq!(score.value, ScoreValue::Raw(json!({ "foo": "bar" })));
    }

    #[test]
    fn failed_score_is_zero_and_not_passing() {
        let score = failed_score("job failed");
        assert_eq!(score.value, ScoreValue::Num(0.0));
        assert_eq!(score.pass, Some(false));
        assert_eq!(score.explanation, Some("job failed".to_string()));
    }
}
