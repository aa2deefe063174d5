//! Conversion of prediction answers into dense score matrices.

use ndarray::Array2;
use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScoreError {
    #[error("Prediction answer has no body.predictions array")]
    MissingPredictions,
    #[error("Prediction {index} is malformed: {reason}")]
    InvalidEntry { index: usize, reason: String },
    #[error("Class {cat} is outside the {nclasses} expected classes")]
    ClassOutOfRange { cat: String, nclasses: usize },
}

/// Build a `[n_examples, nclasses]` matrix of class probabilities.
///
/// Rows follow the numeric `uri` of each prediction when every `uri` is an
/// integer, and the answer order otherwise. Classes absent from an answer
/// score `0.0`.
pub fn to_array(response: &Value, nclasses: usize) -> Result<Array2<f64>, ScoreError> {
    let predictions = response
        .get("body")
        .and_then(|body| body.get("predictions"))
        .and_then(Value::as_array)
        .ok_or(ScoreError::MissingPredictions)?;

    let mut ordered: Vec<(Option<i64>, &Value)> = predictions
        .iter()
        .map(|prediction| (prediction.get("uri").and_then(numeric_uri), prediction))
        .collect();
    if ordered.iter().all(|(uri, _)| uri.is_some()) {
        ordered.sort_by_key(|(uri, _)| *uri);
    }

    let mut scores = Array2::zeros((ordered.len(), nclasses));
    for (row, (_, prediction)) in ordered.into_iter().enumerate() {
        let classes: Vec<&Value> = match prediction.get("classes") {
            Some(Value::Array(classes)) => classes.iter().collect(),
            Some(class @ Value::Object(_)) => vec![class],
            _ => {
                return Err(ScoreError::InvalidEntry {
                    index: row,
                    reason: "missing classes".to_string(),
                });
            }
        };
        for class in classes {
            let cat = match class.get("cat") {
                Some(Value::String(cat)) => cat.clone(),
                Some(Value::Number(cat)) => cat.to_string(),
                _ => {
                    return Err(ScoreError::InvalidEntry {
                        index: row,
                        reason: "class without cat".to_string(),
                    });
                }
            };
            let prob = class.get("prob").and_then(Value::as_f64).ok_or_else(|| {
                ScoreError::InvalidEntry {
                    index: row,
                    reason: format!("class {cat} without prob"),
                }
            })?;
            let column = class_index(&cat).ok_or_else(|| ScoreError::InvalidEntry {
                index: row,
                reason: format!("non-numeric class {cat}"),
            })?;
            if column >= nclasses {
                return Err(ScoreError::ClassOutOfRange { cat, nclasses });
            }
            scores[[row, column]] = prob;
        }
    }
    Ok(scores)
}

/// Per-row arg-max as an `[n, 1]` column; ties go to the lowest index.
pub fn argmax_column(scores: &Array2<f64>) -> Array2<usize> {
    Array2::from_shape_fn((scores.nrows(), 1), |(row, _)| {
        let mut best = 0usize;
        let mut best_val = f64::NEG_INFINITY;
        for (idx, &value) in scores.row(row).iter().enumerate() {
            if value > best_val {
                best_val = value;
                best = idx;
            }
        }
        best
    })
}

fn numeric_uri(uri: &Value) -> Option<i64> {
    match uri {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn class_index(cat: &str) -> Option<usize> {
    let trimmed = cat.trim();
    if let Ok(idx) = trimmed.parse::<usize>() {
        return Some(idx);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        if value >= 0.0 && value.fract() == 0.0 {
            return Some(value as usize);
        }
        return None;
    }
    let digits = trimmed.trim_start_matches(|ch: char| !ch.is_ascii_digit());
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
