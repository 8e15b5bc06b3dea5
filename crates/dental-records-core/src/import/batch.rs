//! Recognising the shape of an import document.

use serde_json::Value;

/// Patient data found in a parsed import document.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBatch {
    /// `{"patients": [...]}`, a full-collection export
    Many(Vec<Value>),
    /// `{"patient": {...}}` or a bare record with `id` and `name`
    Single(Value),
    /// Nothing that looks like patient data
    Invalid,
}

impl RecordBatch {
    /// Classify a parsed document.
    ///
    /// Precedence: a `patients` array, then a `patient` field, then the
    /// document itself if it carries truthy `id` and `name`.
    pub fn classify(document: Value) -> Self {
        let Value::Object(mut fields) = document else {
            return RecordBatch::Invalid;
        };

        if matches!(fields.get("patients"), Some(Value::Array(_))) {
            if let Some(Value::Array(patients)) = fields.remove("patients") {
                return RecordBatch::Many(patients);
            }
        }

        if fields.get("patient").map_or(false, is_truthy) {
            if let Some(patient) = fields.remove("patient") {
                return RecordBatch::Single(patient);
            }
        }

        let document = Value::Object(fields);
        if has_identity(&document) {
            RecordBatch::Single(document)
        } else {
            RecordBatch::Invalid
        }
    }

    /// Candidate records, in document order.
    pub fn into_candidates(self) -> Vec<Value> {
        match self {
            RecordBatch::Many(records) => records,
            RecordBatch::Single(record) => vec![record],
            RecordBatch::Invalid => Vec::new(),
        }
    }
}

/// Whether a candidate has truthy `id` and `name` fields.
pub fn has_identity(candidate: &Value) -> bool {
    candidate.get("id").map_or(false, is_truthy) && candidate.get("name").map_or(false, is_truthy)
}

/// JavaScript truthiness, which the browser form used for these checks.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |v| v != 0.0 && !v.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
