//! Timestamped event records

use thiserror::Error;

use crate::document::{parse_data, to_json_compact, KeyPath, LoadError, Mapping, PathSegment, Value};

/// Errors that can occur when reading a record from JSON
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid record JSON: {0}")]
    Json(#[from] LoadError),

    #[error("record must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("record has no 'timestamp'")]
    MissingTimestamp,

    #[error("'timestamp' must be an integer number of milliseconds, found {found}")]
    InvalidTimestamp { found: String },

    #[error("'source' must be a string, found {found}")]
    InvalidSource { found: &'static str },
}

/// One log or audit event: a timestamp, where it came from, and its fields
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    timestamp: i64,
    source: String,
    fields: Mapping,
}

impl EventRecord {
    pub fn new(timestamp: i64, source: impl Into<String>, fields: Mapping) -> Self {
        Self {
            timestamp,
            source: source.into(),
            fields,
        }
    }

    /// Add a field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key, value);
        self
    }

    /// Milliseconds since the Unix epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fields(&self) -> &Mapping {
        &self.fields
    }

    /// Look up a nested field, e.g. `detail.items[0].id`
    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let PathSegment::Key(key) = first else {
            return None;
        };
        let mut value = self.fields.get(key)?;
        for segment in rest {
            value = match segment {
                PathSegment::Key(k) => value.as_mapping()?.get(k)?,
                PathSegment::Index(i) => value.as_sequence()?.get(*i)?,
            };
        }
        Some(value)
    }

    /// Read a record from one JSON object.
    ///
    /// `timestamp` (integer milliseconds) is required and `source` is optional;
    /// every other key becomes a field.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stackscope::EventRecord;
    ///
    /// let record = EventRecord::from_json(r#"{"timestamp": 1000, "source": "api", "state": "OK"}"#).unwrap();
    /// assert_eq!(record.timestamp(), 1000);
    /// assert_eq!(record.source(), "api");
    /// assert_eq!(record.fields().len(), 1);
    /// ```
    pub fn from_json(line: &str) -> Result<Self, RecordError> {
        let object = match parse_data(line)? {
            Value::Mapping(object) => object,
            other => return Err(RecordError::NotAnObject { found: other.kind() }),
        };

        let mut timestamp = None;
        let mut source = String::new();
        let mut fields = Mapping::new();

        for (key, value) in object {
            match key.as_str() {
                "timestamp" => timestamp = Some(parse_timestamp(&value)?),
                "source" => match value {
                    Value::String(s) => source = s,
                    other => return Err(RecordError::InvalidSource { found: other.kind() }),
                },
                _ => {
                    fields.insert(key, value);
                }
            }
        }

        let timestamp = timestamp.ok_or(RecordError::MissingTimestamp)?;
        Ok(Self::new(timestamp, source, fields))
    }

    /// Single-line JSON with `timestamp` and `source` first
    pub fn to_json(&self) -> String {
        let mut object = Mapping::new().with("timestamp", self.timestamp);
        if !self.source.is_empty() {
            object.insert("source", self.source.as_str());
        }
        for (key, value) in self.fields.iter() {
            object.insert(key.clone(), value.clone());
        }
        to_json_compact(&Value::Mapping(object))
    }
}

fn parse_timestamp(value: &Value) -> Result<i64, RecordError> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Ok(*n as i64),
        other => Err(RecordError::InvalidTimestamp {
            found: other.scalar_text().unwrap_or_else(|| other.kind().to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let record = EventRecord::from_json(
            r#"{"source": "cloudtrail", "timestamp": 1700000000000, "eventName": "PutObject", "detail": {"ok": true}}"#,
        )
        .unwrap();
        assert_eq!(record.timestamp(), 1_700_000_000_000);
        assert_eq!(record.source(), "cloudtrail");
        assert_eq!(record.fields().keys().collect::<Vec<_>>(), vec!["eventName", "detail"]);
        assert_eq!(
            record.get(&KeyPath::root().child("detail").child("ok")),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(EventRecord::from_json("[1]"), Err(RecordError::NotAnObject { .. })));
        assert!(matches!(EventRecord::from_json(r#"{"a": 1}"#), Err(RecordError::MissingTimestamp)));
        assert!(matches!(
            EventRecord::from_json(r#"{"timestamp": "soon"}"#),
            Err(RecordError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            EventRecord::from_json(r#"{"timestamp": 1.5}"#),
            Err(RecordError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            EventRecord::from_json(r#"{"timestamp": 1, "source": 2}"#),
            Err(RecordError::InvalidSource { .. })
        ));
        assert!(matches!(EventRecord::from_json("{"), Err(RecordError::Json(_))));
    }

    #[test]
    fn test_get_paths() {
        let record = EventRecord::new(0, "", Mapping::new())
            .with_field("items", vec![Value::from("a"), Value::from("b")])
            .with_field("state", "OK");
        assert_eq!(
            record.get(&KeyPath::root().child("items").index(1)),
            Some(&Value::from("b"))
        );
        assert_eq!(record.get(&KeyPath::root().child("items").index(2)), None);
        assert_eq!(record.get(&KeyPath::root().child("state").child("x")), None);
        assert_eq!(record.get(&KeyPath::root()), None);
    }

    #[test]
    fn test_to_json() {
        let record = EventRecord::new(5, "api", Mapping::new()).with_field("state", "FAILED");
        assert_eq!(record.to_json(), r#"{"timestamp":5,"source":"api","state":"FAILED"}"#);
        let anonymous = EventRecord::new(5, "", Mapping::new());
        assert_eq!(anonymous.to_json(), r#"{"timestamp":5}"#);
    }
}
