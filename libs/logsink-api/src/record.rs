use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field that names the owner of a record.
pub const USER_ID_FIELD: &str = "user_id";

/// One log entry: an arbitrary JSON object.
///
/// The only structural rule is "is a JSON object"; field names and values
/// are never interpreted, except `user_id` when owner validation is on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogRecord(Map<String, Value>);

/// Records submitted in one request, in wire order.
pub type Batch = Vec<LogRecord>;

impl LogRecord {
    /// Wrap a parsed value. Returns the value back when it is not an object.
    pub fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }

    /// Declared owner. `None` when the field is absent, empty or not a string.
    pub fn user_id(&self) -> Option<&str> {
        match self.0.get(USER_ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// `true` when `field` holds exactly the string `value`.
    pub fn field_equals(&self, field: &str, value: &str) -> bool {
        matches!(self.0.get(field), Some(Value::String(s)) if s == value)
    }
}

impl From<LogRecord> for Value {
    fn from(record: LogRecord) -> Self {
        Value::Object(record.0)
    }
}
