use serde_json::{Map, Number, Value};

use crate::timestamp;

/// An event data value, classified once when it leaves the JSON tree.
///
/// Booleans and integers are distinct variants, so a `bool` can never be
/// taken for a number. Strings that parse as ISO-8601 become `Timestamp`
/// and keep their original text.
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Integer(Number),
    Text(String),
    Timestamp(String),
    Boolean(bool),
    Null,
    Mapping(Map<String, Value>),
    Sequence(Vec<Value>),
    /// Anything without a dedicated vRO type, already rendered as text.
    Other(String),
}

impl From<Value> for EventValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(number) if number.is_i64() || number.is_u64() => {
                EventValue::Integer(number)
            }
            Value::Number(number) => EventValue::Other(number.to_string()),
            Value::String(text) if timestamp::is_iso8601(&text) => EventValue::Timestamp(text),
            Value::String(text) => EventValue::Text(text),
            Value::Bool(flag) => EventValue::Boolean(flag),
            Value::Null => EventValue::Null,
            Value::Object(map) => EventValue::Mapping(map),
            Value::Array(items) => EventValue::Sequence(items),
        }
    }
}

/// Short description of a JSON value's kind, used in error messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
