//! Event data to vRO input parameter conversion.

use std::fmt;
use std::fmt::{Display, Formatter};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Settings;
use crate::error::BridgeError;
use crate::event_value::EventValue;
use crate::json_text;
use crate::parameter::{Parameter, ParameterValue, Property};

/// A managed object reference found in event data, e.g.
/// `{"Name": "Test VM", "Vm": {"Type": "VirtualMachine", "Value": "vm-33"}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectReference {
    pub type_name: String,
    pub id: String,
    pub name: Option<String>,
}

/// Resolves a managed object to its inventory path (`/Datacenter/vm/Folder/Name`).
pub trait InventoryPathResolver: Send + Sync {
    fn object_path(&self, reference: &ObjectReference) -> Option<String>;
}

/// Builds the path from the `Name` the event router sends next to the reference.
/// Works without a vCenter session, so only the leaf name is known: `Test VM`
/// becomes `/Test VM`, and a folder pattern such as `^/Lab/vm/` never matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventNameResolver;

impl InventoryPathResolver for EventNameResolver {
    fn object_path(&self, reference: &ObjectReference) -> Option<String> {
        reference.name.as_ref().map(|name| format!("/{}", name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterMismatch {
    pub filter: String,
    pub type_name: String,
    pub path: String,
}

impl Display for FilterMismatch {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Filter \"{}\" does not match {} path \"{}\"",
            self.filter, self.type_name, self.path
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    Parameter(Parameter),
    /// Null values produce no parameter at all.
    Omitted,
    FilteredOut(FilterMismatch),
}

enum Converted {
    Value(ParameterValue),
    Null,
    Filtered(FilterMismatch),
}

pub struct Transformer<'a> {
    vcenter_host: &'a str,
    settings: &'a Settings,
    resolver: &'a dyn InventoryPathResolver,
}

impl<'a> Transformer<'a> {
    pub fn new(
        vcenter_host: &'a str,
        settings: &'a Settings,
        resolver: &'a dyn InventoryPathResolver,
    ) -> Self {
        Transformer {
            vcenter_host,
            settings,
            resolver,
        }
    }

    pub fn transform(&self, field: &str, value: Value) -> Result<Transformed, BridgeError> {
        Ok(match self.convert(field, value)? {
            Converted::Value(value) => Transformed::Parameter(Parameter::new(field, value)),
            Converted::Null => Transformed::Omitted,
            Converted::Filtered(mismatch) => Transformed::FilteredOut(mismatch),
        })
    }

    fn convert(&self, field: &str, value: Value) -> Result<Converted, BridgeError> {
        let value = match EventValue::from(value) {
            EventValue::Integer(value) => ParameterValue::Number { value },
            EventValue::Text(value) => ParameterValue::String { value },
            EventValue::Timestamp(value) => ParameterValue::Date { value },
            EventValue::Boolean(value) => ParameterValue::Boolean { value },
            EventValue::Null => return Ok(Converted::Null),
            EventValue::Mapping(map) => match find_reference(&map) {
                Some(reference) => return self.managed_object(field, reference),
                None => ParameterValue::text(json_text::to_string(&Value::Object(map))),
            },
            EventValue::Sequence(items) => return self.properties(items),
            EventValue::Other(text) => {
                debug!(field, "unhandled data type, forcing to string");
                ParameterValue::text(text)
            }
        };
        Ok(Converted::Value(value))
    }

    fn managed_object(
        &self,
        field: &str,
        reference: ObjectReference,
    ) -> Result<Converted, BridgeError> {
        if let Some(pattern) = self.settings.filter_for(field) {
            let filter = Regex::new(pattern)?;
            let path = self.resolver.object_path(&reference).unwrap_or_default();
            debug!(field, filter = pattern, %path, "testing object path");
            if !filter.is_match(&path) {
                return Ok(Converted::Filtered(FilterMismatch {
                    filter: pattern.to_string(),
                    type_name: reference.type_name,
                    path,
                }));
            }
        }
        let type_name = format!("VC:{}", reference.type_name);
        Ok(Converted::Value(ParameterValue::SdkObject {
            type_name,
            id: format!("{},id:{}", self.vcenter_host, reference.id),
        }))
    }

    fn properties(&self, items: Vec<Value>) -> Result<Converted, BridgeError> {
        let mut property = Vec::new();
        for item in items {
            let (key, value) = match (item.get("Key"), item.get("Value")) {
                (Some(Value::String(key)), Some(value)) => (key.clone(), value.clone()),
                _ => {
                    debug!(%item, "skipping malformed property");
                    continue;
                }
            };
            match self.convert(&key, value)? {
                Converted::Value(value) => property.push(Property { key, value }),
                Converted::Null => debug!(%key, "skipping null property"),
                Converted::Filtered(mismatch) => return Ok(Converted::Filtered(mismatch)),
            }
        }
        Ok(Converted::Value(ParameterValue::Properties { property }))
    }
}

/// The last nested mapping carrying both `Type` and `Value` wins.
///
/// A nested `Type` alone does not make a reference: without `Value` there is
/// no object id to build, so such a mapping stays JSON text instead of
/// failing the whole invocation.
fn find_reference(map: &Map<String, Value>) -> Option<ObjectReference> {
    let reference = map
        .values()
        .filter_map(Value::as_object)
        .filter(|nested| nested.contains_key("Type") && nested.contains_key("Value"))
        .last()?;
    Some(ObjectReference {
        type_name: plain_text(&reference["Type"]),
        id: plain_text(&reference["Value"]),
        name: map.get("Name").and_then(Value::as_str).map(str::to_string),
    })
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
