use serde::Serialize;
use serde_json::Number;

const LOCAL_SCOPE: &str = "local";

/// A vRO workflow input parameter.
///
/// `type_name` is always derived from `value`, so the declared type and the
/// wrapper key can't disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub scope: &'static str,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: ParameterValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterValue {
    Number { value: Number },
    String { value: String },
    Boolean { value: bool },
    Date { value: String },
    Properties { property: Vec<Property> },
    SdkObject {
        #[serde(rename = "type")]
        type_name: String,
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub key: String,
    pub value: ParameterValue,
}

/// Body of `POST /vco/api/workflows/{id}/executions`.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ExecutionRequest {
    pub parameters: Vec<Parameter>,
}

impl ParameterValue {
    pub fn text(value: impl Into<String>) -> Self {
        ParameterValue::String {
            value: value.into(),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            ParameterValue::Number { .. } => "number".to_string(),
            ParameterValue::String { .. } => "string".to_string(),
            ParameterValue::Boolean { .. } => "boolean".to_string(),
            ParameterValue::Date { .. } => "Date".to_string(),
            ParameterValue::Properties { .. } => "Properties".to_string(),
            ParameterValue::SdkObject { type_name, .. } => type_name.clone(),
        }
    }
}

impl Parameter {
    /// Builds a local parameter; vCenter's PascalCase field name becomes the
    /// camelCase input name vRO workflows expect.
    pub fn new(field: &str, value: ParameterValue) -> Self {
        Parameter {
            name: input_name(field),
            scope: LOCAL_SCOPE,
            type_name: value.type_name(),
            value,
        }
    }
}

/// Lower-cases the first character only.
pub fn input_name(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use crate::parameter::{input_name, ExecutionRequest, Parameter, ParameterValue, Property};
    use serde_json::json;

    #[test]
    fn test_input_name() {
        assert_eq!(input_name("UserName"), "userName");
        assert_eq!(input_name("Vm"), "vm");
        assert_eq!(input_name("rawEventData"), "rawEventData");
        assert_eq!(input_name("FullFormattedMessage"), "fullFormattedMessage");
        assert_eq!(input_name("X"), "x");
        assert_eq!(input_name(""), "");
    }

    #[test]
    fn test_number_parameter_wire_shape() {
        let parameter = Parameter::new(
            "Key",
            ParameterValue::Number {
                value: 130278.into(),
            },
        );
        assert_eq!(
            serde_json::to_value(&parameter).unwrap(),
            json!({
                "name": "key",
                "scope": "local",
                "type": "number",
                "value": {"number": {"value": 130278}}
            })
        );
    }

    #[test]
    fn test_sdk_object_parameter_wire_shape() {
        let parameter = Parameter::new(
            "Vm",
            ParameterValue::SdkObject {
                type_name: "VC:VirtualMachine".to_string(),
                id: "vcsa01.lab,id:vm-33".to_string(),
            },
        );
        assert_eq!(
            serde_json::to_value(&parameter).unwrap(),
            json!({
                "name": "vm",
                "scope": "local",
                "type": "VC:VirtualMachine",
                "value": {"sdk-object": {"type": "VC:VirtualMachine", "id": "vcsa01.lab,id:vm-33"}}
            })
        );
    }

    #[test]
    fn test_properties_parameter_wire_shape() {
        let request = ExecutionRequest {
            parameters: vec![Parameter::new(
                "Arguments",
                ParameterValue::Properties {
                    property: vec![Property {
                        key: "oldStatus".to_string(),
                        value: ParameterValue::text("yellow"),
                    }],
                },
            )],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"parameters": [{
                "name": "arguments",
                "scope": "local",
                "type": "Properties",
                "value": {"properties": {"property": [
                    {"key": "oldStatus", "value": {"string": {"value": "yellow"}}}
                ]}}
            }]})
        );
    }
}
