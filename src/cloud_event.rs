use serde_json::{Map, Value};

use crate::error::BridgeError;
use crate::event_value::kind_of;
use crate::json_text;

/// A CloudEvent as delivered by the event router.
///
/// The envelope is kept as raw JSON: it is forwarded whole as `rawEventData`,
/// and only `source` and `data` carry meaning here.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudEvent {
    raw: Value,
    data: Map<String, Value>,
}

impl CloudEvent {
    pub fn parse(body: &str) -> Result<Self, BridgeError> {
        let raw: Value = serde_json::from_str(body)?;
        let data = match raw.get("data") {
            Some(Value::Object(data)) => data.clone(),
            Some(other) => return Err(BridgeError::DataNotMapping(kind_of(other))),
            None => return Err(BridgeError::MissingKey("data")),
        };
        Ok(CloudEvent { raw, data })
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn subject(&self) -> Option<&str> {
        self.raw.get("subject").and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.raw.get("id").and_then(Value::as_str)
    }

    /// Host part of `source`, e.g. `vcsa01.lab.local` for `https://vcsa01.lab.local/sdk`.
    pub fn source_host(&self) -> Result<String, BridgeError> {
        let source = self
            .raw
            .get("source")
            .ok_or(BridgeError::MissingKey("source"))?;
        let invalid = || BridgeError::InvalidSource(source.to_string());
        let url = source
            .as_str()
            .and_then(|source| reqwest::Url::parse(source).ok())
            .ok_or_else(invalid)?;
        url.host_str().map(str::to_string).ok_or_else(invalid)
    }

    pub fn to_json_string(&self) -> String {
        json_text::to_string(&self.raw)
    }
}
