use std::error::Error;

use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum BridgeError {
    InvalidJson(serde_json::Error),
    MissingKey(&'static str),
    DataNotMapping(&'static str),
    InvalidSource(String),
    ConfigRead(&'static str, std::io::Error),
    ConfigKey(toml::de::Error),
    MissingWorkflowId,
    InvalidFilter(regex::Error),
    Transport(reqwest::Error),
}

impl BridgeError {
    /// HTTP status reported to the caller for this failure.
    pub fn status(&self) -> u16 {
        match *self {
            BridgeError::InvalidJson(_)
            | BridgeError::MissingKey(_)
            | BridgeError::DataNotMapping(_)
            | BridgeError::InvalidSource(_) => 400,
            BridgeError::ConfigRead(..)
            | BridgeError::ConfigKey(_)
            | BridgeError::MissingWorkflowId
            | BridgeError::InvalidFilter(_)
            | BridgeError::Transport(_) => 500,
        }
    }
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            BridgeError::InvalidJson(ref error) => write!(f, "Invalid JSON > {}", error),
            BridgeError::MissingKey(key) => {
                write!(f, "Invalid JSON, required key not found > '{}'", key)
            }
            BridgeError::DataNotMapping(kind) => {
                write!(f, "Invalid JSON, data not iterable > data is {}", kind)
            }
            BridgeError::InvalidSource(ref source) => {
                write!(f, "Invalid JSON, source is not a URL with a host > '{}'", source)
            }
            BridgeError::ConfigRead(what, ref error) => {
                write!(f, "Could not read {} configuration: {}", what, error)
            }
            BridgeError::ConfigKey(ref error) => {
                write!(f, "Mandatory configuration key not found: {}", error.message())
            }
            BridgeError::MissingWorkflowId => {
                write!(f, "Mandatory configuration key not found: vro_workflow_id")
            }
            BridgeError::InvalidFilter(ref error) => write!(f, "Invalid filter > {}", error),
            BridgeError::Transport(ref error) => {
                write!(f, "Unexpected error occurred > {}", error)
            }
        }
    }
}

impl Error for BridgeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            BridgeError::InvalidJson(ref error) => Some(error),
            BridgeError::ConfigRead(_, ref error) => Some(error),
            BridgeError::ConfigKey(ref error) => Some(error),
            BridgeError::InvalidFilter(ref error) => Some(error),
            BridgeError::Transport(ref error) => Some(error),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> BridgeError {
        BridgeError::InvalidJson(e)
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(e: toml::de::Error) -> BridgeError {
        BridgeError::ConfigKey(e)
    }
}

impl From<regex::Error> for BridgeError {
    fn from(e: regex::Error) -> BridgeError {
        BridgeError::InvalidFilter(e)
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> BridgeError {
        BridgeError::Transport(e)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::BridgeError;

    #[test]
    fn test_client_errors_are_bad_requests() {
        let error = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        assert_eq!(BridgeError::from(error).status(), 400);
        assert_eq!(BridgeError::MissingKey("data").status(), 400);
        assert_eq!(BridgeError::DataNotMapping("a string").status(), 400);
    }

    #[test]
    fn test_configuration_errors_are_server_errors() {
        let error = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
        let error = BridgeError::ConfigRead("vro", error);
        assert_eq!(error.status(), 500);
        assert_eq!(
            error.to_string(),
            "Could not read vro configuration: No such file or directory"
        );
        assert_eq!(BridgeError::MissingWorkflowId.status(), 500);
    }

    #[test]
    fn test_missing_key_message_names_the_key() {
        assert_eq!(
            BridgeError::MissingKey("source").to_string(),
            "Invalid JSON, required key not found > 'source'"
        );
    }
}
