use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::BridgeError;

pub const DEFAULT_VRO_CONFIG: &str = "/var/openfaas/secrets/vroconfig";
const DEFAULT_VRO_PORT: u16 = 443;
const FILTER_PREFIX: &str = "filter_";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VroConfig {
    pub vro: VroServer,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VroServer {
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VcenterConfig {
    pub vcenter: VcenterServer,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VcenterServer {
    pub server: String,
    pub user: String,
    pub pass: String,
}

fn default_port() -> u16 {
    DEFAULT_VRO_PORT
}

fn read(path: &Path, what: &'static str) -> Result<String, BridgeError> {
    std::fs::read_to_string(path).map_err(|error| BridgeError::ConfigRead(what, error))
}

impl VroConfig {
    pub fn from_file(path: &Path) -> Result<Self, BridgeError> {
        Self::from_toml(&read(path, "vro")?)
    }

    pub fn from_toml(content: &str) -> Result<Self, BridgeError> {
        Ok(toml::from_str(content)?)
    }
}

impl VroServer {
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.server, self.port)
    }
}

impl VcenterConfig {
    pub fn from_file(path: &Path) -> Result<Self, BridgeError> {
        Ok(toml::from_str(&read(path, "vcenter")?)?)
    }
}

/// Per-invocation options taken from the function's environment.
///
/// A variable counts as set when it is present and non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub verbose: bool,
    pub insecure_ssl: bool,
    pub workflow_id: Option<String>,
    pub vro_config_path: PathBuf,
    pub vc_config_path: Option<PathBuf>,
    /// Regex filters keyed by lower-cased event field name, from
    /// `filter_<field>` variables.
    ///
    /// A filter is matched against the object's inventory path. The default
    /// `EventNameResolver` only knows the leaf name (`/Test VM`), so anchor on
    /// the name (`^/Win`) rather than on folders (`^/Lab/vm/`) unless a
    /// vCenter-backed resolver is installed.
    pub filters: HashMap<String, String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut settings = Settings {
            verbose: false,
            insecure_ssl: false,
            workflow_id: None,
            vro_config_path: PathBuf::from(DEFAULT_VRO_CONFIG),
            vc_config_path: None,
            filters: HashMap::new(),
        };
        for (key, value) in vars {
            let value = value.into();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "write_debug" => settings.verbose = true,
                "insecure_ssl" => settings.insecure_ssl = true,
                "vro_workflow_id" => settings.workflow_id = Some(value),
                "vro_config_path" => settings.vro_config_path = PathBuf::from(value),
                "vc_config_path" => settings.vc_config_path = Some(PathBuf::from(value)),
                key => {
                    if let Some(field) = key.strip_prefix(FILTER_PREFIX) {
                        settings.filters.insert(field.to_lowercase(), value);
                    }
                }
            }
        }
        settings
    }

    pub fn workflow_id(&self) -> Result<&str, BridgeError> {
        self.workflow_id
            .as_deref()
            .ok_or(BridgeError::MissingWorkflowId)
    }

    pub fn filter_for(&self, field: &str) -> Option<&str> {
        self.filters.get(&field.to_lowercase()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Settings, VroConfig, DEFAULT_VRO_CONFIG};
    use crate::error::BridgeError;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_vro_config_from_toml() {
        let config = VroConfig::from_toml(
            r#"
            [vro]
            server = "vro01.lab.local"
            port = 8281
            user = "administrator@vsphere.local"
            pass = "VMware1!"
            "#,
        )
        .unwrap();
        assert_eq!(config.vro.server, "vro01.lab.local");
        assert_eq!(config.vro.base_url(), "https://vro01.lab.local:8281");
    }

    #[test]
    fn test_vro_port_defaults_to_https() {
        let config = VroConfig::from_toml(
            r#"
            [vro]
            server = "vro01.lab.local"
            user = "admin"
            pass = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.vro.port, 443);
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = VroConfig::from_toml(
            r#"
            [vro]
            server = "vro01.lab.local"
            user = "admin"
            "#,
        );
        match result {
            Err(error @ BridgeError::ConfigKey(_)) => {
                assert_eq!(error.status(), 500);
                assert!(error.to_string().contains("pass"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = VroConfig::from_file(Path::new("/nonexistent/vroconfig"));
        match result {
            Err(error @ BridgeError::ConfigRead(..)) => {
                assert!(error.to_string().starts_with("Could not read vro configuration"))
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_settings_from_vars() {
        let settings = Settings::from_vars(vec![
            ("write_debug", "1"),
            ("insecure_ssl", "true"),
            ("vro_workflow_id", "5fff3097-61d4-4a5b-929c-9a1ce07ec195"),
            ("filter_vm", "^/Lab/vm/"),
            ("filter_Host", "esxi0[12]"),
            ("PATH", "/usr/bin"),
        ]);
        assert!(settings.verbose);
        assert!(settings.insecure_ssl);
        assert_eq!(
            settings.workflow_id().unwrap(),
            "5fff3097-61d4-4a5b-929c-9a1ce07ec195"
        );
        assert_eq!(settings.vro_config_path, PathBuf::from(DEFAULT_VRO_CONFIG));
        assert_eq!(settings.filter_for("Vm"), Some("^/Lab/vm/"));
        assert_eq!(settings.filter_for("Host"), Some("esxi0[12]"));
        assert_eq!(settings.filter_for("Datastore"), None);
    }

    #[test]
    fn test_empty_variables_are_unset() {
        let settings = Settings::from_vars(vec![("insecure_ssl", ""), ("vro_workflow_id", "")]);
        assert!(!settings.insecure_ssl);
        assert!(matches!(
            settings.workflow_id(),
            Err(BridgeError::MissingWorkflowId)
        ));
    }
}
