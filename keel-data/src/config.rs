//! Provider settings loaded from YAML files, `.env` files and environment variables.
//!
//! Resolution order (lowest to highest priority):
//! 1. `application.yaml` (base)
//! 2. `application-{profile}.yaml` (profile override)
//! 3. `.env` file (loaded into the process environment, never overwriting)
//! 4. Environment variables: `KEEL_DATA_MAX_PAGE_SIZE` overrides `keel.data.max-page-size`
//!
//! ```yaml
//! keel:
//!   data:
//!     provider-name: memory
//!     default-page-size: 25
//!     max-page-size: 500
//!     keyset-pagination: true
//!     dialect: postgres
//!     identifier-policy: quote
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::page::{PageRequest, DEFAULT_PAGE_SIZE};
use crate::query::{Dialect, IdentifierPolicy};

const PREFIX: &str = "keel.data";
const ENV_PREFIX: &str = "KEEL_DATA_";

/// Error type for settings operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load error: {0}")]
    Load(String),
    #[error("Config type mismatch for '{key}': expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DataSettings {
    pub provider_name: String,
    pub default_page_size: u64,
    pub max_page_size: u64,
    /// When `false`, cursored page requests fail with `UnsupportedOperation`.
    pub keyset_pagination: bool,
    pub dialect: Dialect,
    pub identifier_policy: IdentifierPolicy,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            provider_name: "keel".to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: 1000,
            keyset_pagination: true,
            dialect: Dialect::Generic,
            identifier_policy: IdentifierPolicy::Validate,
        }
    }
}

impl DataSettings {
    /// Load settings for the given profile from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."), profile)
    }

    /// Load settings for the given profile from `dir`.
    pub fn load_from_dir(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        load_yaml_file(&dir.join("application.yaml"), &mut values)?;
        load_yaml_file(&dir.join(format!("application-{profile}.yaml")), &mut values)?;

        let _ = dotenvy::from_path(dir.join(".env"));
        overlay_env(&mut values);

        let settings = Self::from_values(&values)?;
        tracing::debug!(
            profile,
            provider = %settings.provider_name,
            default_page_size = settings.default_page_size,
            max_page_size = settings.max_page_size,
            keyset = settings.keyset_pagination,
            "data settings loaded"
        );
        Ok(settings)
    }

    /// Parse settings from a YAML string (no environment overlay).
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        load_yaml_str(yaml, &mut values)?;
        Self::from_values(&values)
    }

    fn from_values(values: &HashMap<String, serde_yaml::Value>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some((key, v)) = lookup(values, "provider-name") {
            settings.provider_name = as_string(&key, v)?;
        }
        if let Some((key, v)) = lookup(values, "default-page-size") {
            settings.default_page_size = as_u64(&key, v)?;
        }
        if let Some((key, v)) = lookup(values, "max-page-size") {
            settings.max_page_size = as_u64(&key, v)?;
        }
        if let Some((key, v)) = lookup(values, "keyset-pagination") {
            settings.keyset_pagination = as_bool(&key, v)?;
        }
        if let Some((key, v)) = lookup(values, "dialect") {
            settings.dialect = as_string(&key, v)?
                .parse()
                .map_err(|_| ConfigError::TypeMismatch {
                    key,
                    expected: "one of generic, sqlite, mysql, postgres",
                })?;
        }
        if let Some((key, v)) = lookup(values, "identifier-policy") {
            settings.identifier_policy = as_string(&key, v)?
                .parse()
                .map_err(|_| ConfigError::TypeMismatch {
                    key,
                    expected: "one of raw, validate, quote",
                })?;
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider_name.trim().is_empty() {
            return Err(ConfigError::Validation("provider-name must not be empty".into()));
        }
        if self.default_page_size < 1 {
            return Err(ConfigError::Validation(
                "default-page-size must be at least 1".into(),
            ));
        }
        if self.max_page_size < self.default_page_size {
            return Err(ConfigError::Validation(format!(
                "max-page-size ({}) must not be smaller than default-page-size ({})",
                self.max_page_size, self.default_page_size
            )));
        }
        Ok(())
    }

    /// First-page request using the configured default size.
    pub fn page_request(&self) -> PageRequest {
        PageRequest::default()
            .size(self.default_page_size)
            .unwrap_or_default()
    }
}

fn lookup<'a>(
    values: &'a HashMap<String, serde_yaml::Value>,
    name: &str,
) -> Option<(String, &'a serde_yaml::Value)> {
    let key = format!("{PREFIX}.{name}");
    values.get(&key).map(|v| (key, v))
}

fn load_yaml_file(
    path: &Path,
    values: &mut HashMap<String, serde_yaml::Value>,
) -> Result<(), ConfigError> {
    if path.exists() {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
        load_yaml_str(&content, values)?;
    }
    Ok(())
}

fn load_yaml_str(
    content: &str,
    values: &mut HashMap<String, serde_yaml::Value>,
) -> Result<(), ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten_yaml("", &yaml, values);
    Ok(())
}

/// Flatten a YAML tree into dot-separated keys. Later files overwrite earlier ones key by key.
fn flatten_yaml(prefix: &str, value: &serde_yaml::Value, out: &mut HashMap<String, serde_yaml::Value>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key_str = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => format!("{other:?}"),
                };
                let full_key = if prefix.is_empty() {
                    key_str
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(&full_key, v, out);
            }
        }
        leaf => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), leaf.clone());
            }
        }
    }
}

// Convention: `KEEL_DATA_MAX_PAGE_SIZE` <-> `keel.data.max-page-size`
fn overlay_env(values: &mut HashMap<String, serde_yaml::Value>) {
    for (env_key, env_val) in std::env::vars() {
        if let Some(rest) = env_key.strip_prefix(ENV_PREFIX) {
            let key = format!("{PREFIX}.{}", rest.to_lowercase().replace('_', "-"));
            values.insert(key, serde_yaml::Value::String(env_val));
        }
    }
}

fn as_string(key: &str, v: &serde_yaml::Value) -> Result<String, ConfigError> {
    match v {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: "string",
        }),
    }
}

fn as_u64(key: &str, v: &serde_yaml::Value) -> Result<u64, ConfigError> {
    let mismatch = || ConfigError::TypeMismatch {
        key: key.to_string(),
        expected: "unsigned integer",
    };
    match v {
        serde_yaml::Value::Number(n) => n.as_u64().ok_or_else(mismatch),
        serde_yaml::Value::String(s) => s.trim().parse().map_err(|_| mismatch()),
        _ => Err(mismatch()),
    }
}

fn as_bool(key: &str, v: &serde_yaml::Value) -> Result<bool, ConfigError> {
    let mismatch = || ConfigError::TypeMismatch {
        key: key.to_string(),
        expected: "bool",
    };
    match v {
        serde_yaml::Value::Bool(b) => Ok(*b),
        serde_yaml::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(mismatch()),
        },
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_section_missing() {
        let settings = DataSettings::from_yaml_str("other: 1").unwrap();
        assert_eq!(settings, DataSettings::default());
    }

    #[test]
    fn reads_nested_section() {
        let yaml = r#"
keel:
  data:
    provider-name: memory
    default-page-size: 25
    max-page-size: 100
    keyset-pagination: false
    dialect: postgres
    identifier-policy: quote
"#;
        let s = DataSettings::from_yaml_str(yaml).unwrap();
        assert_eq!(s.provider_name, "memory");
        assert_eq!(s.default_page_size, 25);
        assert_eq!(s.max_page_size, 100);
        assert!(!s.keyset_pagination);
        assert_eq!(s.dialect, Dialect::Postgres);
        assert_eq!(s.identifier_policy, IdentifierPolicy::Quote);
        assert_eq!(s.page_request().page_size(), 25);
    }

    #[test]
    fn rejects_inconsistent_sizes() {
        let yaml = "keel:\n  data:\n    default-page-size: 50\n    max-page-size: 10\n";
        assert!(matches!(
            DataSettings::from_yaml_str(yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_wrong_types() {
        let yaml = "keel:\n  data:\n    max-page-size: lots\n";
        assert!(matches!(
            DataSettings::from_yaml_str(yaml),
            Err(ConfigError::TypeMismatch { .. })
        ));
        let yaml = "keel:\n  data:\n    dialect: oracle\n";
        assert!(DataSettings::from_yaml_str(yaml).is_err());
    }
}
