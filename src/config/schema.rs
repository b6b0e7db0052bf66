use serde::Deserialize;

use crate::error::{ArchiveError, Result};
use crate::vfs::Env;

use super::{COMPRESSION_METHOD_KEY, CREATE_KEY, DEFAULT_GROUP_KEY, DEFAULT_OWNER_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompressionMethod {
    Stored,
    #[default]
    Deflated,
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionMethod::Stored => write!(f, "STORED"),
            CompressionMethod::Deflated => write!(f, "DEFLATED"),
        }
    }
}

impl std::str::FromStr for CompressionMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STORED" => Ok(CompressionMethod::Stored),
            "DEFLATED" => Ok(CompressionMethod::Deflated),
            _ => Err(format!(
                "Invalid compression method '{}'. Must be one of: STORED, DEFLATED",
                s
            )),
        }
    }
}

impl From<CompressionMethod> for zip::CompressionMethod {
    fn from(method: CompressionMethod) -> Self {
        match method {
            CompressionMethod::Stored => zip::CompressionMethod::Stored,
            CompressionMethod::Deflated => zip::CompressionMethod::Deflated,
        }
    }
}

/// Typed view of the options an archive mount understands.
///
/// Unset fields fall back to the defaults in [`crate::config`]; keys the
/// archive provider does not know are ignored when parsing an [`Env`].
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOptions {
    #[serde(default)]
    pub create: Option<bool>,
    #[serde(default)]
    pub default_owner: Option<String>,
    #[serde(default)]
    pub default_group: Option<String>,
    #[serde(default)]
    pub compression_method: Option<CompressionMethod>,
}

impl ArchiveOptions {
    pub fn get_create(&self) -> bool {
        self.create.unwrap_or(false)
    }

    pub fn get_default_owner(&self) -> String {
        self.default_owner
            .clone()
            .unwrap_or_else(super::current_principal)
    }

    pub fn get_default_group(&self) -> String {
        self.default_group
            .clone()
            .unwrap_or_else(super::current_principal)
    }

    pub fn get_compression_method(&self) -> CompressionMethod {
        self.compression_method.unwrap_or_default()
    }

    /// Parse and validate the options in `env`.
    pub fn from_env(env: &Env) -> Result<Self> {
        let create = env
            .get(CREATE_KEY)
            .map(|value| match value.to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(invalid(CREATE_KEY, value)),
            })
            .transpose()?;

        let compression_method = env
            .get(COMPRESSION_METHOD_KEY)
            .map(|value| {
                value
                    .parse::<CompressionMethod>()
                    .map_err(|_| invalid(COMPRESSION_METHOD_KEY, value))
            })
            .transpose()?;

        Ok(ArchiveOptions {
            create,
            default_owner: env.get(DEFAULT_OWNER_KEY).cloned(),
            default_group: env.get(DEFAULT_GROUP_KEY).cloned(),
            compression_method,
        })
    }

    /// The set fields as provider options.
    pub fn to_env(&self) -> Env {
        let mut env = Env::default();
        if let Some(create) = self.create {
            env.insert(CREATE_KEY.to_string(), create.to_string());
        }
        if let Some(owner) = &self.default_owner {
            env.insert(DEFAULT_OWNER_KEY.to_string(), owner.clone());
        }
        if let Some(group) = &self.default_group {
            env.insert(DEFAULT_GROUP_KEY.to_string(), group.clone());
        }
        if let Some(method) = self.compression_method {
            env.insert(COMPRESSION_METHOD_KEY.to_string(), method.to_string());
        }
        env
    }
}

fn invalid(key: &str, value: &str) -> ArchiveError {
    ArchiveError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Env {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_compression_method_parsing() {
        assert_eq!(
            "stored".parse::<CompressionMethod>().unwrap(),
            CompressionMethod::Stored
        );
        assert_eq!(
            "DEFLATED".parse::<CompressionMethod>().unwrap(),
            CompressionMethod::Deflated
        );
        assert!("BZIP2".parse::<CompressionMethod>().is_err());
    }

    #[test]
    fn test_from_env_rejects_unknown_compression_method() {
        let err = ArchiveOptions::from_env(&env(&[("compressionMethod", "LZMA")])).unwrap_err();
        match err {
            ArchiveError::InvalidOption { key, value } => {
                assert_eq!(key, "compressionMethod");
                assert_eq!(value, "LZMA");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_env_ignores_unknown_keys() {
        let options =
            ArchiveOptions::from_env(&env(&[("create", "true"), ("useTempFile", "yes")])).unwrap();
        assert!(options.get_create());
        assert_eq!(options.get_compression_method(), CompressionMethod::Deflated);
    }

    #[test]
    fn test_env_conversion_keeps_set_fields() {
        let options = ArchiveOptions {
            create: Some(true),
            default_owner: Some("builder".to_string()),
            compression_method: Some(CompressionMethod::Stored),
            ..Default::default()
        };
        let env = options.to_env();
        assert_eq!(env.get("compressionMethod").map(String::as_str), Some("STORED"));
        assert!(!env.contains_key("defaultGroup"));
        assert_eq!(ArchiveOptions::from_env(&env).unwrap(), options);
    }

    #[test]
    fn test_toml_uses_option_key_names() {
        let options: ArchiveOptions =
            toml::from_str("defaultOwner = \"ci\"\ncompressionMethod = \"STORED\"\n").unwrap();
        assert_eq!(options.get_default_owner(), "ci");
        assert_eq!(options.get_compression_method(), CompressionMethod::Stored);
    }
}
