use std::error::Error as StdError;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::Target;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// `sqlite` for the embedded store, otherwise a postgres connection url.
    pub connect_url: String,

    /// Overrides the embedded store's default file.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

impl DatabaseConfig {
    pub fn target(&self) -> Target {
        match (Target::from_descriptor(&self.connect_url), &self.sqlite_path) {
            (Target::Embedded(_), Some(path)) => Target::Embedded(path.clone()),
            (target, _) => target,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TeamConfig {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BoxConfig {
    pub ip: String,
    #[serde(default)]
    pub hostname: Option<String>,
}

/// Directory sync settings. Sync is disabled when every field is empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LdapSettings {
    pub connect_url: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub search_base_dn: String,
    pub team_group_dn: String,
}

impl LdapSettings {
    pub fn is_enabled(&self) -> bool {
        *self != LdapSettings::default()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConfigSettings {
    pub database: DatabaseConfig,

    #[serde(default, rename = "team")]
    pub teams: Vec<TeamConfig>,

    #[serde(default, rename = "box")]
    pub boxes: Vec<BoxConfig>,

    #[serde(default)]
    pub ldap: LdapSettings,
}

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "couldn't open config: {}", _0)]
    Open(io::Error),
    #[display(fmt = "couldn't read config: {}", _0)]
    Read(io::Error),
    #[display(fmt = "couldn't parse config: {}", _0)]
    Parse(toml::de::Error),
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Open(err) | ConfigError::Read(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
        }
    }
}

impl ConfigSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut file = File::open(path.as_ref()).map_err(ConfigError::Open)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(ConfigError::Read)?;
        contents.parse()
    }
}

impl FromStr for ConfigSettings {
    type Err = ConfigError;

    fn from_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(ConfigError::Parse)
    }
}
