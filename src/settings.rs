use anyhow::Result;
use config::{builder::DefaultState, ConfigBuilder, Environment, File};
use serde::{de::Visitor, Deserialize, Deserializer};
use std::{str::FromStr, time::Duration};
use tracing::Level;

const LOG_LEVELS: [&str; 5] = ["DEBUG", "ERROR", "INFO", "TRACE", "WARN"];

struct LevelVisitor;

impl<'de> Visitor<'de> for LevelVisitor {
    type Value = Level;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter
            .write_str("Expecting a number 1-5 or ")
            .and(formatter.write_str(&LOG_LEVELS.join(",")))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        FromStr::from_str(v).map_err(|_| E::unknown_variant(v, &LOG_LEVELS))
    }
}

pub fn deserialize_level<'de, D>(de: D) -> Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    de.deserialize_string(LevelVisitor)
}

/// Driver settings, read from an optional `config` file and the environment.
///
/// The retry budgets exist because some host BLE stacks fail connects and
/// truncate service lists for reasons outside this driver's control; they
/// are knobs rather than constants on purpose.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Window for resolving a scan target and for each connect attempt.
    pub connect_timeout_secs: u64,
    /// How long one command may wait for its response.
    pub response_timeout_secs: u64,
    /// Connect attempts before giving up on a flaky link.
    pub connect_attempts: u32,
    /// Service discovery attempts before a missing characteristic is fatal.
    pub discovery_attempts: u32,
    #[serde(deserialize_with = "deserialize_level")]
    pub loglevel: Level,
}

impl Settings {
    pub fn new() -> Result<Settings> {
        let reader = ConfigBuilder::<DefaultState>::default()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::default())
            .build()?;

        Ok(reader.try_deserialize()?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            connect_timeout_secs: 60,
            response_timeout_secs: 10,
            connect_attempts: 5,
            discovery_attempts: 5,
            loglevel: Level::INFO,
        }
    }
}
