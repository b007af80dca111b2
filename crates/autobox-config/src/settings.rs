use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::{ConfigError, Result};

pub const SETTINGS_FILE_NAME: &str = "autobox.yaml";
/// Environment variables are read as `AUTOBOX_<SECTION>__<FIELD>`.
pub const ENV_PREFIX: &str = "AUTOBOX";
pub const ENV_SEPARATOR: &str = "__";

/// Keys whose environment values are comma-separated lists.
const LIST_KEYS: [&str; 1] = ["simulation.default_volumes"];

/// Fully resolved settings: defaults, then the settings file, then environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub docker: DockerSettings,
    pub lifecycle: LifecycleSettings,
    pub simulation: SimulationDefaults,
    pub output: OutputSettings,
}

/// How to reach the container runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerSettings {
    /// `unix://` socket or `tcp://`/`http://`/`https://` endpoint.
    pub host: String,
    pub api_version: String,
    pub tls_verify: bool,
    /// Directory holding `key.pem`, `cert.pem` and `ca.pem` when `tls_verify` is set.
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleSettings {
    pub stop_grace_period_secs: u64,
    /// Grace period of the best-effort stop issued before a forced remove.
    pub remove_grace_period_secs: u64,
    /// Interface whose counters are reported as network I/O.
    pub network_interface: String,
}

impl LifecycleSettings {
    pub fn stop_grace_period(&self) -> Duration {
        Duration::from_secs(self.stop_grace_period_secs)
    }

    pub fn remove_grace_period(&self) -> Duration {
        Duration::from_secs(self.remove_grace_period_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationDefaults {
    /// Image used for every launch.
    pub default_image: String,
    pub default_config_path: String,
    pub default_metrics_path: String,
    pub default_server_path: String,
    #[serde(default)]
    pub default_volumes: Vec<String>,
    #[serde(default)]
    pub default_environment: BTreeMap<String, String>,
    pub logs_directory: PathBuf,
    /// Host side of the default `/app/configs` volume for ad hoc launches.
    pub configs_directory: PathBuf,
    /// Root of the named simulation catalog, mounted at `/app/config`.
    pub catalog_directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub verbose: bool,
    pub color: bool,
}

/// Accepted in any letter case; written lower-case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!(
                "unknown output format `{other}`, expected table, json or yaml"
            )),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Yaml => "yaml",
        })
    }
}

/// Current user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    dirs_next::home_dir().ok_or(ConfigError::HomeUnavailable)
}

impl Settings {
    /// Built-in defaults, with home-relative paths resolved against `home`.
    pub fn defaults_for(home: &Path) -> Self {
        let autobox_dir = home.join(".autobox");
        let configs_dir = autobox_dir.join("configs");
        Self {
            docker: DockerSettings {
                host: "unix:///var/run/docker.sock".to_string(),
                api_version: "1.41".to_string(),
                tls_verify: false,
                cert_path: None,
                timeout_secs: 120,
            },
            lifecycle: LifecycleSettings {
                stop_grace_period_secs: 30,
                remove_grace_period_secs: 10,
                network_interface: "eth0".to_string(),
            },
            simulation: SimulationDefaults {
                default_image: "autobox-engine:latest".to_string(),
                default_config_path: "/app/configs/simulation.json".to_string(),
                default_metrics_path: "/app/configs/metrics.json".to_string(),
                default_server_path: "/app/configs/server.json".to_string(),
                default_volumes: vec![format!("{}:/app/configs", configs_dir.display())],
                default_environment: BTreeMap::new(),
                logs_directory: autobox_dir.join("logs"),
                configs_directory: configs_dir,
                catalog_directory: autobox_dir.join("config"),
            },
            output: OutputSettings {
                format: OutputFormat::Table,
                verbose: false,
                color: true,
            },
        }
    }

    /// Locations probed for the settings file, in priority order.
    pub fn search_paths(home: &Path) -> Vec<PathBuf> {
        vec![
            home.join(".autobox").join(SETTINGS_FILE_NAME),
            PathBuf::from(".").join(SETTINGS_FILE_NAME),
            PathBuf::from("/etc/autobox").join(SETTINGS_FILE_NAME),
        ]
    }

    /// Resolve settings for the current user and process environment.
    ///
    /// A `.env` file in the working directory is read first, so its entries
    /// take part in the `AUTOBOX_*` override layer.
    pub fn load() -> Result<Self> {
        let home = home_dir()?;
        read_dotenv();
        let file = Self::search_paths(&home).into_iter().find(|p| p.is_file());
        Self::resolve(&home, file.as_deref(), std::env::vars())
    }

    /// Resolve settings from an explicit settings file, `.env` and the process environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let home = home_dir()?;
        read_dotenv();
        Self::resolve(&home, Some(path), std::env::vars())
    }

    /// Layer defaults, an optional settings file and `AUTOBOX_*` variables.
    ///
    /// The file is deep-merged, so it only overrides the keys it names.
    /// Environment keys use `__` between section and field, for example
    /// `AUTOBOX_LIFECYCLE__STOP_GRACE_PERIOD_SECS=5`. Values are read as
    /// strings and converted to the field type on deserialize, except the
    /// list keys, which are split on commas.
    pub fn resolve<I>(home: &Path, file: Option<&Path>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let defaults = Config::try_from(&Self::defaults_for(home))
            .map_err(|e| ConfigError::Invalid(format!("defaults not representable: {e}")))?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = file {
            builder = builder.add_source(file_layer(path)?);
        }

        let (lists, scalars): (Map<String, String>, Map<String, String>) = vars
            .into_iter()
            .filter(|(name, _)| settings_key(name).is_some())
            .partition(|(name, _)| {
                settings_key(name).is_some_and(|key| LIST_KEYS.contains(&key.as_str()))
            });
        builder = builder
            .add_source(env_layer().source(Some(scalars)))
            .add_source(list_env_layer().source(Some(lists)));

        let settings: Settings = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.docker.host.trim().is_empty() {
            return Err(ConfigError::Invalid("docker.host must not be empty".to_string()));
        }
        if self.simulation.default_image.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "simulation.default_image must not be empty".to_string(),
            ));
        }
        if self.lifecycle.network_interface.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "lifecycle.network_interface must not be empty".to_string(),
            ));
        }
        if self.docker.tls_verify && self.docker.cert_path.is_none() {
            return Err(ConfigError::Invalid(
                "docker.cert_path is required when docker.tls_verify is set".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded .env file");
    }
}

/// Read and parse one YAML settings file so its errors name the file.
fn file_layer(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Merging settings file");
    Config::builder()
        .add_source(File::from_str(&text, FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn env_layer() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(ENV_SEPARATOR)
}

fn list_env_layer() -> Environment {
    LIST_KEYS.iter().fold(
        env_layer().try_parsing(true).list_separator(","),
        |env, key| env.with_list_parse_key(key),
    )
}

/// `AUTOBOX_DOCKER__HOST` -> `docker.host`; `None` outside the prefix.
fn settings_key(variable: &str) -> Option<String> {
    let prefix_len = ENV_PREFIX.len() + 1;
    let head = variable.get(..prefix_len)?;
    if !head.eq_ignore_ascii_case(&format!("{ENV_PREFIX}_")) {
        return None;
    }
    Some(
        variable[prefix_len..]
            .to_ascii_lowercase()
            .replace(ENV_SEPARATOR, "."),
    )
}
