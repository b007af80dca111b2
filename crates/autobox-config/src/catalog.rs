use autobox_common::{Document, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::settings::{Settings, SimulationDefaults};
use crate::{ConfigError, Result};

/// Mount point of the catalog root inside a simulation container.
pub const CONTAINER_CONFIG_ROOT: &str = "/app/config";

/// Named simulations stored as `simulations/<name>.json` with a matching
/// `metrics/<name>.json`, plus an optional shared server config.
#[derive(Debug, Clone)]
pub struct SimulationCatalog {
    root: PathBuf,
}

/// Everything needed to launch one named simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfigSet {
    pub name: String,
    pub simulation_path: PathBuf,
    pub metrics_path: PathBuf,
    pub server_path: PathBuf,
    pub simulation: Document,
    /// Object or array; passed through as-is.
    pub metrics: Document,
    pub server: Option<Document>,
    pub mount_source: PathBuf,
}

impl SimulationCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Catalog at the default location, `<home>/.autobox/config`.
    pub fn for_home(home: &Path) -> Self {
        Self::from_settings(&Settings::defaults_for(home))
    }

    /// Catalog rooted at `simulation.catalog_directory`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.simulation.catalog_directory.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn simulations_dir(&self) -> PathBuf {
        self.root.join("simulations")
    }

    pub fn metrics_dir(&self) -> PathBuf {
        self.root.join("metrics")
    }

    /// `Gift-Choice` and `gift_choice.json` both map to `gift_choice.json`.
    pub fn file_name(name: &str) -> String {
        let file = name.replace('-', "_").to_lowercase();
        if file.ends_with(".json") {
            file
        } else {
            format!("{file}.json")
        }
    }

    /// `default.json` when present, else `server.json`.
    pub fn server_path(&self) -> PathBuf {
        let default = self.root.join("default.json");
        if default.exists() {
            default
        } else {
            self.root.join("server.json")
        }
    }

    /// Check that both halves of a named simulation exist.
    pub fn validate(&self, name: &str) -> Result<()> {
        let file = Self::file_name(name);
        if !self.simulations_dir().join(&file).exists() {
            return Err(ConfigError::SimulationNotFound(file));
        }
        if !self.metrics_dir().join(&file).exists() {
            return Err(ConfigError::MetricsNotFound(file));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn load(&self, name: &str) -> Result<SimulationConfigSet> {
        let file = Self::file_name(name);
        let simulation_path = self.simulations_dir().join(&file);
        let metrics_path = self.metrics_dir().join(&file);
        let server_path = self.server_path();

        let simulation = read_document(&simulation_path)?
            .ok_or_else(|| ConfigError::SimulationNotFound(file.clone()))?;
        let metrics = read_document(&metrics_path)?
            .ok_or_else(|| ConfigError::MetricsNotFound(file.clone()))?;
        let server = read_document(&server_path)?;

        debug!(
            simulation = %simulation_path.display(),
            has_server = server.is_some(),
            "Loaded simulation config set"
        );

        Ok(SimulationConfigSet {
            name: name.to_string(),
            simulation_path,
            metrics_path,
            server_path,
            simulation,
            metrics,
            server,
            mount_source: self.root.clone(),
        })
    }

    /// Names with both a simulation and a metrics file, sorted.
    pub fn list_available(&self) -> Result<Vec<String>> {
        let Some(simulations) = json_file_names(&self.simulations_dir())? else {
            return Ok(Vec::new());
        };
        let Some(metrics) = json_file_names(&self.metrics_dir())? else {
            return Ok(Vec::new());
        };

        let mut names: Vec<String> = simulations
            .into_iter()
            .filter(|file| metrics.contains(file))
            .filter_map(|file| file.strip_suffix(".json").map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }
}

impl SimulationConfigSet {
    /// The `name` field of the simulation document, if it has one.
    pub fn display_name(&self) -> Option<&str> {
        self.simulation
            .get("name")
            .and_then(Document::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Container paths and mounts for launching this set with the given defaults.
    pub fn launch_config(&self, defaults: &SimulationDefaults) -> SimulationConfig {
        SimulationConfig {
            name: Some(self.name.clone()),
            config_path: container_path("simulations", &self.simulation_path),
            metrics_path: container_path("metrics", &self.metrics_path),
            server_path: format!("{CONTAINER_CONFIG_ROOT}/server.json"),
            image: defaults.default_image.clone(),
            environment: defaults.default_environment.clone(),
            volumes: vec![format!(
                "{}:{CONTAINER_CONFIG_ROOT}",
                self.mount_source.display()
            )],
        }
    }
}

fn container_path(dir: &str, host_path: &Path) -> String {
    let file = host_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{CONTAINER_CONFIG_ROOT}/{dir}/{file}")
}

/// Read and parse a JSON file; `None` when it does not exist.
fn read_document(path: &Path) -> Result<Option<Document>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Regular `*.json` files in `dir`; `None` when the directory is missing.
fn json_file_names(dir: &Path) -> Result<Option<Vec<String>>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".json") {
            names.push(name);
        }
    }
    Ok(Some(names))
}
