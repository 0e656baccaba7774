// prep-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::error::{PrepError, Result};

pub const DEFAULT_DATASET_DIR: &str = "DATASET";
pub const DEFAULT_SCRATCH_DIR: &str = "temp_download";
pub const DEFAULT_ARCHIVE_NAME: &str = "DATASET.zip";
pub const DEFAULT_DATASET_ID: &str = "1F99QfUPzWKrR8JK-JBD4cKANcLoPf_ip";
pub const DEFAULT_MANIFEST: &str = "requirements.txt";
pub const DEFAULT_ACCELERATED_MODULE: &str = "torch";
pub const DEFAULT_ACCELERATED_INDEX: &str = "https://download.pytorch.org/whl/cu118";
pub const CONFIG_FILENAME: &str = "prep.toml";
const STATE_DIRNAME: &str = ".prep";

/// Dataset acquisition settings. Every field has a built-in default and can be
/// overridden from the `[dataset]` table of `prep.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetSettings {
    pub dir: String,
    pub scratch_dir: String,
    pub archive_name: String,
    pub remote_id: String,
    /// Path relative to the dataset dir whose presence marks a finished
    /// acquisition. Defaults to the dataset dir name (`DATASET/DATASET`).
    pub marker: Option<String>,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            dir: DEFAULT_DATASET_DIR.to_string(),
            scratch_dir: DEFAULT_SCRATCH_DIR.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            remote_id: DEFAULT_DATASET_ID.to_string(),
            marker: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentSettings {
    pub manifest: String,
    pub accelerated_module: String,
    pub accelerated_packages: Vec<String>,
    pub accelerated_index: String,
    pub python: Option<PathBuf>,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            manifest: DEFAULT_MANIFEST.to_string(),
            accelerated_module: DEFAULT_ACCELERATED_MODULE.to_string(),
            accelerated_packages: vec![
                "torch".to_string(),
                "torchvision".to_string(),
                "torchaudio".to_string(),
            ],
            accelerated_index: DEFAULT_ACCELERATED_INDEX.to_string(),
            python: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    dataset: DatasetSettings,
    environment: EnvironmentSettings,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub dataset: DatasetSettings,
    pub environment: EnvironmentSettings,
    /// Value of `VIRTUAL_ENV` captured when the config was loaded.
    pub virtual_env: Option<PathBuf>,
}

impl Config {
    /// Loads the configuration for the project in the current directory.
    pub fn load() -> Result<Self> {
        let root = env::current_dir().map_err(|e| {
            PrepError::Config(format!("Could not determine current directory: {e}"))
        })?;
        Self::load_from(&root)
    }

    /// Built-in defaults → `<root>/prep.toml` → environment overrides.
    pub fn load_from(root: &Path) -> Result<Self> {
        debug!("Loading prep configuration for {}", root.display());
        let mut config = Self::with_root(root);

        let file_path = root.join(CONFIG_FILENAME);
        if file_path.is_file() {
            debug!("Reading config file {}", file_path.display());
            let raw = std::fs::read_to_string(&file_path)?;
            let parsed = Self::parse_file(&raw).map_err(|e| {
                PrepError::Config(format!("Invalid {}: {e}", file_path.display()))
            })?;
            config.dataset = parsed.dataset;
            config.environment = parsed.environment;
        } else {
            debug!("No {} found, using built-in defaults", CONFIG_FILENAME);
        }

        if let Some(id) = non_empty_var("PREP_DATASET_ID") {
            debug!("Dataset id overridden by PREP_DATASET_ID");
            config.dataset.remote_id = id;
        }
        if let Some(python) = non_empty_var("PREP_PYTHON") {
            debug!("Interpreter overridden by PREP_PYTHON: {}", python);
            config.environment.python = Some(PathBuf::from(python));
        }
        config.virtual_env = non_empty_var("VIRTUAL_ENV").map(PathBuf::from);

        config.validate()?;
        debug!("Configuration loaded successfully.");
        Ok(config)
    }

    /// Defaults only, without reading files or the environment.
    pub fn with_root(root: &Path) -> Self {
        Self {
            project_root: root.to_path_buf(),
            dataset: DatasetSettings::default(),
            environment: EnvironmentSettings::default(),
            virtual_env: None,
        }
    }

    fn parse_file(raw: &str) -> Result<ConfigFile> {
        Ok(toml::from_str(raw)?)
    }

    fn validate(&self) -> Result<()> {
        if self.dataset.dir.trim().is_empty() {
            return Err(PrepError::Config("dataset.dir must not be empty".into()));
        }
        if self.dataset.dir == self.dataset.scratch_dir {
            return Err(PrepError::Config(
                "dataset.dir and dataset.scratch_dir must differ".into(),
            ));
        }
        if self.dataset.remote_id.trim().is_empty() {
            return Err(PrepError::Config("dataset.remote_id must not be empty".into()));
        }
        Ok(())
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.project_root.join(&self.dataset.dir)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.project_root.join(&self.dataset.scratch_dir)
    }

    pub fn dataset_marker_path(&self) -> PathBuf {
        let marker = self.dataset.marker.as_deref().unwrap_or(&self.dataset.dir);
        self.dataset_dir().join(marker)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.scratch_dir().join(&self.dataset.archive_name)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.project_root.join(&self.environment.manifest)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIRNAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir().join("logs")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}
