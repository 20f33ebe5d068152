//! Harness configuration.
//!
//! Loaded once from a JSON file (every key optional), then credentials are
//! overridden from the environment:
//! - `NAMEMATCH_SEARCH_API_KEY`
//! - `NAMEMATCH_SEARCH_SERVICE` (service name, endpoint becomes `https://<name>.search.windows.net`)
//! - `NAMEMATCH_SEARCH_ENDPOINT` (full endpoint, wins over the service name)
//! - `NAMEMATCH_INDEX_NAME`
//!
//! Relative paths resolve against the config file's directory, or the current
//! directory when no file is given.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::evaluation::subsets::{FieldSubset, SubsetError};
use crate::gateway::azure::{AzureSearchAdapter, DEFAULT_API_VERSION};
use crate::gateway::{GatewayConfig, SearchError, STANDARD_FIELD};

pub const ENV_API_KEY: &str = "NAMEMATCH_SEARCH_API_KEY";
pub const ENV_SERVICE: &str = "NAMEMATCH_SEARCH_SERVICE";
pub const ENV_ENDPOINT: &str = "NAMEMATCH_SEARCH_ENDPOINT";
pub const ENV_INDEX: &str = "NAMEMATCH_INDEX_NAME";

/// Analyzer field variants every document is uploaded under.
pub const DEFAULT_FIELDS: [&str; 10] = [
    "phonetic",
    "edge_n_gram",
    "keyword",
    "letter",
    "ngram",
    "camelcase",
    "email",
    "stemming",
    "url_email",
    "text_microsoft",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid field list: {0}")]
    Fields(#[from] SubsetError),
    #[error("baseline '{0}' is not an uploaded field variant")]
    UnknownBaseline(String),
    #[error(transparent)]
    Search(#[from] SearchError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    pub service_name: Option<String>,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub index_name: String,
    pub api_version: String,
    pub timeout_seconds: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            service_name: None,
            endpoint: None,
            api_key: None,
            index_name: "names".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = GatewayConfig::default();
        Self {
            max_retries: defaults.max_retries,
            retry_base_delay_ms: defaults.retry_base_delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    pub resources_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            resources_dir: PathBuf::from("resources"),
            reports_dir: PathBuf::from("generated"),
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentSettings {
    pub fields: Vec<String>,
    pub baseline: String,
    pub names_file: String,
    pub expected_file: String,
    pub misspelled_file: String,
    pub schema_file: String,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
            baseline: STANDARD_FIELD.to_string(),
            names_file: "names.csv".to_string(),
            expected_file: "names-expected.csv".to_string(),
            misspelled_file: "names-misspelled.csv".to_string(),
            schema_file: "index-schema.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub search: SearchSettings,
    pub gateway: RetrySettings,
    pub paths: PathSettings,
    pub experiment: ExperimentSettings,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl HarnessConfig {
    /// Load from `path` (or defaults), apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Override credentials and endpoint from `lookup` (normally the process env).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty(ENV_API_KEY) {
            self.search.api_key = Some(key);
        }
        if let Some(service) = non_empty(ENV_SERVICE) {
            self.search.service_name = Some(service);
        }
        if let Some(endpoint) = non_empty(ENV_ENDPOINT) {
            self.search.endpoint = Some(endpoint);
        }
        if let Some(index) = non_empty(ENV_INDEX) {
            self.search.index_name = index;
        }
    }

    /// Checks that do not need credentials; those are checked when the
    /// search adapter is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.experiment.fields.is_empty() {
            return Err(ConfigError::Fields(SubsetError::Empty));
        }
        FieldSubset::new(self.experiment.fields.clone())?;
        FieldSubset::single(self.experiment.baseline.clone())?;
        let baseline = self.experiment.baseline.as_str();
        if baseline != STANDARD_FIELD && !self.experiment.fields.iter().any(|f| f == baseline) {
            return Err(ConfigError::UnknownBaseline(baseline.to_string()));
        }
        Ok(())
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn resource(&self, file: &str) -> PathBuf {
        self.resolve(&self.paths.resources_dir).join(file)
    }

    pub fn names_path(&self) -> PathBuf {
        self.resource(&self.experiment.names_file)
    }

    pub fn expected_path(&self) -> PathBuf {
        self.resource(&self.experiment.expected_file)
    }

    pub fn misspelled_path(&self) -> PathBuf {
        self.resource(&self.experiment.misspelled_file)
    }

    pub fn schema_path(&self) -> PathBuf {
        self.resource(&self.experiment.schema_file)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.resolve(&self.paths.reports_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.paths.output_dir)
    }

    pub fn search_endpoint(&self) -> Result<String, ConfigError> {
        if let Some(endpoint) = &self.search.endpoint {
            return Ok(endpoint.clone());
        }
        self.search
            .service_name
            .as_deref()
            .map(AzureSearchAdapter::service_endpoint)
            .ok_or(ConfigError::Missing(
                "search endpoint (set search.service_name, search.endpoint or NAMEMATCH_SEARCH_SERVICE)",
            ))
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            max_retries: self.gateway.max_retries,
            retry_base_delay: Duration::from_millis(self.gateway.retry_base_delay_ms),
        }
    }

    pub fn search_adapter(&self) -> Result<AzureSearchAdapter, ConfigError> {
        let api_key = self
            .search
            .api_key
            .as_deref()
            .ok_or(ConfigError::Missing(
                "search api key (set search.api_key or NAMEMATCH_SEARCH_API_KEY)",
            ))?;
        Ok(AzureSearchAdapter::with_config(
            api_key,
            self.search_endpoint()?,
            self.search.index_name.clone(),
            self.search.api_version.clone(),
            Duration::from_secs(self.search.timeout_seconds),
        )?)
    }
}
