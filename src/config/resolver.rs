//! Precedence resolution for settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment (`LOOKOUT_DATA_DIR`, `LOOKOUT_LOG`)
//! 3. Project config.kdl (`<data-dir>/<project-hash>/config.kdl`)
//! 4. System config.kdl (`~/.config/lookout/config.kdl`)
//! 5. Built-in defaults
//!
//! The project config lives inside the data directory, so `data-dir` itself
//! is resolved without it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kdl::KdlDocument;

use crate::config::{LookoutConfig, OutputFormat};
use crate::storage::{default_data_root, project_data_dir};
use crate::{Error, Result};

pub const DATA_DIR_ENV: &str = "LOOKOUT_DATA_DIR";
pub const LOG_ENV: &str = "LOOKOUT_LOG";
/// Overrides the directory holding the system config.kdl
pub const CONFIG_DIR_ENV: &str = "LOOKOUT_CONFIG_DIR";

pub const CONFIG_FILE: &str = "config.kdl";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from the project's config.kdl
    Project,
    /// Value from the system config.kdl
    System,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Project => write!(f, "project"),
            ValueSource::System => write!(f, "system"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for settings resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub output_format: Option<OutputFormat>,
    pub persist: Option<bool>,
    pub response_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn with_response_timeout(mut self, secs: u64) -> Self {
        self.response_timeout_secs = Some(secs);
        self
    }
}

/// Everything resolved for one invocation, passed explicitly to constructors.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root under which per-project directories live
    pub data_root: Resolved<PathBuf>,
    /// `<data_root>/<project-hash>`; holds sessions.db, logs and config.kdl
    pub project_dir: PathBuf,
    pub persist: Resolved<bool>,
    pub response_timeout_secs: Resolved<u64>,
    pub log_level: Resolved<String>,
    pub output_format: Resolved<OutputFormat>,
}

impl Settings {
    /// `None` means wait for the human indefinitely.
    pub fn response_timeout(&self) -> Option<Duration> {
        match self.response_timeout_secs.value {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn human(&self) -> bool {
        self.output_format.value == OutputFormat::Human
    }
}

/// Raw inputs to resolution, gathered before any precedence is applied.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub env: HashMap<String, String>,
    pub system: LookoutConfig,
    pub project: LookoutConfig,
}

impl ConfigSources {
    /// Snapshot the `LOOKOUT_*` environment and read the system config.
    pub fn load() -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("LOOKOUT_"))
            .collect();
        let system = match system_config_path(&env) {
            Some(path) => read_config_file(&path)?,
            None => LookoutConfig::default(),
        };
        Ok(Self {
            env,
            system,
            project: LookoutConfig::default(),
        })
    }

    fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Resolve the data root: CLI > env > system config > platform default.
    pub fn data_root(&self, overrides: &ConfigOverrides) -> Result<Resolved<PathBuf>> {
        if let Some(ref dir) = overrides.data_dir {
            return Ok(Resolved::new(dir.clone(), ValueSource::CliFlag));
        }
        if let Some(dir) = self.env_value(DATA_DIR_ENV) {
            return Ok(Resolved::new(
                PathBuf::from(dir),
                ValueSource::EnvVar(DATA_DIR_ENV.to_string()),
            ));
        }
        if let Some(ref dir) = self.system.data_dir {
            return Ok(Resolved::new(PathBuf::from(dir), ValueSource::System));
        }
        Ok(Resolved::new(default_data_root()?, ValueSource::Default))
    }

    /// Apply the full precedence chain.
    pub fn resolve(
        &self,
        data_root: Resolved<PathBuf>,
        project_dir: PathBuf,
        overrides: &ConfigOverrides,
    ) -> Settings {
        let persist = pick(
            overrides.persist,
            None,
            self.project.persist,
            self.system.persist,
            false,
        );
        let response_timeout_secs = pick(
            overrides.response_timeout_secs,
            None,
            self.project.response_timeout_secs,
            self.system.response_timeout_secs,
            0,
        );
        let log_level = pick(
            overrides.log_level.clone(),
            self.env_value(LOG_ENV).map(|v| (v.to_string(), LOG_ENV)),
            self.project.log_level.clone(),
            self.system.log_level.clone(),
            DEFAULT_LOG_LEVEL.to_string(),
        );
        let output_format = pick(
            overrides.output_format,
            None,
            self.project.output_format,
            self.system.output_format,
            OutputFormat::Json,
        );

        Settings {
            data_root,
            project_dir,
            persist,
            response_timeout_secs,
            log_level,
            output_format,
        }
    }
}

fn pick<T>(
    cli: Option<T>,
    env: Option<(T, &str)>,
    project: Option<T>,
    system: Option<T>,
    default: T,
) -> Resolved<T> {
    if let Some(value) = cli {
        Resolved::new(value, ValueSource::CliFlag)
    } else if let Some((value, name)) = env {
        Resolved::new(value, ValueSource::EnvVar(name.to_string()))
    } else if let Some(value) = project {
        Resolved::new(value, ValueSource::Project)
    } else if let Some(value) = system {
        Resolved::new(value, ValueSource::System)
    } else {
        Resolved::new(default, ValueSource::Default)
    }
}

/// Location of the system config.kdl, if a config directory is known.
pub fn system_config_path(env: &HashMap<String, String>) -> Option<PathBuf> {
    if let Some(dir) = env.get(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join(CONFIG_FILE));
    }
    dirs::config_dir().map(|d| d.join("lookout").join(CONFIG_FILE))
}

/// Read and validate a config.kdl. A missing file is an empty config.
pub fn read_config_file(path: &Path) -> Result<LookoutConfig> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LookoutConfig::new()),
        Err(e) => return Err(e.into()),
    };
    let doc: KdlDocument = text
        .parse()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    let config = LookoutConfig::from_kdl(&doc);
    config
        .validate()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Resolve settings for the project at `project_path`.
pub fn resolve_settings(project_path: &Path, overrides: &ConfigOverrides) -> Result<Settings> {
    let mut sources = ConfigSources::load()?;
    let data_root = sources.data_root(overrides)?;
    let project_dir = project_data_dir(&data_root.value, project_path)?;
    sources.project = read_config_file(&project_dir.join(CONFIG_FILE))?;
    let settings = sources.resolve(data_root, project_dir, overrides);
    tracing::debug!(
        data_root = %settings.data_root.value.display(),
        data_root_source = %settings.data_root.source,
        log_level_source = %settings.log_level.source,
        "settings resolved"
    );
    Ok(settings)
}
