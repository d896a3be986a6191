//! Loading, validating, and saving the configuration document.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use path_absolutize::Absolutize;
use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, Result};
use crate::mapping::Mapping;
use crate::settings::Settings;

/// Persisted per-project state. Membership is derived from the mapping list
/// on every load; only the enabled flag survives across loads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProjectFlag {
    /// Whether the project's mappings are watched.
    pub enabled: bool,
}

impl Default for ProjectFlag {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Insertion-ordered map of project name to its persisted flag.
pub type ProjectFlags = IndexMap<String, ProjectFlag>;

/// The whole configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ordered list of synchronization rules.
    #[serde(default)]
    pub mappings: Vec<Mapping>,

    /// Persisted project flags, keyed by derived project name.
    #[serde(default)]
    pub projects: ProjectFlags,

    /// Tool-wide settings.
    #[serde(default)]
    pub settings: Settings,
}

impl Config {
    /// Parse a configuration document from raw JSON.
    ///
    /// Windows paths pasted into the file frequently carry unescaped
    /// backslashes; when plain parsing fails, the path fields are repaired
    /// and parsing is retried before the error is reported.
    pub fn from_json(raw: &str) -> Result<Self> {
        match serde_json::from_str(raw) {
            Ok(config) => Ok(config),
            Err(first_err) => {
                let repaired = repair_path_backslashes(raw);
                match serde_json::from_str(&repaired) {
                    Ok(config) => {
                        debug!("configuration parsed after backslash repair");
                        Ok(config)
                    }
                    Err(_) => Err(ConfigError::Parse(first_err)),
                }
            }
        }
    }

    /// Validate the document and normalize its paths in place.
    ///
    /// Source and target paths become absolute, every target directory is
    /// created, and a missing source directory produces a warning but does
    /// not fail the load (that mapping is skipped later, at watch start).
    pub fn validate(&mut self) -> Result<()> {
        for (index, mapping) in self.mappings.iter_mut().enumerate() {
            if mapping.source_file.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "mappings[{index}]: source_file is empty"
                )));
            }
            if mapping.target_dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "mappings[{index}]: target_dir is empty"
                )));
            }

            mapping.source_file = absolutize(&mapping.source_file)?;
            mapping.target_dir = absolutize(&mapping.target_dir)?;

            fs::create_dir_all(&mapping.target_dir)?;

            match mapping.source_file.parent() {
                Some(parent) if parent.exists() => {}
                Some(parent) => {
                    warn!(mapping = index, path = %parent.display(), "source directory does not exist");
                }
                None => {
                    return Err(ConfigError::Invalid(format!(
                        "mappings[{index}]: source_file has no parent directory"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    path.absolutize()
        .map(|p| p.into_owned())
        .map_err(ConfigError::Io)
}

/// Escape lone backslashes inside `source_file`/`target_dir` string values.
fn repair_path_backslashes(content: &str) -> String {
    // The [^"] class keeps the repair scoped to one string value at a time.
    let pattern = match Regex::new(r#""(source_file|target_dir)"(\s*:\s*)"([^"]*)""#) {
        Ok(re) => re,
        Err(_) => return content.to_string(),
    };

    pattern
        .replace_all(content, |caps: &Captures| {
            let marker = '\u{1}';
            let path = caps[3]
                .replace("\\\\", &marker.to_string())
                .replace('\\', "\\\\")
                .replace(marker, "\\\\");
            format!("\"{}\"{}\"{}\"", &caps[1], &caps[2], path)
        })
        .into_owned()
}

/// Handle to the configuration file on disk.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store for the given configuration file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the configuration file.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Load, parse, and validate the configuration.
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Err(ConfigError::NotFound(self.path.display().to_string()));
        }

        let raw = fs::read_to_string(&self.path)?;
        let mut config = Config::from_json(&raw)?;
        config.validate()?;

        debug!(
            mappings = config.mappings.len(),
            projects = config.projects.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Write the configuration back to disk as pretty-printed JSON.
    pub fn save(&self, config: &Config) -> Result<()> {
        let raw = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}
