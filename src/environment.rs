//! Execution environments and how they are recovered from run definitions
//!
//! A training run normally hands back its environment directly. When it
//! cannot, the environment is rebuilt from the `runDefinition.environment`
//! object of the run details document. That object travels as a typed
//! [`EnvironmentDefinition`] into an [`EnvironmentLoader`]:
//!
//! - [`DefinitionLoader`] deserializes it in memory
//! - [`DirectoryLoader`] writes it to `azureml_environment.json` and loads
//!   the directory back, for services that only accept on-disk definitions

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// File written and read by [`DirectoryLoader`].
pub const ENVIRONMENT_FILE_NAME: &str = "azureml_environment.json";

/// Execution environment descriptor attached to a run configuration.
///
/// Only `name` and `version` are interpreted; every other section of the
/// service document (`python`, `docker`, `environmentVariables`, ...) is
/// kept verbatim so it survives a round trip to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(flatten)]
    sections: Map<String, Value>,
}

impl Environment {
    /// Create an environment with no extra sections.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            sections: Map::new(),
        }
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add a raw section such as `python` or `docker`.
    #[must_use]
    pub fn with_section(mut self, key: impl Into<String>, value: Value) -> Self {
        self.sections.insert(key.into(), value);
        self
    }

    /// Get the environment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the version, if declared.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Get a raw section by key.
    #[must_use]
    pub fn section(&self, key: &str) -> Option<&Value> {
        self.sections.get(key)
    }

    /// Build an environment from a definition object.
    ///
    /// # Errors
    /// Returns error if the definition lacks a `name` or is not an object
    pub fn from_definition(definition: &EnvironmentDefinition) -> Result<Self> {
        Ok(Self::deserialize(definition.as_value())?)
    }

    /// Load the environment stored in `directory/azureml_environment.json`.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or parsed
    pub fn load_from_directory<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let file = File::open(directory.as_ref().join(ENVIRONMENT_FILE_NAME))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Raw environment object taken from a run definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentDefinition(Value);

impl EnvironmentDefinition {
    /// Wrap a raw JSON value.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the raw JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Take the raw JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Run details document, reduced to the fields the fallback reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDetails {
    #[serde(rename = "runDefinition", default)]
    run_definition: Option<RunDefinition>,
}

/// The `runDefinition` section of [`RunDetails`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDefinition {
    #[serde(default)]
    environment: Option<Value>,
}

impl RunDetails {
    /// Details whose run definition embeds `environment`.
    #[must_use]
    pub const fn with_environment(environment: Value) -> Self {
        Self {
            run_definition: Some(RunDefinition {
                environment: Some(environment),
            }),
        }
    }

    /// Details with a run definition but no environment.
    #[must_use]
    pub const fn without_environment() -> Self {
        Self {
            run_definition: Some(RunDefinition { environment: None }),
        }
    }

    /// Extract the embedded environment object.
    ///
    /// Returns `None` when the run definition is missing or its
    /// environment is absent or JSON `null`.
    #[must_use]
    pub fn environment_definition(&self) -> Option<EnvironmentDefinition> {
        self.run_definition
            .as_ref()
            .and_then(|definition| definition.environment.as_ref())
            .filter(|value| !value.is_null())
            .cloned()
            .map(EnvironmentDefinition::new)
    }
}

/// Turns a recovered definition into an environment.
pub trait EnvironmentLoader {
    /// Reconstruct the environment described by `definition`.
    ///
    /// # Errors
    /// Returns error if the definition cannot be turned into an environment
    fn load(&self, definition: EnvironmentDefinition) -> Result<Environment>;
}

/// Deserializes definitions in memory. No file is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionLoader;

impl EnvironmentLoader for DefinitionLoader {
    fn load(&self, definition: EnvironmentDefinition) -> Result<Environment> {
        Environment::from_definition(&definition)
    }
}

/// Persists the definition into a directory and loads it back from there.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    directory: PathBuf,
}

impl Default for DirectoryLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl DirectoryLoader {
    /// Create a loader writing into `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory the definition file is written to.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Full path of the definition file.
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(ENVIRONMENT_FILE_NAME)
    }
}

impl EnvironmentLoader for DirectoryLoader {
    fn load(&self, definition: EnvironmentDefinition) -> Result<Environment> {
        let path = self.file_path();
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, definition.as_value())?;
        writer.flush()?;
        drop(writer);

        tracing::debug!(path = %path.display(), "Wrote environment definition");
        Environment::load_from_directory(&self.directory)
    }
}
