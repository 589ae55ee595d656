use std::path::{Path, PathBuf};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Stem of the configuration file every tool loads.
const BASE_FILE_STEM: &str = "base";

const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix of environment variable overrides, e.g. `APP_MERGE__KINDS=node,way`.
const ENV_PREFIX: &str = "APP";

const ENV_PREFIX_SEPARATOR: &str = "_";

const ENV_SEPARATOR: &str = "__";

const LIST_SEPARATOR: &str = ",";

/// Implemented by configuration roots which can be loaded with [`load_config`].
pub trait Config {
    /// Keys whose environment variable values are split on commas into lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate the base configuration in `{directory}`; attempted: {attempted}")]
    BaseFileMissing { directory: PathBuf, attempted: String },

    #[error("failed to load `{path}`: {source}")]
    FileLoad {
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[source] std::io::Error),

    #[error("failed to build configuration: {0}")]
    Builder(#[source] rust_cli_config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),
}

/// Loads configuration from `./configuration`.
///
/// See [`load_config_from`] for the layering rules.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    load_config_from(&base_path.join(CONFIGURATION_DIR))
}

/// Loads configuration from `directory`.
///
/// Sources are layered in this order, later ones overriding earlier ones:
/// 1. `base.(yaml|yml|json)`, which must exist.
/// 2. `{environment}.(yaml|yml|json)` for the environment named by `APP_ENVIRONMENT`, if present.
/// 3. `APP_`-prefixed environment variables, with `__` separating nested keys.
pub fn load_config_from<T>(directory: &Path) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    let base_file = find_configuration_file(directory, BASE_FILE_STEM).ok_or_else(|| {
        LoadConfigError::BaseFileMissing {
            directory: directory.to_path_buf(),
            attempted: attempted_paths(directory, BASE_FILE_STEM),
        }
    })?;

    let mut builder =
        rust_cli_config::Config::builder().add_source(rust_cli_config::File::from(base_file.clone()));
    validate_source(&builder, &base_file)?;

    if let Some(environment_file) = find_configuration_file(directory, environment.as_str()) {
        builder = builder.add_source(rust_cli_config::File::from(environment_file.clone()));
        validate_source(&builder, &environment_file)?;
    }

    let mut environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in T::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn find_configuration_file(directory: &Path, stem: &str) -> Option<PathBuf> {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .find(|path| path.is_file())
}

fn attempted_paths(directory: &Path, stem: &str) -> String {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| format!("`{}`", directory.join(format!("{stem}.{extension}")).display()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds the configuration accumulated so far to report parse errors against the file that
/// introduced them.
fn validate_source(builder: &ConfigBuilder<DefaultState>, path: &Path) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map(|_| ())
        .map_err(|source| LoadConfigError::FileLoad {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rand::random;

    use super::*;
    use crate::shared::MapDiffConfig;

    fn scratch_directory() -> PathBuf {
        let directory = std::env::temp_dir().join(format!("mapdiff-config-{}", random::<u64>()));
        fs::create_dir_all(&directory).unwrap();
        directory
    }

    #[test]
    fn loads_kinds_from_base_file() {
        let directory = scratch_directory();
        fs::write(
            directory.join("base.yaml"),
            "merge:\n  kinds: [node, segment, way]\n",
        )
        .unwrap();

        let config: MapDiffConfig = load_config_from(&directory).unwrap();

        assert_eq!(config.merge.kinds, vec!["node", "segment", "way"]);
        assert!(config.validate().is_ok());

        fs::remove_dir_all(directory).unwrap();
    }

    #[test]
    fn missing_base_file_is_reported() {
        let directory = scratch_directory();

        let err = load_config_from::<MapDiffConfig>(&directory).unwrap_err();

        assert!(matches!(err, LoadConfigError::BaseFileMissing { .. }));

        fs::remove_dir_all(directory).unwrap();
    }

    #[test]
    fn missing_directory_is_reported() {
        let directory = std::env::temp_dir().join(format!("mapdiff-missing-{}", random::<u64>()));

        let err = load_config_from::<MapDiffConfig>(&directory).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::MissingConfigurationDirectory(_)
        ));
    }
}
