use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use confique::Config as _;

use crate::prelude::*;


/// The locations where Bookshelf will look for a configuration file. The
/// first existing file in this list is used.
// TODO: does the absolute path break on Windows? I hope it just results in
// "file not found". Or do we want to have a different path for Windows?
const DEFAULT_PATHS: &[&str] = &[
    // For better DX, we include this special path here, but just in debug mode.
    #[cfg(debug_assertions)]
    "util/dev-config/config.toml",

    "config.toml",
    "/etc/bookshelf/config.toml",
];

const BOOKSHELF_CONFIG_PATH_ENV: &str = "BOOKSHELF_CONFIG_PATH";

/// Configuration for Bookshelf.
///
/// All relative paths are relative to the location of this configuration
/// file.
#[derive(Debug, confique::Config)]
pub(crate) struct Config {
    #[config(nested)]
    pub(crate) api: crate::api::ApiConfig,

    #[config(nested)]
    pub(crate) db: crate::db::DbConfig,

    #[config(nested)]
    pub(crate) http: crate::http::HttpConfig,

    #[config(nested)]
    pub(crate) log: crate::logger::LogConfig,
}

impl Config {
    /// Tries to find a config file by checking `BOOKSHELF_CONFIG_PATH` and a
    /// list of possible default config file locations. The first config file
    /// found is loaded via [`Self::load_from`]. Returns the loaded config and
    /// the path that it was loaded from.
    pub(crate) fn from_env_or_default_locations() -> Result<(Self, PathBuf)> {
        let path = if let Some(path) = std::env::var_os(BOOKSHELF_CONFIG_PATH_ENV) {
            PathBuf::from(path)
        } else {
            DEFAULT_PATHS.iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
                .ok_or(anyhow!(
                    "no configuration file found. Note: we checked the following paths: {}",
                    DEFAULT_PATHS.join(", "),
                ))?
        };

        let config = Self::load_from(&path)
            .context(format!("failed to load configuration from '{}'", path.display()))?;

        Ok((config, path))
    }

    /// Loads the configuration from a specific TOML file.
    pub(crate) fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Config::from_file(path)
            .context(format!("failed to read config file '{}'", path.display()))?;

        config.fix_paths(path)?;

        Ok(config)
    }

    /// Goes through all paths in the configuration and changes relative paths
    /// to be absolute based on the path of the configuration file itself.
    fn fix_paths(&mut self, config_path: &Path) -> Result<()> {
        fn fix_path(base_path: &Path, path: &mut PathBuf) {
            if path.is_relative() {
                *path = base_path.join(&path);
            }
        }

        let absolute_config_path = config_path.canonicalize()
            .context("failed to canonicalize config path")?;
        let base = absolute_config_path.parent()
            .expect("config file path has no parent");

        if let Some(p) = &mut self.log.file {
            fix_path(base, p);
        }

        Ok(())
    }
}

/// Writes the generated TOML config template file to the given destination or
/// stdout.
pub(crate) fn write_template(path: Option<&PathBuf>) -> Result<()> {
    use confique::toml::FormatOptions;

    info!(
        "Writing configuration template to '{}'",
        path.map(|p| p.display().to_string()).unwrap_or("<stdout>".into()),
    );

    let template = confique::toml::template::<Config>(FormatOptions::default());
    match path {
        Some(path) => fs::write(path, template)?,
        None => io::stdout().write_all(template.as_bytes())?,
    }

    Ok(())
}
