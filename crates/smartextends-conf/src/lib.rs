use std::fs;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use config::Config;
use config::ConfigError as ExternalConfigError;
use config::File;
use config::FileFormat;
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration build/deserialize error")]
    Config(#[from] ExternalConfigError),
    #[error("Failed to read pyproject.toml")]
    PyprojectIo(#[from] std::io::Error),
    #[error("Failed to parse pyproject.toml TOML")]
    PyprojectParse(#[from] toml::de::Error),
    #[error("Failed to serialize extracted pyproject data")]
    PyprojectSerialize(#[from] toml::ser::Error),
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    /// Register the smart directive under the `extends` tag name as well.
    pub overwrite_extends: bool,
    /// Wrap the loader chain with the compiled-template cache.
    pub cached: bool,
    /// Template sources, in lookup order.
    pub loaders: Vec<LoaderSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            overwrite_extends: false,
            cached: true,
            loaders: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoaderSettings {
    Filesystem {
        dirs: Vec<Utf8PathBuf>,
    },
    AppDirectories {
        apps: Vec<Utf8PathBuf>,
    },
    Memory {
        #[serde(default = "default_memory_key")]
        key: String,
        #[serde(default)]
        templates: Vec<InlineTemplate>,
    },
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct InlineTemplate {
    pub name: String,
    pub content: String,
}

fn default_memory_key() -> String {
    "memory".to_string()
}

impl Settings {
    pub fn new(project_root: &Utf8Path) -> Result<Self, ConfigError> {
        let user_config_file =
            ProjectDirs::from("com.github", "smartextends", "smartextends").and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.config_dir().join("smartextends.toml")).ok()
            });

        Self::load_from_paths(project_root, user_config_file.as_deref())
    }

    fn load_from_paths(
        project_root: &Utf8Path,
        user_config_path: Option<&Utf8Path>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = user_config_path {
            builder = builder.add_source(
                File::from(path.as_std_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let pyproject_path = project_root.join("pyproject.toml");
        if pyproject_path.exists() {
            let content = fs::read_to_string(&pyproject_path)?;
            let full_toml_value: toml::Value = toml::from_str(&content)?;

            let table = ["tool", "smartextends"]
                .iter()
                .try_fold(&full_toml_value, |current, &key| current.get(key))
                .and_then(toml::Value::as_table);

            if let Some(table) = table {
                let table_string = toml::to_string(table)?;
                builder = builder.add_source(File::from_str(&table_string, FileFormat::Toml));
            }
        }

        for name in [".smartextends.toml", "smartextends.toml"] {
            builder = builder.add_source(
                File::from(project_root.join(name).as_std_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let config = builder.build()?;
        let mut settings: Self = config.try_deserialize()?;
        settings.resolve_paths(project_root);
        tracing::debug!(
            "Loaded settings for {} with {} loaders",
            project_root,
            settings.loaders.len()
        );
        Ok(settings)
    }

    /// Make relative loader directories relative to `project_root`.
    fn resolve_paths(&mut self, project_root: &Utf8Path) {
        let absolutize = |path: &mut Utf8PathBuf| {
            if path.is_relative() {
                *path = project_root.join(&*path);
            }
        };

        for loader in &mut self.loaders {
            match loader {
                LoaderSettings::Filesystem { dirs } => dirs.iter_mut().for_each(&absolutize),
                LoaderSettings::AppDirectories { apps } => apps.iter_mut().for_each(&absolutize),
                LoaderSettings::Memory { .. } => {}
            }
        }
    }
}
