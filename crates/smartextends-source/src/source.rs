use std::fmt;
use std::io;
use std::sync::Arc;

use camino::Utf8PathBuf;
use dashmap::DashMap;

use crate::error::SourceError;
use crate::path::safe_join;
use crate::system::FileSystem;
use crate::system::OsFileSystem;

/// Raw template text as produced by a [`Source`], before compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedTemplate {
    pub content: String,
    pub display_name: String,
}

/// A provider of template text by logical name.
///
/// Implementations must be cheap to query repeatedly: the loader chain calls
/// [`Source::fetch`] on every uncached lookup.
pub trait Source: Send + Sync + fmt::Debug {
    /// Stable key naming the kind of source (`filesystem`, `app_directories`, ...).
    fn key(&self) -> &str;

    /// Fetch `name`. `dirs`, when given, replaces the directories a
    /// directory-backed source would normally search.
    fn fetch(&self, name: &str, dirs: Option<&[Utf8PathBuf]>)
        -> Result<FetchedTemplate, SourceError>;

    /// Whether this source can work in the current environment. Checked once
    /// when the engine is built.
    fn is_usable(&self) -> bool {
        true
    }
}

/// Looks templates up under a list of directories.
pub struct FilesystemSource {
    key: &'static str,
    dirs: Vec<Utf8PathBuf>,
    fs: Arc<dyn FileSystem>,
}

impl FilesystemSource {
    pub const KEY: &'static str = "filesystem";
    pub const APP_DIRECTORIES_KEY: &'static str = "app_directories";

    #[must_use]
    pub fn new(dirs: impl IntoIterator<Item = Utf8PathBuf>) -> Self {
        Self {
            key: Self::KEY,
            dirs: dirs.into_iter().collect(),
            fs: Arc::new(OsFileSystem),
        }
    }

    /// Search the `templates` directory of each application root.
    #[must_use]
    pub fn app_directories(apps: impl IntoIterator<Item = Utf8PathBuf>) -> Self {
        Self {
            key: Self::APP_DIRECTORIES_KEY,
            dirs: apps.into_iter().map(|app| app.join("templates")).collect(),
            fs: Arc::new(OsFileSystem),
        }
    }

    #[must_use]
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    #[must_use]
    pub fn dirs(&self) -> &[Utf8PathBuf] {
        &self.dirs
    }
}

impl fmt::Debug for FilesystemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilesystemSource")
            .field("key", &self.key)
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

impl Source for FilesystemSource {
    fn key(&self) -> &str {
        self.key
    }

    fn fetch(
        &self,
        name: &str,
        dirs: Option<&[Utf8PathBuf]>,
    ) -> Result<FetchedTemplate, SourceError> {
        let search_dirs = dirs.unwrap_or(self.dirs.as_slice());
        let mut tried = Vec::with_capacity(search_dirs.len());

        for dir in search_dirs {
            let Ok(path) = safe_join(dir, name) else {
                tracing::trace!("Skipping '{}': resolves outside {}", name, dir);
                continue;
            };

            if !self.fs.exists(&path) {
                tried.push(path.to_string());
                continue;
            }

            match self.fs.read_to_string(&path) {
                Ok(content) => {
                    return Ok(FetchedTemplate {
                        content,
                        display_name: path.to_string(),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    tried.push(path.to_string());
                }
                Err(source) => {
                    return Err(SourceError::Io {
                        name: name.to_string(),
                        path,
                        source,
                    });
                }
            }
        }

        Err(SourceError::not_found(name, tried))
    }
}

/// Concurrent in-memory template table.
///
/// Stands in for sources backed by a database table: templates can be added
/// or replaced while the chain is in use.
#[derive(Debug)]
pub struct MemorySource {
    key: String,
    templates: DashMap<String, String>,
}

impl MemorySource {
    pub const KEY: &'static str = "memory";

    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            templates: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_template(self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&self, name: impl Into<String>, content: impl Into<String>) {
        self.templates.insert(name.into(), content.into());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.templates.remove(name).map(|(_, content)| content)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new(Self::KEY)
    }
}

impl Source for MemorySource {
    fn key(&self) -> &str {
        &self.key
    }

    fn fetch(
        &self,
        name: &str,
        _dirs: Option<&[Utf8PathBuf]>,
    ) -> Result<FetchedTemplate, SourceError> {
        let display_name = format!("{}:{}", self.key, name);
        match self.templates.get(name) {
            Some(content) => Ok(FetchedTemplate {
                content: content.value().clone(),
                display_name,
            }),
            None => Err(SourceError::not_found(name, vec![display_name])),
        }
    }
}
