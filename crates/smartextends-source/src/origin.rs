use std::fmt;

use camino::Utf8PathBuf;

/// Configuration-time identity of a source in a [`LoaderChain`](crate::LoaderChain).
///
/// Two ids are equal only when both the chain position and the source key
/// match, so an id taken from one chain never matches a different source that
/// happens to sit at the same position in another chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceId {
    position: usize,
    key: String,
}

impl SourceId {
    #[must_use]
    pub fn new(position: usize, key: impl Into<String>) -> Self {
        Self {
            position,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.key, self.position)
    }
}

/// Where a template came from: the source that produced it, its display name
/// (usually a path), and the logical name it was requested under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin {
    source: SourceId,
    display_name: String,
    load_name: String,
    dirs: Option<Vec<Utf8PathBuf>>,
}

impl Origin {
    #[must_use]
    pub fn new(
        source: SourceId,
        display_name: impl Into<String>,
        load_name: impl Into<String>,
        dirs: Option<&[Utf8PathBuf]>,
    ) -> Self {
        Self {
            source,
            display_name: display_name.into(),
            load_name: load_name.into(),
            dirs: dirs.map(<[Utf8PathBuf]>::to_vec),
        }
    }

    #[must_use]
    pub fn source(&self) -> &SourceId {
        &self.source
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn load_name(&self) -> &str {
        &self.load_name
    }

    #[must_use]
    pub fn dirs(&self) -> Option<&[Utf8PathBuf]> {
        self.dirs.as_deref()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.source)
    }
}
