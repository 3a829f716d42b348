use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// No source supplied the template. `tried` lists every candidate that
    /// was attempted, in chain order.
    #[error("template '{name}' does not exist")]
    NotFound { name: String, tried: Vec<String> },

    #[error("failed to read template '{name}' from {path}")]
    Io {
        name: String,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    pub(crate) fn not_found(name: &str, tried: Vec<String>) -> Self {
        Self::NotFound {
            name: name.to_string(),
            tried,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
