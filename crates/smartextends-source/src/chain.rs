use std::sync::Arc;

use camino::Utf8PathBuf;

use crate::error::SourceError;
use crate::origin::Origin;
use crate::origin::SourceId;
use crate::source::Source;

#[derive(Debug)]
struct ChainEntry {
    id: SourceId,
    source: Arc<dyn Source>,
}

/// The configured, ordered list of template sources.
///
/// The list is fixed when the chain is built; cloning shares it.
#[derive(Debug, Clone)]
pub struct LoaderChain {
    entries: Arc<[ChainEntry]>,
}

impl Default for LoaderChain {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl LoaderChain {
    #[must_use]
    pub fn new(sources: impl IntoIterator<Item = Arc<dyn Source>>) -> Self {
        let entries: Vec<ChainEntry> = sources
            .into_iter()
            .enumerate()
            .map(|(position, source)| ChainEntry {
                id: SourceId::new(position, source.key()),
                source,
            })
            .collect();

        Self {
            entries: entries.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &SourceId> {
        self.entries.iter().map(|entry| &entry.id)
    }

    /// Chain position of `id`, if it names a source of this chain.
    #[must_use]
    pub fn position_of(&self, id: &SourceId) -> Option<usize> {
        self.entries
            .get(id.position())
            .filter(|entry| entry.id == *id)
            .map(|entry| entry.id.position())
    }

    /// Find the first source that supplies `name`.
    ///
    /// With a `skip` origin, only sources strictly after the one that
    /// produced `skip` are queried.
    pub fn resolve(
        &self,
        name: &str,
        dirs: Option<&[Utf8PathBuf]>,
        skip: Option<&Origin>,
    ) -> Result<(String, Origin), SourceError> {
        if name.is_empty() {
            return Err(SourceError::not_found(name, Vec::new()));
        }

        let start = match skip {
            None => 0,
            Some(origin) => {
                if let Some(position) = self.position_of(origin.source()) {
                    tracing::trace!(
                        "Resolving '{}' after {} ({} sources skipped)",
                        name,
                        origin.source(),
                        position + 1
                    );
                    position + 1
                } else {
                    tracing::warn!(
                        "Skip source {} for '{}' is not part of this chain",
                        origin.source(),
                        name
                    );
                    self.entries.len()
                }
            }
        };

        let mut tried = Vec::new();
        for entry in &self.entries[start..] {
            match entry.source.fetch(name, dirs) {
                Ok(fetched) => {
                    tracing::debug!("Resolved '{}' to {}", name, fetched.display_name);
                    let origin = Origin::new(entry.id.clone(), fetched.display_name, name, dirs);
                    return Ok((fetched.content, origin));
                }
                Err(SourceError::NotFound { tried: attempts, .. }) => tried.extend(attempts),
                Err(err) => return Err(err),
            }
        }

        Err(SourceError::not_found(name, tried))
    }

    /// Every origin in the chain that supplies `name`, in chain order.
    pub fn candidates(
        &self,
        name: &str,
        dirs: Option<&[Utf8PathBuf]>,
    ) -> Result<Vec<Origin>, SourceError> {
        let mut found = Vec::new();
        for entry in &self.entries[..] {
            match entry.source.fetch(name, dirs) {
                Ok(fetched) => found.push(Origin::new(
                    entry.id.clone(),
                    fetched.display_name,
                    name,
                    dirs,
                )),
                Err(SourceError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(found)
    }
}
