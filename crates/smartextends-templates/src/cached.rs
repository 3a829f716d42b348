use std::sync::Arc;

use camino::Utf8PathBuf;
use dashmap::DashMap;
use sha2::Digest;
use sha2::Sha256;
use smartextends_source::LoaderChain;
use smartextends_source::Origin;
use smartextends_source::SourceId;

use crate::error::TemplateError;
use crate::loader::Loaded;
use crate::loader::TemplateLoader;
use crate::template::Compile;
use crate::template::Template;

/// Identity of a cached compilation.
///
/// Lookups that skip different sources resolve to different templates, so
/// the skipped source is part of the key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: String,
    dirs_hash: Option<String>,
    skip: Option<SourceId>,
}

impl CacheKey {
    #[must_use]
    pub fn new(name: &str, dirs: Option<&[Utf8PathBuf]>, skip: Option<&Origin>) -> Self {
        let dirs_hash = dirs.filter(|dirs| !dirs.is_empty()).map(|dirs| {
            let joined = dirs
                .iter()
                .map(|dir| dir.as_str())
                .collect::<Vec<_>>()
                .join("|");
            let mut hasher = Sha256::new();
            hasher.update(joined.as_bytes());
            format!("{:x}", hasher.finalize())
        });

        Self {
            name: name.to_string(),
            dirs_hash,
            skip: skip.map(|origin| origin.source().clone()),
        }
    }

    #[must_use]
    pub fn skip(&self) -> Option<&SourceId> {
        self.skip.as_ref()
    }
}

/// Memoizes compiled templates in front of a [`LoaderChain`].
///
/// Entries are never invalidated by the loader itself. Use
/// [`CachedLoader::reset`] when templates change underneath it.
pub struct CachedLoader {
    chain: LoaderChain,
    compiler: Arc<dyn Compile>,
    cache: DashMap<CacheKey, Arc<Template>>,
}

impl CachedLoader {
    #[must_use]
    pub fn new(chain: LoaderChain, compiler: Arc<dyn Compile>) -> Self {
        Self {
            chain,
            compiler,
            cache: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key)
    }

    pub fn reset(&self) {
        tracing::debug!("Clearing {} cached templates", self.cache.len());
        self.cache.clear();
    }
}

impl TemplateLoader for CachedLoader {
    fn load(
        &self,
        name: &str,
        dirs: Option<&[Utf8PathBuf]>,
        skip: Option<&Origin>,
    ) -> Result<Loaded, TemplateError> {
        let key = CacheKey::new(name, dirs, skip);

        if let Some(template) = self.cache.get(&key) {
            tracing::debug!("Template cache hit for '{}'", name);
            return Ok(Loaded::Hit(Arc::clone(template.value())));
        }

        tracing::debug!("Template cache miss for '{}'", name);
        let (content, origin) = self.chain.resolve(name, dirs, skip)?;

        match self.compiler.compile(&content, Some(origin.clone()), name) {
            Ok(template) => {
                let template = Arc::new(template);
                self.cache.insert(key, Arc::clone(&template));
                Ok(Loaded::Compiled(template, origin))
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!("Compiling '{}' hit a missing template: {}", name, err);
                Ok(Loaded::Source { content, origin })
            }
            Err(err) => Err(err),
        }
    }

    fn chain(&self) -> &LoaderChain {
        &self.chain
    }

    fn compiler(&self) -> &dyn Compile {
        self.compiler.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use smartextends_source::MemorySource;
    use smartextends_source::Source;

    use super::*;
    use crate::template::TemplateCompiler;

    fn chain(sources: Vec<MemorySource>) -> LoaderChain {
        LoaderChain::new(
            sources
                .into_iter()
                .map(|source| Arc::new(source) as Arc<dyn Source>),
        )
    }

    fn loader(sources: Vec<MemorySource>) -> CachedLoader {
        CachedLoader::new(chain(sources), Arc::new(TemplateCompiler::default()))
    }

    /// Fails every compilation with a missing-template error.
    struct MissingDependencyCompiler {
        calls: AtomicUsize,
    }

    impl Compile for MissingDependencyCompiler {
        fn compile(
            &self,
            _content: &str,
            _origin: Option<Origin>,
            _name: &str,
        ) -> Result<Template, TemplateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TemplateError::NotFound {
                name: "included.html".to_string(),
                tried: Vec::new(),
            })
        }
    }

    mod keys {
        use super::*;

        #[test]
        fn test_dirs_hash_is_sha256_of_joined_dirs() {
            let dirs = [Utf8PathBuf::from("/a"), Utf8PathBuf::from("/b")];
            let key = CacheKey::new("x.html", Some(&dirs), None);
            let mut hasher = Sha256::new();
            hasher.update(b"/a|/b");
            assert_eq!(key.dirs_hash, Some(format!("{:x}", hasher.finalize())));

            assert_eq!(CacheKey::new("x.html", Some(&[]), None).dirs_hash, None);
            assert_eq!(CacheKey::new("x.html", None, None).dirs_hash, None);
        }

        #[test]
        fn test_skip_distinguishes_keys() {
            let a = Origin::new(SourceId::new(0, "fs"), "fs:x", "x.html", None);
            let b = Origin::new(SourceId::new(1, "db"), "db:x", "x.html", None);

            let plain = CacheKey::new("x.html", None, None);
            let skip_a = CacheKey::new("x.html", None, Some(&a));
            let skip_b = CacheKey::new("x.html", None, Some(&b));
            assert_ne!(plain, skip_a);
            assert_ne!(skip_a, skip_b);
            assert_eq!(skip_a.skip(), Some(&SourceId::new(0, "fs")));
        }

        #[test]
        fn test_skip_key_ignores_display_name() {
            let a = Origin::new(SourceId::new(0, "fs"), "/one/x.html", "x.html", None);
            let b = Origin::new(SourceId::new(0, "fs"), "/two/x.html", "x.html", None);
            assert_eq!(
                CacheKey::new("x.html", None, Some(&a)),
                CacheKey::new("x.html", None, Some(&b))
            );
        }
    }

    mod lookups {
        use super::*;

        #[test]
        fn test_second_lookup_is_a_hit() {
            let loader = loader(vec![MemorySource::new("db").with_template("a.html", "a")]);

            let Loaded::Compiled(first, origin) = loader.load("a.html", None, None).unwrap() else {
                panic!("expected a compiled template");
            };
            assert_eq!(origin.display_name(), "db:a.html");

            let Loaded::Hit(second) = loader.load("a.html", None, None).unwrap() else {
                panic!("expected a cache hit");
            };
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(second.origin(), Some(&origin));
            assert_eq!(loader.len(), 1);
        }

        #[test]
        fn test_skipped_lookups_are_cached_separately() {
            let loader = loader(vec![
                MemorySource::new("fs1").with_template("page.html", "fs1"),
                MemorySource::new("fs2").with_template("page.html", "fs2"),
                MemorySource::new("db").with_template("page.html", "db"),
            ]);

            let first = loader.get_template("page.html", None, None).unwrap();
            let second = loader
                .get_template("page.html", None, first.origin())
                .unwrap();
            let third = loader
                .get_template("page.html", None, second.origin())
                .unwrap();

            assert_eq!(loader.len(), 3);
            assert_eq!(second.origin().unwrap().source().key(), "fs2");
            assert_eq!(third.origin().unwrap().source().key(), "db");

            let again = loader
                .get_template("page.html", None, first.origin())
                .unwrap();
            assert!(Arc::ptr_eq(&second, &again));
            assert!(loader.contains(&CacheKey::new("page.html", None, second.origin())));
        }

        #[test]
        fn test_missing_template_is_not_cached() {
            let loader = loader(vec![MemorySource::new("db")]);
            assert!(loader.load("nope.html", None, None).unwrap_err().is_not_found());
            assert!(loader.is_empty());
        }

        #[test]
        fn test_syntax_errors_propagate_uncached() {
            let loader = loader(vec![MemorySource::new("db").with_template("bad.html", "{% nope %}")]);
            let err = loader.load("bad.html", None, None).unwrap_err();
            assert_eq!(err.diagnostic_code(), "T100");
            assert!(loader.is_empty());
        }

        #[test]
        fn test_compile_not_found_passes_source_through() {
            let compiler = Arc::new(MissingDependencyCompiler {
                calls: AtomicUsize::new(0),
            });
            let loader = CachedLoader::new(
                chain(vec![MemorySource::new("db").with_template("a.html", "raw body")]),
                Arc::clone(&compiler) as Arc<dyn Compile>,
            );

            let Loaded::Source { content, origin } = loader.load("a.html", None, None).unwrap()
            else {
                panic!("expected the raw source");
            };
            assert_eq!(content, "raw body");
            assert_eq!(origin.display_name(), "db:a.html");
            assert!(loader.is_empty());

            let err = loader.get_template("a.html", None, None).unwrap_err();
            assert_eq!(
                err,
                TemplateError::NotFound {
                    name: "included.html".to_string(),
                    tried: Vec::new(),
                }
            );
            assert_eq!(compiler.calls.load(Ordering::SeqCst), 3);
        }

        #[test]
        fn test_reset_clears_entries() {
            let source = Arc::new(MemorySource::new("db").with_template("a.html", "old"));
            let loader = CachedLoader::new(
                LoaderChain::new([Arc::clone(&source) as Arc<dyn Source>]),
                Arc::new(TemplateCompiler::default()),
            );
            let context = crate::context::Context::new();

            let before = loader.get_template("a.html", None, None).unwrap();
            source.insert("a.html", "new");
            let stale = loader.get_template("a.html", None, None).unwrap();
            assert_eq!(stale.render(&loader, &context).unwrap(), "old");

            loader.reset();
            assert!(loader.is_empty());
            let fresh = loader.get_template("a.html", None, None).unwrap();
            assert!(!Arc::ptr_eq(&before, &fresh));
            assert_eq!(fresh.render(&loader, &context).unwrap(), "new");
        }
    }
}
