use std::sync::Arc;

use camino::Utf8PathBuf;
use rustc_hash::FxHashSet;
use smartextends_conf::LoaderSettings;
use smartextends_conf::Settings;
use smartextends_source::FilesystemSource;
use smartextends_source::LoaderChain;
use smartextends_source::MemorySource;
use smartextends_source::Origin;
use smartextends_source::Source;

use crate::cached::CachedLoader;
use crate::context::Context;
use crate::directives::Directives;
use crate::error::TemplateError;
use crate::loader::ChainLoader;
use crate::loader::TemplateLoader;
use crate::template::Compile;
use crate::template::Template;
use crate::template::TemplateCompiler;

const STRING_TEMPLATE_NAME: &str = "<string>";

enum EngineLoader {
    Cached(CachedLoader),
    Uncached(ChainLoader),
}

/// A configured template engine: a fixed source chain, a compiler, and an
/// optional compiled-template cache.
pub struct Engine {
    loader: EngineLoader,
    compiler: Arc<dyn Compile>,
}

impl Engine {
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, TemplateError> {
        let mut builder = Self::builder()
            .cached(settings.cached)
            .overwrite_extends(settings.overwrite_extends);

        for loader in &settings.loaders {
            builder = match loader {
                LoaderSettings::Filesystem { dirs } => {
                    warn_missing_dirs(dirs);
                    builder.source(FilesystemSource::new(dirs.iter().cloned()))
                }
                LoaderSettings::AppDirectories { apps } => {
                    let source = FilesystemSource::app_directories(apps.iter().cloned());
                    warn_missing_dirs(source.dirs());
                    builder.source(source)
                }
                LoaderSettings::Memory { key, templates } => {
                    let source = MemorySource::new(key.clone());
                    for template in templates {
                        source.insert(template.name.clone(), template.content.clone());
                    }
                    builder.source(source)
                }
            };
        }

        builder.build()
    }

    #[must_use]
    pub fn loader(&self) -> &dyn TemplateLoader {
        match &self.loader {
            EngineLoader::Cached(loader) => loader,
            EngineLoader::Uncached(loader) => loader,
        }
    }

    /// The compiled-template cache, when the engine was built with one.
    #[must_use]
    pub fn cache(&self) -> Option<&CachedLoader> {
        match &self.loader {
            EngineLoader::Cached(loader) => Some(loader),
            EngineLoader::Uncached(_) => None,
        }
    }

    #[must_use]
    pub fn chain(&self) -> &LoaderChain {
        self.loader().chain()
    }

    #[must_use]
    pub fn compiler(&self) -> &dyn Compile {
        self.compiler.as_ref()
    }

    pub fn get_template(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        self.loader().get_template(name, None, None)
    }

    /// Load `name` from the first source after the one that produced `skip`.
    pub fn get_template_skipping(
        &self,
        name: &str,
        skip: &Origin,
    ) -> Result<Arc<Template>, TemplateError> {
        self.loader().get_template(name, None, Some(skip))
    }

    /// Raw source text and origin of `name`, without compiling or caching.
    pub fn find_template(
        &self,
        name: &str,
        dirs: Option<&[Utf8PathBuf]>,
        skip: Option<&Origin>,
    ) -> Result<(String, Origin), TemplateError> {
        Ok(self.chain().resolve(name, dirs, skip)?)
    }

    pub fn from_string(&self, content: &str) -> Result<Arc<Template>, TemplateError> {
        self.compiler
            .compile(content, None, STRING_TEMPLATE_NAME)
            .map(Arc::new)
    }

    pub fn render_to_string(&self, name: &str, context: &Context) -> Result<String, TemplateError> {
        self.get_template(name)?.render(self.loader(), context)
    }

    /// Every template `name` inherits from, starting with `name` itself and
    /// ending at the root of the chain.
    pub fn inheritance(
        &self,
        name: &str,
        context: &Context,
    ) -> Result<Vec<Arc<Template>>, TemplateError> {
        let mut current = self.get_template(name)?;
        let mut seen = FxHashSet::default();
        let mut path = Vec::new();

        loop {
            mark_seen(&mut seen, &current)?;
            path.push(Arc::clone(&current));

            let Some(chain) = current.parent_chain(context, self.loader())? else {
                return Ok(path);
            };
            for intermediate in chain.collapsed {
                mark_seen(&mut seen, &intermediate)?;
                path.push(intermediate);
            }
            current = chain.parent;
        }
    }
}

fn mark_seen(seen: &mut FxHashSet<Origin>, template: &Template) -> Result<(), TemplateError> {
    match template.origin() {
        Some(origin) if !seen.insert(origin.clone()) => Err(TemplateError::syntax(format!(
            "Circular inheritance: '{}' is already part of this render",
            origin.display_name()
        ))),
        _ => Ok(()),
    }
}

fn warn_missing_dirs(dirs: &[Utf8PathBuf]) {
    for dir in dirs.iter().filter(|dir| !dir.is_dir()) {
        tracing::warn!("Template directory {} does not exist", dir);
    }
}

pub struct EngineBuilder {
    sources: Vec<Arc<dyn Source>>,
    cached: bool,
    overwrite_extends: bool,
    compiler: Option<Arc<dyn Compile>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            cached: true,
            overwrite_extends: false,
            compiler: None,
        }
    }

    #[must_use]
    pub fn source(self, source: impl Source + 'static) -> Self {
        self.shared_source(Arc::new(source))
    }

    #[must_use]
    pub fn shared_source(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(source);
        self
    }

    #[must_use]
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    /// Compile plain `extends` with same-name semantics too. Ignored when a
    /// custom compiler is supplied.
    #[must_use]
    pub fn overwrite_extends(mut self, overwrite: bool) -> Self {
        self.overwrite_extends = overwrite;
        self
    }

    #[must_use]
    pub fn compiler(mut self, compiler: Arc<dyn Compile>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn build(self) -> Result<Engine, TemplateError> {
        if let Some(source) = self.sources.iter().find(|source| !source.is_usable()) {
            return Err(TemplateError::ImproperlyConfigured(format!(
                "template source '{}' can't be used in this environment",
                source.key()
            )));
        }

        let compiler = self.compiler.unwrap_or_else(|| {
            let directives = if self.overwrite_extends {
                Directives::default().override_extends()
            } else {
                Directives::default()
            };
            Arc::new(TemplateCompiler::new(directives))
        });

        let chain = LoaderChain::new(self.sources);
        tracing::debug!(
            "Building engine with {} sources (cached: {}, overwrite_extends: {})",
            chain.len(),
            self.cached,
            self.overwrite_extends
        );

        let loader = if self.cached {
            EngineLoader::Cached(CachedLoader::new(chain, Arc::clone(&compiler)))
        } else {
            EngineLoader::Uncached(ChainLoader::new(chain, Arc::clone(&compiler)))
        };

        Ok(Engine { loader, compiler })
    }
}
