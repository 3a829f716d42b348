use std::sync::Arc;

use camino::Utf8PathBuf;
use smartextends_source::LoaderChain;
use smartextends_source::Origin;

use crate::error::TemplateError;
use crate::template::Compile;
use crate::template::Template;

/// Result of a single template lookup.
#[derive(Debug)]
pub enum Loaded {
    /// Served from a cache. The template still carries its origin.
    Hit(Arc<Template>),
    /// Freshly resolved and compiled.
    Compiled(Arc<Template>, Origin),
    /// The source was found but compiling it reported a missing template.
    /// The caller compiles it again to surface the real error.
    Source { content: String, origin: Origin },
}

/// Looks templates up by name through a [`LoaderChain`].
pub trait TemplateLoader: Send + Sync {
    fn load(
        &self,
        name: &str,
        dirs: Option<&[Utf8PathBuf]>,
        skip: Option<&Origin>,
    ) -> Result<Loaded, TemplateError>;

    fn chain(&self) -> &LoaderChain;

    fn compiler(&self) -> &dyn Compile;

    fn get_template(
        &self,
        name: &str,
        dirs: Option<&[Utf8PathBuf]>,
        skip: Option<&Origin>,
    ) -> Result<Arc<Template>, TemplateError> {
        match self.load(name, dirs, skip)? {
            Loaded::Hit(template) | Loaded::Compiled(template, _) => Ok(template),
            Loaded::Source { content, origin } => self
                .compiler()
                .compile(&content, Some(origin), name)
                .map(Arc::new),
        }
    }
}

/// Resolves and compiles on every lookup.
pub struct ChainLoader {
    chain: LoaderChain,
    compiler: Arc<dyn Compile>,
}

impl ChainLoader {
    #[must_use]
    pub fn new(chain: LoaderChain, compiler: Arc<dyn Compile>) -> Self {
        Self { chain, compiler }
    }
}

impl TemplateLoader for ChainLoader {
    fn load(
        &self,
        name: &str,
        dirs: Option<&[Utf8PathBuf]>,
        skip: Option<&Origin>,
    ) -> Result<Loaded, TemplateError> {
        let (content, origin) = self.chain.resolve(name, dirs, skip)?;
        let template = self.compiler.compile(&content, Some(origin.clone()), name)?;
        Ok(Loaded::Compiled(Arc::new(template), origin))
    }

    fn chain(&self) -> &LoaderChain {
        &self.chain
    }

    fn compiler(&self) -> &dyn Compile {
        self.compiler.as_ref()
    }
}
