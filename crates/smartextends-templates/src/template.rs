use std::sync::Arc;

use rustc_hash::FxHashMap;
use smartextends_source::Origin;

use crate::context::Context;
use crate::directives::Directives;
use crate::error::TemplateError;
use crate::extends::ExtendsNode;
use crate::extends::ParentChain;
use crate::lexer::Lexer;
use crate::loader::TemplateLoader;
use crate::nodelist::BlockNode;
use crate::nodelist::Node;
use crate::parser::ParsedTemplate;
use crate::parser::Parser;
use crate::render::RenderState;

/// A compiled template.
#[derive(Debug)]
pub struct Template {
    name: String,
    origin: Option<Origin>,
    nodelist: Vec<Node>,
    extends: Option<Arc<ExtendsNode>>,
    blocks: FxHashMap<String, Arc<BlockNode>>,
}

impl Template {
    #[must_use]
    pub fn new(name: impl Into<String>, origin: Option<Origin>, parsed: ParsedTemplate) -> Self {
        Self {
            name: name.into(),
            origin,
            nodelist: parsed.nodelist,
            extends: parsed.extends,
            blocks: parsed.blocks,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the template was loaded from. `None` for templates compiled
    /// from a string.
    #[must_use]
    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    #[must_use]
    pub fn nodelist(&self) -> &[Node] {
        &self.nodelist
    }

    #[must_use]
    pub fn extends(&self) -> Option<&ExtendsNode> {
        self.extends.as_deref()
    }

    #[must_use]
    pub fn blocks(&self) -> &FxHashMap<String, Arc<BlockNode>> {
        &self.blocks
    }

    pub fn render(
        &self,
        loader: &dyn TemplateLoader,
        context: &Context,
    ) -> Result<String, TemplateError> {
        let mut out = String::new();
        RenderState::new(loader, context).render_template(self, &mut out)?;
        Ok(out)
    }

    /// Resolve the parent this template inherits from, if it extends one.
    pub fn parent_chain(
        &self,
        context: &Context,
        loader: &dyn TemplateLoader,
    ) -> Result<Option<ParentChain>, TemplateError> {
        self.extends()
            .map(|extends| extends.parent_chain(self, context, loader))
            .transpose()
    }
}

/// Turns template source into a [`Template`].
pub trait Compile: Send + Sync {
    fn compile(
        &self,
        content: &str,
        origin: Option<Origin>,
        name: &str,
    ) -> Result<Template, TemplateError>;
}

#[derive(Clone, Debug, Default)]
pub struct TemplateCompiler {
    directives: Directives,
}

impl TemplateCompiler {
    #[must_use]
    pub fn new(directives: Directives) -> Self {
        Self { directives }
    }

    #[must_use]
    pub fn directives(&self) -> &Directives {
        &self.directives
    }
}

impl Compile for TemplateCompiler {
    fn compile(
        &self,
        content: &str,
        origin: Option<Origin>,
        name: &str,
    ) -> Result<Template, TemplateError> {
        let tokens = Lexer::new(content).tokenize();
        let parsed = Parser::new(tokens, &self.directives).parse()?;
        tracing::trace!("Compiled '{}' ({} blocks)", name, parsed.blocks.len());
        Ok(Template::new(name, origin, parsed))
    }
}
