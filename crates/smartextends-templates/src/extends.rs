use std::sync::Arc;

use camino::Utf8PathBuf;
use serde_json::Value;
use smartextends_source::Origin;
use smartextends_source::Span;

use crate::context::Context;
use crate::directives::ExtendsFlavor;
use crate::error::TemplateError;
use crate::loader::TemplateLoader;
use crate::nodelist::Expression;
use crate::nodelist::VariableNode;
use crate::render::apply_filters;
use crate::template::Template;

/// How the parent of an `extends`-family tag is named.
#[derive(Clone, Debug, PartialEq)]
pub enum ParentName {
    /// A quoted name, fixed at compile time.
    Literal(String),
    /// Evaluated against the context on every render.
    Expression(VariableNode),
}

/// The parent an [`ExtendsNode`] resolved to, with every same-name template
/// the lookup walked through on the way.
#[derive(Clone, Debug)]
pub struct ParentChain {
    /// Intermediate templates, most derived first. Their blocks still apply.
    pub collapsed: Vec<Arc<Template>>,
    /// The first template whose own directive names a different template, or
    /// that has none.
    pub parent: Arc<Template>,
}

enum ResolvedParent {
    Name(String),
    Template(Arc<Template>),
}

/// A compiled `{% extends %}` or `{% smart_extends %}` tag.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtendsNode {
    flavor: ExtendsFlavor,
    parent: ParentName,
    span: Span,
}

impl ExtendsNode {
    #[must_use]
    pub fn new(flavor: ExtendsFlavor, parent: ParentName, span: Span) -> Self {
        Self {
            flavor,
            parent,
            span,
        }
    }

    #[must_use]
    pub fn flavor(&self) -> ExtendsFlavor {
        self.flavor
    }

    #[must_use]
    pub fn parent(&self) -> &ParentName {
        &self.parent
    }

    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    fn resolve_parent(&self, context: &Context) -> Result<ResolvedParent, TemplateError> {
        match &self.parent {
            ParentName::Literal(name) if name.is_empty() => Err(TemplateError::syntax_at(
                "Invalid template name in 'extends' tag: ''.",
                self.span,
            )),
            ParentName::Literal(name) => Ok(ResolvedParent::Name(name.clone())),
            ParentName::Expression(variable) => {
                if let Expression::Lookup(path) = &variable.expression {
                    if variable.filters.is_empty() {
                        if let Some(template) = context.template(path) {
                            return Ok(ResolvedParent::Template(Arc::clone(template)));
                        }
                    }
                }

                let value = context.resolve(&variable.expression);
                match apply_filters(variable, context, value, false).value {
                    Some(Value::String(name)) if !name.is_empty() => {
                        Ok(ResolvedParent::Name(name))
                    }
                    other => Err(TemplateError::syntax_at(
                        format!(
                            "Invalid template name in 'extends' tag: {}. Got this from the '{}' variable.",
                            name_repr(other.as_ref()),
                            variable.token
                        ),
                        self.span,
                    )),
                }
            }
        }
    }

    /// The origin to skip past when this directive names its own template.
    fn self_extension(
        &self,
        template: &Template,
        context: &Context,
    ) -> Result<Option<Origin>, TemplateError> {
        if self.flavor != ExtendsFlavor::Smart {
            return Ok(None);
        }
        let Some(origin) = template.origin() else {
            return Ok(None);
        };

        match self.resolve_parent(context)? {
            ResolvedParent::Name(name) if name == origin.load_name() => Ok(Some(origin.clone())),
            ResolvedParent::Name(_) | ResolvedParent::Template(_) => Ok(None),
        }
    }

    /// Resolve the template `template` inherits from.
    ///
    /// A smart directive naming its own template looks the parent up after
    /// the source that produced `template`. Same-name parents that do the
    /// same are walked through until a template delegating elsewhere is
    /// reached.
    pub fn parent_chain(
        &self,
        template: &Template,
        context: &Context,
        loader: &dyn TemplateLoader,
    ) -> Result<ParentChain, TemplateError> {
        let name = match self.resolve_parent(context)? {
            ResolvedParent::Template(parent) => {
                return Ok(ParentChain {
                    collapsed: Vec::new(),
                    parent,
                });
            }
            ResolvedParent::Name(name) => name,
        };

        let origin = template.origin();
        let dirs = origin.and_then(Origin::dirs);
        let skip = match origin {
            Some(origin) if self.flavor == ExtendsFlavor::Smart && origin.load_name() == name => {
                Some(origin)
            }
            _ => None,
        };

        let mut parent = load_parent(loader, &name, dirs, skip)?;

        if skip.is_none() && origin.is_some() && parent.origin() == origin {
            return Err(TemplateError::syntax_at(
                format!("Template '{name}' cannot extend itself"),
                self.span,
            ));
        }

        let limit = loader.chain().len();
        let mut collapsed = Vec::new();
        while let Some(next_skip) = parent
            .extends()
            .map(|extends| extends.self_extension(&parent, context))
            .transpose()?
            .flatten()
        {
            if collapsed.len() >= limit {
                return Err(TemplateError::syntax(format!(
                    "Template '{name}' extends itself through more than {limit} sources"
                )));
            }

            let next = load_parent(loader, &name, next_skip.dirs(), Some(&next_skip))?;
            tracing::debug!(
                "Collapsed '{}' from {} to {}",
                name,
                next_skip.source(),
                next.origin()
                    .map_or_else(|| "<string>".to_string(), |origin| origin.source().to_string())
            );
            collapsed.push(std::mem::replace(&mut parent, next));
        }

        Ok(ParentChain { collapsed, parent })
    }
}

fn load_parent(
    loader: &dyn TemplateLoader,
    name: &str,
    dirs: Option<&[Utf8PathBuf]>,
    skip: Option<&Origin>,
) -> Result<Arc<Template>, TemplateError> {
    loader
        .get_template(name, dirs, skip)
        .map_err(|err| match err {
            TemplateError::NotFound { .. } => TemplateError::syntax(format!(
                "Template '{name}' cannot be extended, because it doesn't exist"
            )),
            other => other,
        })
}

fn name_repr(value: Option<&Value>) -> String {
    match value {
        None => "''".to_string(),
        Some(Value::String(text)) => format!("'{text}'"),
        Some(Value::Null) => "None".to_string(),
        Some(Value::Bool(true)) => "True".to_string(),
        Some(Value::Bool(false)) => "False".to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use smartextends_source::MemorySource;

    use super::*;
    use crate::engine::Engine;

    fn engine(sources: Vec<MemorySource>) -> Engine {
        sources
            .into_iter()
            .fold(Engine::builder().cached(false), |builder, source| {
                builder.source(source)
            })
            .build()
            .unwrap()
    }

    fn syntax_message(result: Result<String, TemplateError>) -> String {
        match result {
            Err(TemplateError::Syntax { message, .. }) => message,
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    mod resolve_parent {
        use super::*;

        #[test]
        fn test_empty_literal() {
            let engine = engine(vec![MemorySource::new("db").with_template("a.html", "{% smart_extends '' %}")]);
            assert_eq!(
                syntax_message(engine.render_to_string("a.html", &Context::new())),
                "Invalid template name in 'extends' tag: ''."
            );
        }

        #[test]
        fn test_empty_variable() {
            let engine = engine(vec![MemorySource::new("db").with_template("a.html", "{% smart_extends x %}")]);
            assert_eq!(
                syntax_message(engine.render_to_string("a.html", &Context::new().with("x", ""))),
                "Invalid template name in 'extends' tag: ''. Got this from the 'x' variable."
            );
            assert_eq!(
                syntax_message(engine.render_to_string("a.html", &Context::new())),
                "Invalid template name in 'extends' tag: ''. Got this from the 'x' variable."
            );
            assert_eq!(
                syntax_message(engine.render_to_string("a.html", &Context::new().with("x", Value::Null))),
                "Invalid template name in 'extends' tag: None. Got this from the 'x' variable."
            );
        }

        #[test]
        fn test_variable_names_parent() {
            let engine = engine(vec![MemorySource::new("db")
                .with_template("a.html", "{% smart_extends layout|default:'base.html' %}{% block b %}child{% endblock %}")
                .with_template("base.html", "base[{% block b %}{% endblock %}]")
                .with_template("other.html", "other[{% block b %}{% endblock %}]")]);

            assert_eq!(
                engine.render_to_string("a.html", &Context::new()).unwrap(),
                "base[child]"
            );
            assert_eq!(
                engine
                    .render_to_string("a.html", &Context::new().with("layout", "other.html"))
                    .unwrap(),
                "other[child]"
            );
        }

        #[test]
        fn test_compiled_template_in_context() {
            let engine = engine(vec![MemorySource::new("db").with_template(
                "a.html",
                "{% smart_extends layout %}{% block b %}child{% endblock %}",
            )]);
            let layout = engine.from_string("inline<{% block b %}{% endblock %}>").unwrap();
            let mut context = Context::new();
            context.insert_template("layout", layout);

            assert_eq!(engine.render_to_string("a.html", &context).unwrap(), "inline<child>");
        }
    }

    mod lookup {
        use super::*;

        #[test]
        fn test_missing_parent_is_a_syntax_error() {
            let engine = engine(vec![MemorySource::new("db").with_template("a.html", "{% smart_extends 'nope.html' %}")]);
            assert_eq!(
                syntax_message(engine.render_to_string("a.html", &Context::new())),
                "Template 'nope.html' cannot be extended, because it doesn't exist"
            );
        }

        #[test]
        fn test_self_extension_without_later_source() {
            let engine = engine(vec![
                MemorySource::new("fs").with_template("page.html", "{% smart_extends 'page.html' %}"),
                MemorySource::new("db"),
            ]);
            assert_eq!(
                syntax_message(engine.render_to_string("page.html", &Context::new())),
                "Template 'page.html' cannot be extended, because it doesn't exist"
            );
        }

        #[test]
        fn test_standard_extends_of_itself() {
            let engine = engine(vec![
                MemorySource::new("fs").with_template("page.html", "{% extends 'page.html' %}"),
                MemorySource::new("db").with_template("page.html", "db"),
            ]);
            assert_eq!(
                syntax_message(engine.render_to_string("page.html", &Context::new())),
                "Template 'page.html' cannot extend itself"
            );
        }

        #[test]
        fn test_circular_inheritance() {
            let engine = engine(vec![MemorySource::new("db")
                .with_template("a.html", "{% extends 'b.html' %}")
                .with_template("b.html", "{% extends 'a.html' %}")]);
            let message = syntax_message(engine.render_to_string("a.html", &Context::new()));
            assert!(message.starts_with("Circular inheritance"), "{message}");
        }
    }

    mod collapse {
        use super::*;

        fn same_name_chain(count: usize, last: &str) -> Engine {
            let sources = (0..count)
                .map(|index| {
                    let content = if index + 1 == count {
                        last.to_string()
                    } else {
                        format!("{{% smart_extends 'page.html' %}}{{% block s{index} %}}{index}{{% endblock %}}")
                    };
                    MemorySource::new(format!("s{index}")).with_template("page.html", content)
                })
                .collect();
            engine(sources)
        }

        #[test]
        fn test_chain_takes_n_minus_one_hops() {
            let engine = same_name_chain(4, "root");
            let template = engine.get_template("page.html").unwrap();
            let chain = template
                .parent_chain(&Context::new(), engine.loader())
                .unwrap()
                .unwrap();

            assert_eq!(chain.collapsed.len(), 2);
            assert_eq!(chain.parent.origin().unwrap().source().position(), 3);
            let positions: Vec<usize> = chain
                .collapsed
                .iter()
                .map(|t| t.origin().unwrap().source().position())
                .collect();
            assert_eq!(positions, vec![1, 2]);
        }

        #[test]
        fn test_chain_stops_at_different_name() {
            let engine = engine(vec![
                MemorySource::new("s0").with_template("page.html", "{% smart_extends 'page.html' %}"),
                MemorySource::new("s1").with_template("page.html", "{% smart_extends 'base.html' %}"),
                MemorySource::new("s2")
                    .with_template("page.html", "unreachable")
                    .with_template("base.html", "base"),
            ]);
            let template = engine.get_template("page.html").unwrap();
            let chain = template
                .parent_chain(&Context::new(), engine.loader())
                .unwrap()
                .unwrap();

            assert!(chain.collapsed.is_empty());
            assert_eq!(chain.parent.origin().unwrap().source().position(), 1);
            assert_eq!(
                engine.render_to_string("page.html", &Context::new()).unwrap(),
                "base"
            );
        }

        #[test]
        fn test_intermediate_blocks_still_apply() {
            let engine = same_name_chain(
                3,
                "{% block s0 %}-{% endblock %}{% block s1 %}-{% endblock %}{% block s2 %}root{% endblock %}",
            );
            assert_eq!(
                engine.render_to_string("page.html", &Context::new()).unwrap(),
                "01root"
            );
        }
    }
}
