//! A small Django-style template engine built around same-name inheritance.
//!
//! Templates are compiled from a [`LoaderChain`](smartextends_source::LoaderChain)
//! of sources. `{% smart_extends "name" %}` works like `{% extends %}`, except
//! that when a template extends a template of its own name the parent is
//! looked up in the sources *after* the one the template came from:
//!
//! ```text
//! project/templates/admin/change_form.html
//!     {% smart_extends "admin/change_form.html" %}
//!     {% block object-tools %}...{% endblock %}
//!
//! vendor/admin/templates/admin/change_form.html   <- the parent
//! ```
//!
//! Compiled templates are memoized by [`CachedLoader`], keyed by name, search
//! directories and the skipped source.

mod cached;
mod context;
mod directives;
mod engine;
mod error;
mod extends;
mod lexer;
mod loader;
mod nodelist;
mod parser;
mod render;
mod template;
mod tokens;

pub use cached::CacheKey;
pub use cached::CachedLoader;
pub use context::Context;
pub use directives::Directives;
pub use directives::ExtendsFlavor;
pub use directives::TagKind;
pub use engine::Engine;
pub use engine::EngineBuilder;
pub use error::TemplateError;
pub use extends::ExtendsNode;
pub use extends::ParentChain;
pub use extends::ParentName;
pub use lexer::Lexer;
pub use loader::ChainLoader;
pub use loader::Loaded;
pub use loader::TemplateLoader;
pub use nodelist::BlockNode;
pub use nodelist::Expression;
pub use nodelist::Filter;
pub use nodelist::FilterKind;
pub use nodelist::Node;
pub use nodelist::VariableNode;
pub use parser::ParsedTemplate;
pub use parser::Parser;
pub use template::Compile;
pub use template::Template;
pub use template::TemplateCompiler;
pub use tokens::Token;
