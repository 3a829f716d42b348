use std::sync::Arc;

use serde_json::Value;
use smartextends_source::Span;

use crate::extends::ExtendsNode;

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Text { content: String, span: Span },
    Variable(VariableNode),
    Block(Arc<BlockNode>),
    /// `{% comment %}...{% endcomment %}`. Renders nothing.
    Comment { span: Span },
    Extends(Arc<ExtendsNode>),
}

impl Node {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Node::Text { span, .. } | Node::Comment { span } => *span,
            Node::Variable(variable) => variable.span,
            Node::Block(block) => block.span,
            Node::Extends(extends) => extends.span(),
        }
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockNode {
    pub name: String,
    pub nodelist: Vec<Node>,
    pub span: Span,
}

/// `{{ expression|filter:arg }}`
#[derive(Clone, Debug, PartialEq)]
pub struct VariableNode {
    pub expression: Expression,
    pub filters: Vec<Filter>,
    /// The raw expression text, as written between the delimiters.
    pub token: String,
    pub span: Span,
}

impl VariableNode {
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.filters
            .iter()
            .any(|filter| filter.kind == FilterKind::Safe)
    }

    #[must_use]
    pub fn is_block_super(&self) -> bool {
        matches!(&self.expression, Expression::Lookup(path) if path == &["block", "super"])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// Dotted lookup, one entry per segment.
    Lookup(Vec<String>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub kind: FilterKind,
    pub arg: Option<Expression>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Default,
    Lower,
    Safe,
    Upper,
}

impl FilterKind {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::Default),
            "lower" => Some(Self::Lower),
            "safe" => Some(Self::Safe),
            "upper" => Some(Self::Upper),
            _ => None,
        }
    }

    #[must_use]
    pub fn takes_arg(self) -> bool {
        matches!(self, Self::Default)
    }
}
