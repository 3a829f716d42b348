use std::sync::Arc;

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use serde_json::Value;
use smartextends_source::Origin;

use crate::context::Context;
use crate::error::TemplateError;
use crate::extends::ExtendsNode;
use crate::loader::TemplateLoader;
use crate::nodelist::BlockNode;
use crate::nodelist::Expression;
use crate::nodelist::FilterKind;
use crate::nodelist::Node;
use crate::nodelist::VariableNode;
use crate::template::Template;

/// Block overrides collected while walking up an inheritance chain.
///
/// Each name maps to its overrides ordered least-derived first, so the last
/// entry is the one a `{% block %}` renders.
#[derive(Debug, Default)]
pub(crate) struct BlockContext {
    blocks: FxHashMap<String, Vec<Arc<BlockNode>>>,
}

impl BlockContext {
    /// Add blocks of a less-derived template than any added so far.
    pub(crate) fn add_blocks(&mut self, blocks: &FxHashMap<String, Arc<BlockNode>>) {
        for (name, block) in blocks {
            self.blocks
                .entry(name.clone())
                .or_default()
                .insert(0, Arc::clone(block));
        }
    }

    pub(crate) fn pop(&mut self, name: &str) -> Option<Arc<BlockNode>> {
        self.blocks.get_mut(name)?.pop()
    }

    pub(crate) fn push(&mut self, name: &str, block: Arc<BlockNode>) {
        self.blocks.entry(name.to_string()).or_default().push(block);
    }

    pub(crate) fn get_block(&self, name: &str) -> Option<&Arc<BlockNode>> {
        self.blocks.get(name)?.last()
    }
}

/// Per-call render state.
pub(crate) struct RenderState<'a> {
    pub(crate) loader: &'a dyn TemplateLoader,
    pub(crate) context: &'a Context,
    blocks: Option<BlockContext>,
    block_stack: Vec<Arc<BlockNode>>,
    visited: FxHashSet<Origin>,
}

impl<'a> RenderState<'a> {
    pub(crate) fn new(loader: &'a dyn TemplateLoader, context: &'a Context) -> Self {
        Self {
            loader,
            context,
            blocks: None,
            block_stack: Vec::new(),
            visited: FxHashSet::default(),
        }
    }

    pub(crate) fn render_template(
        &mut self,
        template: &Template,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        if let Some(origin) = template.origin() {
            self.visit(origin)?;
        }

        match template.extends() {
            Some(extends) => self.render_extends(extends, template, out),
            None => self.render_nodelist(template.nodelist(), out),
        }
    }

    fn visit(&mut self, origin: &Origin) -> Result<(), TemplateError> {
        if self.visited.insert(origin.clone()) {
            Ok(())
        } else {
            Err(TemplateError::syntax(format!(
                "Circular inheritance: '{}' is already part of this render",
                origin.display_name()
            )))
        }
    }

    fn render_extends(
        &mut self,
        extends: &ExtendsNode,
        template: &Template,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        let chain = extends.parent_chain(template, self.context, self.loader)?;

        let blocks = self.blocks.get_or_insert_with(BlockContext::default);
        blocks.add_blocks(template.blocks());
        for intermediate in &chain.collapsed {
            blocks.add_blocks(intermediate.blocks());
        }
        if chain.parent.extends().is_none() {
            blocks.add_blocks(chain.parent.blocks());
        }

        for intermediate in &chain.collapsed {
            if let Some(origin) = intermediate.origin() {
                self.visit(origin)?;
            }
        }

        self.render_template(&chain.parent, out)
    }

    fn render_nodelist(&mut self, nodelist: &[Node], out: &mut String) -> Result<(), TemplateError> {
        for node in nodelist {
            match node {
                Node::Text { content, .. } => out.push_str(content),
                Node::Variable(variable) => self.render_variable(variable, out)?,
                Node::Block(block) => self.render_block(block, out)?,
                Node::Comment { .. } | Node::Extends(_) => {}
            }
        }
        Ok(())
    }

    fn render_block(&mut self, block: &Arc<BlockNode>, out: &mut String) -> Result<(), TemplateError> {
        let Some(blocks) = self.blocks.as_mut() else {
            self.block_stack.push(Arc::clone(block));
            let result = self.render_nodelist(&block.nodelist, out);
            self.block_stack.pop();
            return result;
        };

        let pushed = blocks.pop(&block.name);
        let chosen = pushed.clone().unwrap_or_else(|| Arc::clone(block));

        self.block_stack.push(Arc::clone(&chosen));
        let result = self.render_nodelist(&chosen.nodelist, out);
        self.block_stack.pop();

        if let (Some(pushed), Some(blocks)) = (pushed, self.blocks.as_mut()) {
            blocks.push(&block.name, pushed);
        }
        result
    }

    /// Render the next less-derived override of the block being rendered.
    fn render_super(&mut self) -> Result<String, TemplateError> {
        let Some(current) = self.block_stack.last().cloned() else {
            return Ok(String::new());
        };

        let has_parent = self
            .blocks
            .as_ref()
            .is_some_and(|blocks| blocks.get_block(&current.name).is_some());
        if !has_parent {
            return Ok(String::new());
        }

        let mut rendered = String::new();
        self.render_block(&current, &mut rendered)?;
        Ok(rendered)
    }

    fn render_variable(&mut self, node: &VariableNode, out: &mut String) -> Result<(), TemplateError> {
        let filtered = if node.is_block_super() {
            let rendered = self.render_super()?;
            apply_filters(node, self.context, Some(Value::String(rendered)), true)
        } else {
            let value = self.context.resolve(&node.expression);
            let literal = matches!(node.expression, Expression::Literal(_));
            apply_filters(node, self.context, value, literal)
        };
        let text = to_display(filtered.value.as_ref());

        if filtered.safe {
            out.push_str(&text);
        } else {
            escape_into(&text, out);
        }
        Ok(())
    }
}

pub(crate) struct Filtered {
    pub(crate) value: Option<Value>,
    pub(crate) safe: bool,
}

/// Run the filter pipeline of `node` over `value`.
///
/// `safe` starts out true for template literals, which are never escaped.
pub(crate) fn apply_filters(
    node: &VariableNode,
    context: &Context,
    value: Option<Value>,
    safe: bool,
) -> Filtered {
    node.filters
        .iter()
        .fold(Filtered { value, safe }, |current, filter| match filter.kind {
            FilterKind::Default => {
                if is_truthy(current.value.as_ref()) {
                    current
                } else {
                    let arg = filter.arg.as_ref();
                    Filtered {
                        value: arg.and_then(|arg| context.resolve(arg)),
                        safe: arg.is_some_and(|arg| matches!(arg, Expression::Literal(_))),
                    }
                }
            }
            FilterKind::Lower => Filtered {
                value: current
                    .value
                    .map(|value| Value::String(to_display(Some(&value)).to_lowercase())),
                safe: false,
            },
            FilterKind::Upper => Filtered {
                value: current
                    .value
                    .map(|value| Value::String(to_display(Some(&value)).to_uppercase())),
                safe: false,
            },
            FilterKind::Safe => Filtered {
                value: current.value,
                safe: true,
            },
        })
}

pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Text a value renders as. Missing values render empty.
pub(crate) fn to_display(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::Null) => "None".to_string(),
        Some(Value::Bool(true)) => "True".to_string(),
        Some(Value::Bool(false)) => "False".to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
}
