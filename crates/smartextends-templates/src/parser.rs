use std::sync::Arc;

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use serde_json::Number;
use serde_json::Value;
use smartextends_source::Span;

use crate::directives::Directives;
use crate::directives::ExtendsFlavor;
use crate::directives::TagKind;
use crate::error::TemplateError;
use crate::extends::ExtendsNode;
use crate::extends::ParentName;
use crate::nodelist::BlockNode;
use crate::nodelist::Expression;
use crate::nodelist::Filter;
use crate::nodelist::FilterKind;
use crate::nodelist::Node;
use crate::nodelist::VariableNode;
use crate::tokens::Token;

/// Output of a successful parse.
#[derive(Debug, Default)]
pub struct ParsedTemplate {
    pub nodelist: Vec<Node>,
    pub extends: Option<Arc<ExtendsNode>>,
    /// Every block in the template, nested ones included.
    pub blocks: FxHashMap<String, Arc<BlockNode>>,
}

/// The tag that closed a nested node list.
struct EndTag {
    bits: Vec<String>,
    span: Span,
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    directives: &'a Directives,
    loaded_blocks: FxHashSet<String>,
    blocks: FxHashMap<String, Arc<BlockNode>>,
    extends: Option<Arc<ExtendsNode>>,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(tokens: Vec<Token>, directives: &'a Directives) -> Self {
        Self {
            tokens,
            current: 0,
            directives,
            loaded_blocks: FxHashSet::default(),
            blocks: FxHashMap::default(),
            extends: None,
        }
    }

    pub fn parse(mut self) -> Result<ParsedTemplate, TemplateError> {
        let (nodelist, _) = self.parse_nodelist(None)?;

        Ok(ParsedTemplate {
            nodelist,
            extends: self.extends,
            blocks: self.blocks,
        })
    }

    fn parse_nodelist(
        &mut self,
        until: Option<TagKind>,
    ) -> Result<(Vec<Node>, Option<EndTag>), TemplateError> {
        let mut nodelist = Vec::new();
        let mut contains_nontext = false;

        loop {
            match self.consume() {
                Token::Eof => {
                    return match until {
                        None => Ok((nodelist, None)),
                        Some(_) => Err(TemplateError::syntax(
                            "Unclosed tag 'block'. Looking for one of: endblock.",
                        )),
                    };
                }
                Token::Text { content, span } => nodelist.push(Node::Text { content, span }),
                Token::Comment { .. } => {}
                Token::Error { span, .. } => {
                    return Err(TemplateError::syntax_at(
                        format!("Unclosed template construct at position {}", span.start),
                        span,
                    ));
                }
                Token::Variable { content, span } => {
                    nodelist.push(Node::Variable(parse_variable(&content, span)?));
                    contains_nontext = true;
                }
                Token::Block { content, span } => {
                    let bits = split_contents(&content);
                    let Some(command) = bits.first() else {
                        return Err(TemplateError::syntax_at("Empty block tag", span));
                    };

                    let node = match self.directives.lookup(command) {
                        Some(kind) if until == Some(kind) => {
                            return Ok((nodelist, Some(EndTag { bits, span })));
                        }
                        Some(TagKind::Block) => self.parse_block(&bits, span)?,
                        Some(TagKind::Comment) => self.parse_comment(span)?,
                        Some(TagKind::Extends(flavor)) => {
                            let first = until.is_none() && !contains_nontext;
                            self.parse_extends(&bits, span, flavor, first)?
                        }
                        Some(TagKind::EndBlock | TagKind::EndComment) | None => {
                            let message = match until {
                                Some(_) => {
                                    format!("Invalid block tag: '{command}', expected 'endblock'")
                                }
                                None => format!("Invalid block tag: '{command}'"),
                            };
                            return Err(TemplateError::syntax_at(message, span));
                        }
                    };

                    nodelist.push(node);
                    contains_nontext = true;
                }
            }
        }
    }

    fn parse_block(&mut self, bits: &[String], span: Span) -> Result<Node, TemplateError> {
        let [_, name] = bits else {
            return Err(TemplateError::syntax_at(
                "'block' tag takes only one argument",
                span,
            ));
        };

        if !self.loaded_blocks.insert(name.clone()) {
            return Err(TemplateError::syntax_at(
                format!("'block' tag with name '{name}' appears more than once"),
                span,
            ));
        }

        let (nodelist, end) = self.parse_nodelist(Some(TagKind::EndBlock))?;
        let end_span = match end {
            Some(EndTag { bits, span: end_span }) => {
                if let Some(end_name) = bits.get(1) {
                    if end_name != name {
                        return Err(TemplateError::syntax_at(
                            format!(
                                "'endblock' tag with name '{end_name}' does not match 'block' tag with name '{name}'"
                            ),
                            end_span,
                        ));
                    }
                }
                end_span
            }
            None => span,
        };

        let block = Arc::new(BlockNode {
            name: name.clone(),
            nodelist,
            span: Span::new(span.start, end_span.end().saturating_sub(span.start)),
        });
        self.blocks.insert(name.clone(), Arc::clone(&block));

        Ok(Node::Block(block))
    }

    /// Skip everything up to the matching `endcomment`, unparsed.
    fn parse_comment(&mut self, span: Span) -> Result<Node, TemplateError> {
        loop {
            match self.consume() {
                Token::Eof => {
                    return Err(TemplateError::syntax_at(
                        "Unclosed tag 'comment'. Looking for one of: endcomment.",
                        span,
                    ));
                }
                Token::Block { content, span: end_span }
                    if content.split_whitespace().next() == Some("endcomment") =>
                {
                    return Ok(Node::Comment {
                        span: Span::new(span.start, end_span.end().saturating_sub(span.start)),
                    });
                }
                _ => {}
            }
        }
    }

    fn parse_extends(
        &mut self,
        bits: &[String],
        span: Span,
        flavor: ExtendsFlavor,
        first: bool,
    ) -> Result<Node, TemplateError> {
        let tag = &bits[0];

        let [_, argument] = bits else {
            return Err(TemplateError::syntax_at(
                format!("'{tag}' takes one argument"),
                span,
            ));
        };

        if self.extends.is_some() {
            return Err(TemplateError::syntax_at(
                format!("'{tag}' cannot appear more than once in the same template"),
                span,
            ));
        }

        if !first {
            return Err(TemplateError::syntax_at(
                format!("'{tag}' must be the first tag in the template"),
                span,
            ));
        }

        let parent = match unquote(argument) {
            Some(literal) => ParentName::Literal(literal),
            None => ParentName::Expression(parse_variable(argument, span)?),
        };

        let node = Arc::new(ExtendsNode::new(flavor, parent, span));
        self.extends = Some(Arc::clone(&node));

        Ok(Node::Extends(node))
    }

    fn consume(&mut self) -> Token {
        match self.tokens.get(self.current) {
            Some(token) => {
                self.current += 1;
                token.clone()
            }
            None => Token::Eof,
        }
    }
}

/// Split tag content on whitespace, keeping quoted strings together.
pub(crate) fn split_contents(content: &str) -> Vec<String> {
    let mut pieces = Vec::with_capacity((content.len() / 8).clamp(2, 8));
    let mut start = None;
    let mut quote: Option<char> = None;
    let mut escape = false;
    for (idx, ch) in content.char_indices() {
        if start.is_none() && !ch.is_whitespace() {
            start = Some(idx);
        }
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if quote.is_some() => escape = true,
            '"' | '\'' if quote == Some(ch) => quote = None,
            '"' | '\'' if quote.is_none() => quote = Some(ch),
            c if quote.is_none() && c.is_whitespace() => {
                if let Some(s) = start.take() {
                    pieces.push(content[s..idx].to_owned());
                }
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        pieces.push(content[s..].to_owned());
    }
    pieces
}

/// Byte offset of the first `needle` outside of quotes.
///
/// A backslash inside quotes escapes the following character.
fn find_unquoted(content: &str, needle: u8) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut quote: Option<u8> = None;
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];
        match quote {
            Some(_) if b == b'\\' => pos += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == needle => return Some(pos),
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None => {}
        }
        pos += 1;
    }

    None
}

/// Parse a variable expression like `value|default:'nothing'|upper`.
pub(crate) fn parse_variable(content: &str, span: Span) -> Result<VariableNode, TemplateError> {
    let mut pieces = Vec::new();
    let mut rest = content;
    while let Some(pos) = find_unquoted(rest, b'|') {
        pieces.push(&rest[..pos]);
        rest = &rest[pos + 1..];
    }
    pieces.push(rest);

    let mut pieces = pieces.into_iter();
    let head = pieces.next().unwrap_or_default().trim();
    if head.is_empty() {
        return Err(TemplateError::syntax_at("Empty variable tag", span));
    }

    let expression = parse_expression(head, span)?;
    let filters = pieces
        .map(|piece| parse_filter(piece.trim(), content, span))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(VariableNode {
        expression,
        filters,
        token: content.trim().to_string(),
        span,
    })
}

fn parse_filter(piece: &str, content: &str, span: Span) -> Result<Filter, TemplateError> {
    if piece.is_empty() {
        return Err(TemplateError::syntax_at(
            format!("Could not parse the remainder: '{}'", content.trim()),
            span,
        ));
    }

    let (name, arg) = match find_unquoted(piece, b':') {
        Some(pos) => (piece[..pos].trim(), Some(piece[pos + 1..].trim())),
        None => (piece, None),
    };

    let Some(kind) = FilterKind::from_name(name) else {
        return Err(TemplateError::syntax_at(
            format!("Invalid filter: '{name}'"),
            span,
        ));
    };

    let arg = match (kind.takes_arg(), arg) {
        (true, Some(arg)) if !arg.is_empty() => Some(parse_expression(arg, span)?),
        (false, None) => None,
        (true, _) => {
            return Err(TemplateError::syntax_at(
                format!("{name} requires 2 arguments, 1 provided"),
                span,
            ));
        }
        (false, Some(_)) => {
            return Err(TemplateError::syntax_at(
                format!("{name} requires 1 arguments, 2 provided"),
                span,
            ));
        }
    };

    Ok(Filter { kind, arg })
}

fn parse_expression(text: &str, span: Span) -> Result<Expression, TemplateError> {
    if let Some(literal) = unquote(text) {
        return Ok(Expression::Literal(Value::String(literal)));
    }

    match text {
        "True" => return Ok(Expression::Literal(Value::Bool(true))),
        "False" => return Ok(Expression::Literal(Value::Bool(false))),
        "None" => return Ok(Expression::Literal(Value::Null)),
        _ => {}
    }

    if let Ok(int) = text.parse::<i64>() {
        return Ok(Expression::Literal(Value::from(int)));
    }
    if let Some(number) = text.parse::<f64>().ok().and_then(Number::from_f64) {
        return Ok(Expression::Literal(Value::Number(number)));
    }

    let segments: Vec<String> = text.split('.').map(str::to_string).collect();
    for segment in &segments {
        if segment.starts_with('_') {
            return Err(TemplateError::syntax_at(
                format!("Variables and attributes may not begin with underscores: '{text}'"),
                span,
            ));
        }
        if segment.is_empty()
            || !segment
                .chars()
                .all(|ch| ch.is_alphanumeric() || ch == '_')
        {
            return Err(TemplateError::syntax_at(
                format!("Could not parse the remainder: '{text}'"),
                span,
            ));
        }
    }

    Ok(Expression::Lookup(segments))
}

/// The contents of a string literal quoted with matching `"` or `'`.
fn unquote(text: &str) -> Option<String> {
    let mut chars = text.chars();
    let first = chars.next()?;
    let last = chars.next_back()?;
    if !matches!(first, '"' | '\'') || first != last {
        return None;
    }

    let inner = &text[1..text.len() - 1];
    let mut literal = String::with_capacity(inner.len());
    let mut escaped = false;
    for ch in inner.chars() {
        if escaped {
            literal.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            literal.push(ch);
        }
    }
    Some(literal)
}
