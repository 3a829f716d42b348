use smartextends_source::Span;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Block { content: String, span: Span },
    Comment { content: String, span: Span },
    Error { content: String, span: Span },
    Eof,
    Text { content: String, span: Span },
    Variable { content: String, span: Span },
}

impl Token {
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Token::Block { content, .. }
            | Token::Comment { content, .. }
            | Token::Error { content, .. }
            | Token::Text { content, .. }
            | Token::Variable { content, .. } => content,
            Token::Eof => "",
        }
    }

    /// Span of the whole construct, delimiters included.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            Token::Block { span, .. }
            | Token::Comment { span, .. }
            | Token::Error { span, .. }
            | Token::Text { span, .. }
            | Token::Variable { span, .. } => Some(*span),
            Token::Eof => None,
        }
    }

    #[must_use]
    pub fn span_or_fallback(&self) -> Span {
        self.span().unwrap_or_default()
    }
}
