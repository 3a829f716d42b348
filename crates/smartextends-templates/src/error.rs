use smartextends_source::SourceError;
use smartextends_source::Span;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Malformed template syntax or directive usage.
    ///
    /// Raised at compile time for unknown tags, unclosed constructs, misplaced
    /// or repeated `extends`/`smart_extends`, and at render time when a parent
    /// name is empty or the parent can't be found.
    #[error("{message}")]
    Syntax { message: String, span: Option<Span> },

    /// No source supplies the template. `tried` lists every attempted
    /// candidate in chain order.
    #[error("template '{name}' does not exist")]
    NotFound { name: String, tried: Vec<String> },

    /// A configured source can't be built or isn't usable here.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl TemplateError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
            span: None,
        }
    }

    pub(crate) fn syntax_at(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            message: message.into(),
            span: Some(span),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Get the span start and length of this error, if available
    #[must_use]
    pub fn span(&self) -> Option<(u32, u32)> {
        match self {
            Self::Syntax {
                span: Some(span), ..
            } => Some((span.start, span.length)),
            _ => None,
        }
    }

    #[must_use]
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "T100",
            Self::NotFound { .. } => "T404",
            Self::Io(_) => "T900",
            Self::ImproperlyConfigured(_) => "T901",
        }
    }
}

impl From<SourceError> for TemplateError {
    fn from(err: SourceError) -> Self {
        let message = match &err {
            SourceError::Io { source, .. } => format!("{err}: {source}"),
            SourceError::NotFound { .. } => String::new(),
        };
        match err {
            SourceError::NotFound { name, tried } => Self::NotFound { name, tried },
            SourceError::Io { .. } => Self::Io(message),
        }
    }
}
