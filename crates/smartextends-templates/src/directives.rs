use rustc_hash::FxHashMap;

/// Which `extends` semantics a directive compiles to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtendsFlavor {
    /// Plain inheritance: the parent is looked up from the start of the chain.
    Standard,
    /// Same-name inheritance: a parent named like the template itself is
    /// looked up after the source that produced the template.
    Smart,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagKind {
    Block,
    EndBlock,
    Comment,
    EndComment,
    Extends(ExtendsFlavor),
}

/// The tag table the parser compiles against.
///
/// Built once per engine. `smart_extends` is always registered; `extends`
/// compiles to the standard flavor unless [`Directives::override_extends`]
/// was applied.
#[derive(Clone, Debug)]
pub struct Directives {
    tags: FxHashMap<&'static str, TagKind>,
}

impl Default for Directives {
    fn default() -> Self {
        let tags = [
            ("block", TagKind::Block),
            ("endblock", TagKind::EndBlock),
            ("comment", TagKind::Comment),
            ("endcomment", TagKind::EndComment),
            ("extends", TagKind::Extends(ExtendsFlavor::Standard)),
            ("smart_extends", TagKind::Extends(ExtendsFlavor::Smart)),
        ]
        .into_iter()
        .collect();

        Self { tags }
    }
}

impl Directives {
    /// Register the smart directive under the `extends` name too.
    #[must_use]
    pub fn override_extends(mut self) -> Self {
        self.tags
            .insert("extends", TagKind::Extends(ExtendsFlavor::Smart));
        self
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TagKind> {
        self.tags.get(name).copied()
    }

    #[must_use]
    pub fn is_extends_overridden(&self) -> bool {
        self.lookup("extends") == Some(TagKind::Extends(ExtendsFlavor::Smart))
    }
}
