//! Lexical tokens
//!
//! A [`Tag`] is one token of a template part: character data, an XML tag,
//! or a Twig code token. Tags lexed from the input keep only the byte range
//! of their text in the decoded source buffer; tags whose text differs from
//! the source (cleaned code, synthesized end tags) own their text.

use std::ops::Range;

use quick_xml::events::BytesStart;

/// Structural role of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// Opens an element or a code block
    Start,
    /// Closes an element or a code block
    End,
    /// Self-contained: `<a/>`, `{{ x }}`, `{# c #}`
    StartAndEnd,
    /// `<?...?>`, `<!...>`, comments and CDATA; never structural
    Header,
    /// Character data
    Text,
}

/// Flavor of embedded template code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeKind {
    /// Not code (XML or text)
    #[default]
    None,
    /// `{% ... %}`
    Block,
    /// `{{ ... }}`
    Output,
    /// `{# ... #}`
    Comment,
}

impl CodeKind {
    /// True for any of the three code flavors
    pub fn is_code(self) -> bool {
        self != CodeKind::None
    }

    /// Opening delimiter of this code flavor
    pub fn opener(self) -> &'static str {
        match self {
            CodeKind::Block => "{%",
            CodeKind::Output => "{{",
            CodeKind::Comment => "{#",
            CodeKind::None => "",
        }
    }
}

/// A single lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    kind: TagKind,
    code: CodeKind,
    name: String,
    span: Range<usize>,
    owned: Option<String>,
    crossing: bool,
}

impl Tag {
    /// Character data covering `span`
    pub fn text(span: Range<usize>) -> Self {
        Self {
            kind: TagKind::Text,
            code: CodeKind::None,
            name: String::new(),
            span,
            owned: None,
            crossing: false,
        }
    }

    /// An XML tag covering `span`, named after the source text
    pub fn markup(kind: TagKind, span: Range<usize>, source: &str) -> Self {
        let name = match kind {
            TagKind::Header | TagKind::Text => String::new(),
            _ => markup_name(&source[span.clone()]).to_string(),
        };
        Self {
            kind,
            code: CodeKind::None,
            name,
            span,
            owned: None,
            crossing: false,
        }
    }

    /// A code token covering `span` whose text is the cleaned `code`
    pub fn code(
        kind: TagKind,
        code: CodeKind,
        name: String,
        span: Range<usize>,
        cleaned: String,
    ) -> Self {
        Self {
            kind,
            code,
            name,
            span,
            owned: Some(cleaned),
            crossing: false,
        }
    }

    /// A synthesized `</name>` that has no source position
    pub fn synthetic_end(name: &str) -> Self {
        Self {
            kind: TagKind::End,
            code: CodeKind::None,
            name: name.to_string(),
            span: 0..0,
            owned: Some(format!("</{}>", name)),
            crossing: false,
        }
    }

    /// A synthesized `<name>` that has no source position
    pub fn synthetic_start(name: &str) -> Self {
        Self {
            kind: TagKind::Start,
            code: CodeKind::None,
            name: name.to_string(),
            span: 0..0,
            owned: Some(format!("<{}>", name)),
            crossing: false,
        }
    }

    /// A synthesized self-contained code token
    pub fn synthetic_code(code: CodeKind, name: &str, text: &str) -> Self {
        Self {
            kind: TagKind::StartAndEnd,
            code,
            name: name.to_string(),
            span: 0..0,
            owned: Some(text.to_string()),
            crossing: false,
        }
    }

    pub(crate) fn with_crossing(mut self, crossing: bool) -> Self {
        self.crossing = crossing;
        self
    }

    pub(crate) fn set_kind(&mut self, kind: TagKind) {
        self.kind = kind;
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn code_kind(&self) -> CodeKind {
        self.code
    }

    pub fn is_code(&self) -> bool {
        self.code.is_code()
    }

    /// True for XML start, end and self-closing tags
    pub fn is_markup(&self) -> bool {
        !self.is_code() && matches!(self.kind, TagKind::Start | TagKind::End | TagKind::StartAndEnd)
    }

    /// Element name for XML tags, lowercased keyword for block code,
    /// empty for everything else
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte range in the decoded source; empty for synthesized tags
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Whether markup excised from this code token crosses its boundaries
    pub fn is_crossing(&self) -> bool {
        self.crossing
    }

    /// Text of the tag as it will be serialized
    pub fn as_str<'a>(&'a self, source: &'a str) -> &'a str {
        match &self.owned {
            Some(text) => text,
            None => source.get(self.span.clone()).unwrap_or_default(),
        }
    }

    /// Unescaped value of an attribute of an XML tag or declaration
    pub fn attribute(&self, source: &str, name: &str) -> Option<String> {
        if self.is_code() || !matches!(
            self.kind,
            TagKind::Start | TagKind::StartAndEnd | TagKind::Header
        ) {
            return None;
        }
        let raw = self.as_str(source);
        let inner = raw
            .strip_prefix("<?")
            .or_else(|| raw.strip_prefix('<'))?
            .trim_end_matches('>')
            .trim_end_matches(['/', '?']);
        let name_len = inner
            .find(|c: char| c.is_whitespace())
            .unwrap_or(inner.len());
        let start = BytesStart::from_content(inner, name_len);
        let attr = start.try_get_attribute(name).ok()??;
        attr.unescape_value().ok().map(|v| v.into_owned())
    }
}

/// Name of an XML tag: the run after `<` or `</` up to whitespace, `/` or `>`
fn markup_name(raw: &str) -> &str {
    let rest = raw.strip_prefix("</").or_else(|| raw.strip_prefix('<')).unwrap_or(raw);
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(rest.len());
    &rest[..end]
}
