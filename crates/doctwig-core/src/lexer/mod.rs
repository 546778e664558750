//! Streaming lexer for XML with embedded Twig code
//!
//! The lexer splits a template part into [`Tag`]s: character data, XML
//! tags and code tokens (`{% %}`, `{{ }}`, `{# #}`). Code tokens may be
//! interrupted by formatting tags the word processor inserted while the
//! author typed; those tags are cut out of the code text and the code token
//! spans the whole region.
//!
//! ```
//! use doctwig_core::lexer::Lexer;
//! use doctwig_core::{ParseOptions, TagKind};
//!
//! let mut lexer = Lexer::new("<p>{{ na<b>me</b> }}</p>".as_bytes(), &ParseOptions::default()).unwrap();
//! let tags: Vec<_> = lexer.by_ref().collect::<Result<_, _>>().unwrap();
//!
//! assert_eq!(tags.len(), 3);
//! assert_eq!(tags[1].as_str(lexer.source()), "{{ name }}");
//! assert_eq!(tags[2].kind(), TagKind::End);
//! ```

mod clean;
mod source;

use std::io::{self, Read};
use std::ops::Range;

use encoding_rs::Encoding;

use crate::config::ParseOptions;
use crate::tag::{CodeKind, Tag, TagKind};
use source::CharSource;

/// Tokenizer over any byte reader
pub struct Lexer<R> {
    source: CharSource<R>,
    pos: usize,
    pending: Option<Tag>,
    verbatim: bool,
    settled: bool,
    default_encoding: &'static Encoding,
}

impl<R: Read> Lexer<R> {
    /// Start lexing `reader`
    ///
    /// A byte order mark selects its charset right away. Input that does not
    /// start with `<?` is decoded with the default charset; otherwise the
    /// charset is chosen after the declaration has been read.
    pub fn new(reader: R, options: &ParseOptions) -> io::Result<Self> {
        let mut source = CharSource::new(reader);
        let (bom, declared) = {
            let head = source.sniff(4)?;
            (
                Encoding::for_bom(head).map(|(encoding, _)| encoding),
                head.starts_with(b"<?"),
            )
        };
        let settled = match bom {
            Some(encoding) => {
                source.commit(encoding);
                true
            }
            None if !declared => {
                source.commit(options.default_encoding);
                true
            }
            None => false,
        };
        Ok(Self {
            source,
            pos: 0,
            pending: None,
            verbatim: false,
            settled,
            default_encoding: options.default_encoding,
        })
    }

    /// Next token, or `None` at end of input
    pub fn next_tag(&mut self) -> io::Result<Option<Tag>> {
        let tag = match self.pending.take() {
            Some(tag) => Some(tag),
            None => self.scan()?,
        };
        if !self.settled {
            self.settle(tag.as_ref());
        }
        Ok(tag)
    }

    /// Decoded input read so far; tag spans index into it
    pub fn source(&self) -> &str {
        self.source.buffer()
    }

    /// Charset of the input, once known
    pub fn encoding(&self) -> &'static Encoding {
        self.source.encoding().unwrap_or(self.default_encoding)
    }

    /// Consume the lexer, keeping the decoded input
    pub fn into_source(self) -> String {
        self.source.into_buffer()
    }

    fn settle(&mut self, first: Option<&Tag>) {
        self.settled = true;
        let declared = first
            .filter(|tag| tag.kind() == TagKind::Header)
            .and_then(|tag| tag.attribute(self.source.buffer(), "encoding"));
        let encoding = match declared {
            Some(label) => match Encoding::for_label(label.trim().as_bytes()) {
                Some(encoding) => encoding,
                None => {
                    tracing::warn!(
                        charset = %label,
                        fallback = self.default_encoding.name(),
                        "unsupported charset declared, using fallback"
                    );
                    self.default_encoding
                }
            },
            None => self.default_encoding,
        };
        if !self.source.is_committed() {
            self.source.commit(encoding);
        }
    }

    fn scan(&mut self) -> io::Result<Option<Tag>> {
        let start = self.pos;
        let mut i = start;
        while let Some(byte) = self.source.byte_at(i)? {
            match byte {
                b'<' => {
                    if i > start {
                        break;
                    }
                    let tag = self.markup(i)?;
                    self.pos = tag.span().end;
                    return Ok(Some(tag));
                }
                b'{' => match self.code(i)? {
                    Some(tag) if i > start => {
                        self.pos = tag.span().end;
                        self.pending = Some(tag);
                        return Ok(Some(Tag::text(start..i)));
                    }
                    Some(tag) => {
                        self.pos = tag.span().end;
                        return Ok(Some(tag));
                    }
                    None => i += 1,
                },
                _ => i += 1,
            }
        }
        self.pos = i;
        if i > start {
            Ok(Some(Tag::text(start..i)))
        } else {
            Ok(None)
        }
    }

    /// Lex the XML tag starting at `start`; unterminated tags become text
    fn markup(&mut self, start: usize) -> io::Result<Tag> {
        for (open, close) in [("<!--", "-->"), ("<![CDATA[", "]]>")] {
            if self.starts_with(start, open)? {
                return self.opaque(start, open.len(), close);
            }
        }

        let mut quote = None;
        let mut last = b'<';
        let mut j = start + 1;
        let end = loop {
            let Some(byte) = self.source.byte_at(j)? else {
                return Ok(Tag::text(start..j));
            };
            match quote {
                Some(q) => {
                    if byte == q {
                        quote = None;
                        last = byte;
                    }
                }
                None => match byte {
                    // Quotes only open an attribute value right after '='
                    b'"' | b'\'' if last == b'=' => quote = Some(byte),
                    b'>' => break j + 1,
                    _ if !byte.is_ascii_whitespace() => last = byte,
                    _ => {}
                },
            }
            j += 1;
        };

        let bytes = self.source.buffer().as_bytes();
        let kind = match bytes[start + 1] {
            b'?' | b'!' => TagKind::Header,
            b'/' => TagKind::End,
            _ if bytes[end - 2] == b'/' => TagKind::StartAndEnd,
            _ => TagKind::Start,
        };
        Ok(Tag::markup(kind, start..end, self.source.buffer()))
    }

    /// Comment or CDATA section, kept verbatim as a header
    fn opaque(&mut self, start: usize, skip: usize, close: &str) -> io::Result<Tag> {
        let mut j = start + skip;
        loop {
            if self.source.byte_at(j)?.is_none() {
                return Ok(Tag::text(start..j));
            }
            if self.starts_with(j, close)? {
                let end = j + close.len();
                return Ok(Tag::markup(TagKind::Header, start..end, self.source.buffer()));
            }
            j += 1;
        }
    }

    /// Try to lex a code token at the `{` at `open`
    ///
    /// Returns `None` when the brace is literal: no code opener follows,
    /// the closer never comes, or a verbatim section is active.
    fn code(&mut self, open: usize) -> io::Result<Option<Tag>> {
        let mut excised: Vec<Range<usize>> = Vec::new();
        let mut styles: Vec<TagKind> = Vec::new();

        let mut j = open + 1;
        let flavor = loop {
            match self.source.byte_at(j)? {
                Some(b'<') if self.is_style_tag(j)? => {
                    let tag = self.markup(j)?;
                    if tag.kind() == TagKind::Text {
                        return Ok(None);
                    }
                    j = tag.span().end;
                    excised.push(tag.span());
                    styles.push(tag.kind());
                }
                Some(b'%') => break CodeKind::Block,
                Some(b'{') => break CodeKind::Output,
                Some(b'#') => break CodeKind::Comment,
                _ => return Ok(None),
            }
        };
        let closer = match flavor {
            CodeKind::Block => b'%',
            CodeKind::Output => b'}',
            _ => b'#',
        };

        j += 1;
        let mut last = None;
        let end = loop {
            match self.source.byte_at(j)? {
                None => return Ok(None),
                Some(b'<') if self.is_style_tag(j)? => {
                    let tag = self.markup(j)?;
                    if tag.kind() == TagKind::Text {
                        return Ok(None);
                    }
                    j = tag.span().end;
                    excised.push(tag.span());
                    styles.push(tag.kind());
                }
                Some(b'}') if last == Some(closer) => break j + 1,
                Some(byte) => {
                    last = Some(byte);
                    j += 1;
                }
            }
        };

        let span = open..end;
        let raw = clean::excise(self.source.buffer(), span.clone(), &excised);
        let (kind, name) = match flavor {
            CodeKind::Block => block_role(&raw),
            _ => (TagKind::StartAndEnd, String::new()),
        };

        let is_verbatim = flavor == CodeKind::Block && name == "verbatim";
        if self.verbatim && !(is_verbatim && kind == TagKind::End) {
            return Ok(None);
        }
        if is_verbatim {
            self.verbatim = kind == TagKind::Start;
        }

        let text = if kind == TagKind::End {
            raw
        } else {
            clean::normalize(&raw)
        };
        let crossing = styles.first() == Some(&TagKind::End)
            || styles.last() == Some(&TagKind::Start);
        if !excised.is_empty() {
            tracing::trace!(code = %text, excised = excised.len(), "markup cut out of code");
        }
        Ok(Some(
            Tag::code(kind, flavor, name, span, text).with_crossing(crossing),
        ))
    }

    /// `<` followed by `/` or a letter
    fn is_style_tag(&mut self, at: usize) -> io::Result<bool> {
        Ok(matches!(self.source.char_at(at + 1)?, Some(c) if c == '/' || c.is_alphabetic()))
    }

    fn starts_with(&mut self, at: usize, pattern: &str) -> io::Result<bool> {
        for (k, expected) in pattern.bytes().enumerate() {
            if self.source.byte_at(at + k)? != Some(expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<R: Read> Iterator for Lexer<R> {
    type Item = io::Result<Tag>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tag().transpose()
    }
}

/// Role and keyword of a block code token: `{% endfor %}` is the end of `for`
fn block_role(code: &str) -> (TagKind, String) {
    let body = code.strip_prefix("{%").unwrap_or(code);
    let body = body.trim_start_matches(|c: char| c.is_whitespace() || c == '-' || c == '~');
    let word = body
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase();
    match word.strip_prefix("end") {
        Some(keyword) if !keyword.is_empty() => (TagKind::End, keyword.to_string()),
        _ => (TagKind::Start, word),
    }
}
