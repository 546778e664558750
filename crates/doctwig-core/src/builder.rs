//! Tree construction from the token stream
//!
//! XML start tags open elements that later tags nest under. Code tokens
//! never open a level of the tree: they are placed as siblings where they
//! appear and only paired into [`CodeRelation`]s, so code that crosses
//! element boundaries shows up as members with different parents.

use std::io::Read;

use encoding_rs::Encoding;

use crate::code::{pairing_for, CodeRegistry, CodeRelation, Pairing};
use crate::error::Result;
use crate::lexer::Lexer;
use crate::tag::{CodeKind, Tag, TagKind};
use crate::tree::{Element, ElementKind, NodeId, Tree};

/// Result of building a template part
#[derive(Debug, Clone)]
pub struct Parsed {
    pub tree: Tree,
    pub codes: CodeRegistry,
    pub encoding: &'static Encoding,
}

/// Incremental tree builder
#[derive(Debug)]
pub struct TreeBuilder {
    tree: Tree,
    codes: CodeRegistry,
    target: NodeId,
    xml_open: Vec<NodeId>,
    code_open: Vec<NodeId>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        let tree = Tree::new();
        let target = tree.root();
        Self {
            tree,
            codes: CodeRegistry::new(),
            target,
            xml_open: Vec::new(),
            code_open: Vec::new(),
        }
    }

    /// Drain `lexer` into a tree
    pub fn build<R: Read>(mut lexer: Lexer<R>) -> Result<Parsed> {
        let mut builder = Self::new();
        let mut lookahead: Option<Tag> = None;
        loop {
            let tag = match lookahead.take() {
                Some(tag) => tag,
                None => match lexer.next_tag()? {
                    Some(tag) => tag,
                    None => break,
                },
            };
            let crossing = tag.is_code() && tag.is_crossing();
            builder.push(tag);
            if crossing {
                lookahead = lexer.next_tag()?;
                if let Some(next) = &lookahead {
                    builder.dissolve_dangling_wrapper(next);
                }
            }
        }
        let encoding = lexer.encoding();
        let (tree, codes) = builder.finish(lexer.into_source());
        Ok(Parsed {
            tree,
            codes,
            encoding,
        })
    }

    /// Place one token
    pub fn push(&mut self, tag: Tag) {
        if tag.is_code() {
            match tag.kind() {
                TagKind::Start => {
                    let id = self.append(ElementKind::Code, Some(tag), None);
                    self.tree.get_mut(id).open = true;
                    self.code_open.push(id);
                }
                TagKind::End => self.close_code(tag),
                _ => {
                    let kind = tag.code_kind();
                    let keyword = tag.name().to_string();
                    let id = self.append(ElementKind::Code, Some(tag), None);
                    self.codes.register(CodeRelation::new(vec![id], kind, keyword));
                }
            }
            return;
        }

        match tag.kind() {
            TagKind::Text | TagKind::Header => {
                self.append(ElementKind::Text, Some(tag), None);
            }
            TagKind::StartAndEnd => {
                self.append(ElementKind::Xml, Some(tag), None);
            }
            TagKind::Start => {
                let id = self.append(ElementKind::Xml, Some(tag), None);
                self.tree.get_mut(id).open = true;
                self.xml_open.push(id);
                self.target = id;
            }
            TagKind::End => self.close_xml(tag),
        }
    }

    /// Settle everything still open and hand out the tree
    pub fn finish(mut self, source: String) -> (Tree, CodeRegistry) {
        // Block code that never saw its end tag stands alone
        for id in std::mem::take(&mut self.code_open) {
            let element = self.tree.get_mut(id);
            if !element.open {
                continue;
            }
            element.open = false;
            let keyword = element.name().unwrap_or_default().to_string();
            if let Some(start) = element.start.as_mut() {
                start.set_kind(TagKind::StartAndEnd);
            }
            self.codes.register(CodeRelation::new(vec![id], CodeKind::Block, keyword));
        }

        let unclosed = self
            .xml_open
            .iter()
            .filter(|&&id| self.tree.get(id).open)
            .count();
        if unclosed > 0 {
            tracing::debug!(unclosed, "elements left without end tag");
        }
        for id in std::mem::take(&mut self.xml_open) {
            self.tree.get_mut(id).open = false;
        }

        self.tree.set_source(source);
        (self.tree, self.codes)
    }

    fn append(&mut self, kind: ElementKind, start: Option<Tag>, end: Option<Tag>) -> NodeId {
        self.tree.append(self.target, Element::new(kind, start, end))
    }

    fn close_xml(&mut self, tag: Tag) {
        let found = self.xml_open.iter().rposition(|&id| {
            let element = self.tree.get(id);
            element.open && element.name() == Some(tag.name())
        });
        let Some(index) = found else {
            tracing::debug!(name = tag.name(), "end tag without start");
            self.append(ElementKind::Xml, None, Some(tag));
            return;
        };

        let id = self.xml_open[index];
        let element = self.tree.get_mut(id);
        element.end = Some(tag);
        element.open = false;
        for &inner in &self.xml_open[index + 1..] {
            self.tree.get_mut(inner).open = false;
        }
        self.xml_open.truncate(index);
        self.target = self.open_ancestor(id);
    }

    fn close_code(&mut self, tag: Tag) {
        let keyword = tag.name().to_string();
        let end = self.append(ElementKind::Code, None, Some(tag));

        let tree = &self.tree;
        let open_named = move |id: NodeId| {
            let element = tree.get(id);
            element.open.then(|| element.name().unwrap_or_default())
        };
        let members = match pairing_for(&keyword) {
            Pairing::Chain { head, members } => {
                let mut found = Vec::new();
                let mut complete = false;
                for &id in self.code_open.iter().rev() {
                    let Some(name) = open_named(id) else { continue };
                    if members.contains(&name) {
                        found.push(id);
                        if name == head {
                            complete = true;
                            break;
                        }
                    }
                }
                complete.then_some(found)
            }
            Pairing::Pair => self
                .code_open
                .iter()
                .rev()
                .find(|&&id| open_named(id) == Some(keyword.as_str()))
                .map(|&id| vec![id]),
        };

        let Some(mut members) = members else {
            tracing::debug!(keyword = %keyword, "end code without opening code");
            self.codes.add_unresolved(end);
            return;
        };
        members.reverse();
        for &id in &members {
            self.tree.get_mut(id).open = false;
        }
        let tree = &self.tree;
        self.code_open.retain(|&id| tree.get(id).open);
        members.push(end);
        self.codes
            .register(CodeRelation::new(members, CodeKind::Block, keyword));
    }

    /// Nearest element at or above `from` that is still waiting for its end tag
    fn open_ancestor(&self, from: NodeId) -> NodeId {
        std::iter::once(from)
            .chain(self.tree.ancestors(from))
            .find(|&id| {
                let element = self.tree.get(id);
                element.kind == ElementKind::Xml && element.open
            })
            .unwrap_or(self.tree.root())
    }

    /// Undo a wrapper a code token cut in half
    ///
    /// When the markup cut out of a code token leaves an unbalanced end or
    /// start tag behind and the next token is unrelated markup, the current
    /// element was opened by markup that now lives inside the code and is
    /// dissolved into its parent.
    fn dissolve_dangling_wrapper(&mut self, next: &Tag) {
        let target = self.target;
        if target == self.tree.root() || !next.is_markup() {
            return;
        }
        if next.kind() == TagKind::End && self.tree.name(target) == Some(next.name()) {
            return;
        }
        tracing::debug!(
            name = self.tree.name(target).unwrap_or_default(),
            "dissolving wrapper split by code"
        );
        self.xml_open.retain(|&id| id != target);
        self.tree.get_mut(target).open = false;
        let parent = self.tree.parent(target).unwrap_or(self.tree.root());
        self.tree.dissolve(target);
        self.target = self.open_ancestor(parent);
    }
}
