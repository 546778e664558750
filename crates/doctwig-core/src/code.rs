//! Code relations
//!
//! A relation groups the code tokens of one logical construct:
//! `{% if %}`, `{% elseif %}`, `{% else %}` and `{% endif %}` form one
//! relation, a lone `{{ x }}` forms a relation of one.

use std::sync::OnceLock;

use regex::Regex;

use crate::tag::CodeKind;
use crate::tree::{NodeId, Tree};

/// How an end keyword finds its opening members
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    /// A single start token of the same keyword
    Pair,
    /// A run of intermediate keywords back to `head`
    Chain {
        head: &'static str,
        members: &'static [&'static str],
    },
}

/// Keyword families that span more than two tokens
const CHAINS: &[(&str, &[&str])] = &[("if", &["if", "elseif", "else"])];

/// Pairing rule for the end keyword `keyword`
pub fn pairing_for(keyword: &str) -> Pairing {
    CHAINS
        .iter()
        .find(|(head, _)| *head == keyword)
        .map(|&(head, members)| Pairing::Chain { head, members })
        .unwrap_or(Pairing::Pair)
}

fn output_wrapper_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\{\{\s*(macros\.\w+|block\s*\()").unwrap())
}

/// Ordered members of one logical code construct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRelation {
    members: Vec<NodeId>,
    kind: CodeKind,
    keyword: String,
}

impl CodeRelation {
    pub fn new(members: Vec<NodeId>, kind: CodeKind, keyword: impl Into<String>) -> Self {
        Self {
            members,
            kind,
            keyword: keyword.into(),
        }
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn kind(&self) -> CodeKind {
        self.kind
    }

    /// Keyword of the opening member; empty for output and comments
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn is_comment(&self) -> bool {
        self.kind == CodeKind::Comment
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Complete `{% macro %}...{% endmacro %}` definition
    pub fn is_macro_definition(&self) -> bool {
        self.kind == CodeKind::Block && self.keyword == "macro" && self.members.len() >= 2
    }

    /// Whether paragraph and run wrappers around the members may be stripped
    ///
    /// Block code always qualifies; output only when it expands to markup
    /// of its own (macro calls and `block(...)`).
    pub fn strips_wrappers(&self, tree: &Tree) -> bool {
        match self.kind {
            CodeKind::Block => true,
            CodeKind::Output => self
                .members
                .first()
                .and_then(|&m| tree.get(m).start.as_ref())
                .map(|tag| output_wrapper_pattern().is_match(tag.as_str(tree.source())))
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// All relations of a document in discovery order
#[derive(Debug, Clone, Default)]
pub struct CodeRegistry {
    relations: Vec<CodeRelation>,
    unresolved: Vec<NodeId>,
}

impl CodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, relation: CodeRelation) {
        self.relations.push(relation);
    }

    /// Record an end token that matched no opening token
    pub fn add_unresolved(&mut self, id: NodeId) {
        self.unresolved.push(id);
    }

    pub fn relations(&self) -> &[CodeRelation] {
        &self.relations
    }

    pub fn unresolved(&self) -> &[NodeId] {
        &self.unresolved
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Relations opened by `keyword`
    pub fn by_keyword<'a>(
        &'a self,
        keyword: &'a str,
    ) -> impl Iterator<Item = &'a CodeRelation> + 'a {
        self.relations.iter().filter(move |r| r.keyword() == keyword)
    }

    /// Every code element that belongs to a relation, plus unresolved ends
    pub fn code_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.relations
            .iter()
            .flat_map(|r| r.members().iter().copied())
            .chain(self.unresolved.iter().copied())
    }
}
