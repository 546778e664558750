//! Template document
//!
//! [`TemplateDocument`] ties the pipeline together for one document part:
//! lex and build on construction, then either repair and serialize (render
//! path) or extract variables (variable path).

use std::fmt;
use std::io::{Read, Write};

use encoding_rs::Encoding;

use crate::builder::TreeBuilder;
use crate::code::{CodeRegistry, CodeRelation};
use crate::config::{ParseOptions, RepairConfig};
use crate::error::Result;
use crate::lexer::Lexer;
use crate::repair::{RepairEngine, RepairReport};
use crate::serialize;
use crate::tree::{ElementKind, NodeId, Tree};
use crate::vars::{VarExtractor, VarSet};

/// One parsed XML part with embedded template code
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    tree: Tree,
    codes: CodeRegistry,
    encoding: &'static Encoding,
}

impl TemplateDocument {
    /// Parse with default options
    pub fn parse<R: Read>(reader: R) -> Result<Self> {
        Self::parse_with(reader, &ParseOptions::default())
    }

    pub fn parse_with<R: Read>(reader: R, options: &ParseOptions) -> Result<Self> {
        let lexer = Lexer::new(reader, options)?;
        let parsed = TreeBuilder::build(lexer)?;
        tracing::debug!(
            relations = parsed.codes.len(),
            unresolved = parsed.codes.unresolved().len(),
            charset = parsed.encoding.name(),
            "template parsed"
        );
        Ok(Self {
            tree: parsed.tree,
            codes: parsed.codes,
            encoding: parsed.encoding,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse(bytes)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn codes(&self) -> &CodeRegistry {
        &self.codes
    }

    /// Charset the part was decoded with and will be written in
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Run the structural repair
    pub fn repair(&mut self, config: &RepairConfig) -> RepairReport {
        RepairEngine::new(config).run(&mut self.tree, &self.codes)
    }

    /// Variables read by the code of this part
    pub fn vars(&self, prefix: Option<&str>) -> VarSet {
        let mut extractor = VarExtractor::new(prefix);
        self.collect_vars(&mut extractor);
        extractor.into_vars()
    }

    /// Feed every code token of this part to `extractor`
    pub fn collect_vars(&self, extractor: &mut VarExtractor) {
        for id in self.code_nodes() {
            let element = self.tree.get(id);
            if let Some(start) = &element.start {
                extractor.parse(start.as_str(self.tree.source()));
            }
        }
    }

    /// Serialize in the part's charset
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serialize::write_tree(&self.tree, self.encoding, writer)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.tree.source().len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Whether any template code was found
    pub fn contains_code(&self) -> bool {
        !self.codes.is_empty() || !self.codes.unresolved().is_empty()
    }

    /// Lowest element containing all code
    pub fn code_root(&self) -> Option<NodeId> {
        let nodes: Vec<NodeId> = self
            .codes
            .code_nodes()
            .filter(|&id| self.tree.is_attached(id))
            .collect();
        self.tree.common_ancestor(&nodes)
    }

    /// Relations opened by `keyword`, e.g. `"for"`
    pub fn find_code_by_name<'a>(
        &'a self,
        keyword: &'a str,
    ) -> impl Iterator<Item = &'a CodeRelation> + 'a {
        self.codes.by_keyword(keyword)
    }

    /// XML elements named `name`, in document order
    pub fn find_elements_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.tree.descendants(self.tree.root()).filter(move |&id| {
            let element = self.tree.get(id);
            element.kind == ElementKind::Xml
                && element.start.is_some()
                && element.name() == Some(name)
        })
    }

    /// Unescaped attribute value of an element's start tag
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.tree
            .get(id)
            .start
            .as_ref()?
            .attribute(self.tree.source(), name)
    }

    /// Code elements still attached, in document order
    fn code_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.tree
            .descendants(self.tree.root())
            .filter(move |&id| self.tree.get(id).kind == ElementKind::Code)
    }
}

impl fmt::Display for TemplateDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize::to_xml_string(&self.tree))
    }
}

/// Repair one part from `reader` and write it to `writer`
pub fn prepare<R: Read, W: Write>(
    reader: R,
    writer: W,
    config: &RepairConfig,
) -> Result<RepairReport> {
    let mut document = TemplateDocument::parse(reader)?;
    let report = document.repair(config);
    document.write_to(writer)?;
    Ok(report)
}

/// Variables of one part from `reader`
pub fn extract_vars<R: Read>(reader: R, prefix: Option<&str>) -> Result<VarSet> {
    Ok(TemplateDocument::parse(reader)?.vars(prefix))
}
