//! Structural repair of crossing code
//!
//! Word processors wrap typed template code in paragraph and run elements,
//! so a `{% for %}` and its `{% endfor %}` regularly end up in different
//! elements. Rendered as-is, the loop would repeat half an element. The
//! [`RepairEngine`] moves code tokens until every relation's members share
//! a parent, using three strategies per relation:
//!
//! 1. strip wrapper elements that hold nothing but the code token,
//! 2. wrap a configured target element (`for` around a table row),
//! 3. relocate members outward to the deepest depth where their parents agree.
//!
//! Every step is best effort. A relation that cannot be fixed is left as
//! found and reported as [`RepairEdit::LeftInPlace`].

mod heal;
mod relocate;
mod strip;
mod wrap;

use crate::code::{CodeRegistry, CodeRelation};
use crate::config::RepairConfig;
use crate::tag::{CodeKind, Tag};
use crate::tree::{Element, ElementKind, NodeId, Tree};
use relocate::Placement;

/// Directive that makes a template's own macros callable as `macros.name()`
pub const MACRO_IMPORT: &str = "{% import _self as macros %}";

/// One structural change made by the repair engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairEdit {
    /// A wrapper holding only the code token was replaced by it
    WrapperStripped { code: NodeId, wrapper: NodeId },
    /// Code moved out in front of its former parent
    PulledUp { code: NodeId, from: NodeId },
    /// Code moved out behind its former parent; `split` holds the siblings
    /// that followed it in a copy of the parent
    PushedDown {
        code: NodeId,
        from: NodeId,
        split: Option<NodeId>,
    },
    /// Code placed directly before or after `around`
    Wrapped { code: NodeId, around: NodeId },
    /// No safe placement was found for the relation at this index
    LeftInPlace { relation: usize },
    /// The macro self-import directive was added
    MacroImportInserted { node: NodeId },
    /// A missing end tag was synthesized
    EndTagSynthesized { element: NodeId },
    /// A missing start tag was synthesized
    StartTagSynthesized { element: NodeId },
    /// An unclosed element was replaced by its children
    UnclosedDissolved { element: NodeId },
    /// An end tag without start was dropped
    OrphanEndDropped { element: NodeId },
    /// An element left without children was removed
    EmptyElementRemoved { element: NodeId },
}

/// Edits made by one repair run, in the order they happened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    edits: Vec<RepairEdit>,
}

impl RepairReport {
    pub(crate) fn push(&mut self, edit: RepairEdit) {
        self.edits.push(edit);
    }

    pub fn edits(&self) -> &[RepairEdit] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Indices of relations that could not be repaired
    pub fn left_in_place(&self) -> impl Iterator<Item = usize> + '_ {
        self.edits.iter().filter_map(|edit| match edit {
            RepairEdit::LeftInPlace { relation } => Some(*relation),
            _ => None,
        })
    }

    /// Number of code tokens that were moved
    pub fn moved(&self) -> usize {
        self.edits
            .iter()
            .filter(|edit| {
                matches!(
                    edit,
                    RepairEdit::WrapperStripped { .. }
                        | RepairEdit::PulledUp { .. }
                        | RepairEdit::PushedDown { .. }
                        | RepairEdit::Wrapped { .. }
                )
            })
            .count()
    }
}

/// Applies a [`RepairConfig`] to a tree
#[derive(Debug, Clone, Copy)]
pub struct RepairEngine<'a> {
    config: &'a RepairConfig,
}

impl<'a> RepairEngine<'a> {
    pub fn new(config: &'a RepairConfig) -> Self {
        Self { config }
    }

    /// Repair every relation of `codes` in discovery order, then run the
    /// configured post passes
    pub fn run(&self, tree: &mut Tree, codes: &CodeRegistry) -> RepairReport {
        let mut report = RepairReport::default();
        for (index, relation) in codes.relations().iter().enumerate() {
            self.repair_relation(tree, index, relation, &mut report);
        }
        if self.config.import_macros {
            import_macros(tree, codes, &mut report);
        }
        if self.config.heal_xml.enabled {
            heal::heal(tree, &self.config.heal_xml, &mut report);
        }
        if !self.config.remove_empty.is_empty() {
            heal::remove_empty(tree, &self.config.remove_empty, &mut report);
        }
        tracing::debug!(
            relations = codes.len(),
            edits = report.len(),
            "repair finished"
        );
        report
    }

    /// Strip wrappers around the members of one relation
    pub fn strip_wrappers(&self, tree: &mut Tree, relation: &CodeRelation) -> RepairReport {
        let mut report = RepairReport::default();
        for &member in relation.members() {
            strip::strip_wrappers(tree, member, &self.config.strip_wrappers, &mut report);
        }
        report
    }

    fn repair_relation(
        &self,
        tree: &mut Tree,
        index: usize,
        relation: &CodeRelation,
        report: &mut RepairReport,
    ) {
        let members = relation.members();
        if members.iter().any(|&m| !tree.is_attached(m)) {
            return;
        }
        let exact = self.config.requires_exact_parent(relation.keyword());

        let strippable = !self.config.strip_wrappers.is_empty()
            && relation.strips_wrappers(tree)
            && (!exact || share_parent(tree, members));
        if strippable {
            for &member in members {
                strip::strip_wrappers(tree, member, &self.config.strip_wrappers, report);
            }
        }

        if relation.is_comment() || members.len() < 2 || share_parent(tree, members) {
            return;
        }

        let target = self.config.wrap_target(relation.keyword());
        if let ([start, end], Some(target)) = (members, target) {
            if wrap::wrap(tree, *start, *end, target, self.config.wrap_trials, report) {
                return;
            }
        }

        if !self.config.relocate || share_parent(tree, members) {
            return;
        }
        match relocate::common_depth(tree, members, exact) {
            Placement::Consistent => {}
            Placement::Depth(depth) => {
                for &member in members {
                    relocate::move_out(tree, member, depth, report);
                }
            }
            Placement::Unreachable => {
                tracing::debug!(
                    relation = index,
                    keyword = relation.keyword(),
                    "no common depth, leaving relation in place"
                );
                report.push(RepairEdit::LeftInPlace { relation: index });
            }
        }
    }
}

fn share_parent(tree: &Tree, members: &[NodeId]) -> bool {
    let mut parents = members.iter().map(|&m| tree.parent(m));
    match parents.next() {
        Some(first) => parents.all(|p| p == first),
        None => true,
    }
}

/// Add the macro self-import after the first complete macro definition
fn import_macros(tree: &mut Tree, codes: &CodeRegistry, report: &mut RepairReport) {
    let already_imported = codes.by_keyword("import").any(|relation| {
        relation.members().iter().any(|&m| {
            tree.get(m)
                .start
                .as_ref()
                .is_some_and(|tag| tag.as_str(tree.source()).contains("_self"))
        })
    });
    if already_imported {
        return;
    }
    let Some(&anchor) = codes
        .relations()
        .iter()
        .find(|r| r.is_macro_definition())
        .and_then(|r| r.members().last())
    else {
        return;
    };
    if !tree.is_attached(anchor) {
        return;
    }
    let tag = Tag::synthetic_code(CodeKind::Block, "import", MACRO_IMPORT);
    let node = tree.create(Element::new(ElementKind::Code, Some(tag), None));
    tree.insert_after(anchor, node);
    report.push(RepairEdit::MacroImportInserted { node });
}
