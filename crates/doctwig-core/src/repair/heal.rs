//! Post-repair cleanup: XML healing and empty element removal

use std::collections::BTreeSet;

use super::{RepairEdit, RepairReport};
use crate::config::XmlHealing;
use crate::tag::Tag;
use crate::tree::{ElementKind, NodeId, Tree};

/// Close unclosed elements and open orphan end tags, or drop them
pub(super) fn heal(tree: &mut Tree, settings: &XmlHealing, report: &mut RepairReport) {
    let mut pending = vec![tree.root()];
    while let Some(id) = pending.pop() {
        let mut index = 0;
        while let Some(&child) = tree.children(id).get(index) {
            let element = tree.get(child);
            if element.kind != ElementKind::Xml {
                index += 1;
                continue;
            }
            let name = element.name().unwrap_or_default().to_string();

            if element.is_unclosed() {
                if settings.drop_unclosed_start {
                    // The children take its place and are looked at next
                    tree.dissolve(child);
                    report.push(RepairEdit::UnclosedDissolved { element: child });
                    continue;
                }
                tree.get_mut(child).end = Some(Tag::synthetic_end(&name));
                report.push(RepairEdit::EndTagSynthesized { element: child });
            } else if element.is_orphan_end() {
                if settings.drop_orphan_end {
                    tree.detach(child);
                    report.push(RepairEdit::OrphanEndDropped { element: child });
                    continue;
                }
                tree.get_mut(child).start = Some(Tag::synthetic_start(&name));
                report.push(RepairEdit::StartTagSynthesized { element: child });
            }
            pending.push(child);
            index += 1;
        }
    }
}

/// Remove elements named in `names` that have no children, innermost first
pub(super) fn remove_empty(tree: &mut Tree, names: &BTreeSet<String>, report: &mut RepairReport) {
    let root = tree.root();
    prune(tree, root, names, report);
}

fn prune(tree: &mut Tree, id: NodeId, names: &BTreeSet<String>, report: &mut RepairReport) {
    for child in tree.children(id).to_vec() {
        prune(tree, child, names, report);
    }
    if id == tree.root() || !tree.children(id).is_empty() {
        return;
    }
    let element = tree.get(id);
    let removable = element.kind == ElementKind::Xml
        && element.start.is_some()
        && (element.end.is_some() || element.is_self_closing())
        && element.name().is_some_and(|name| names.contains(name));
    if removable {
        tree.detach(id);
        report.push(RepairEdit::EmptyElementRemoved { element: id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::parse;
    use crate::serialize::to_xml_string;

    fn healed(input: &str, settings: XmlHealing) -> (String, RepairReport) {
        let mut parsed = parse(input);
        let mut report = RepairReport::default();
        heal(&mut parsed.tree, &settings, &mut report);
        (to_xml_string(&parsed.tree), report)
    }

    #[test]
    fn test_synthesizes_missing_tags() {
        let settings = XmlHealing {
            enabled: true,
            ..XmlHealing::default()
        };
        let (out, report) = healed("<a><b>x</a></c>", settings);
        assert_eq!(out, "<a><b>x</b></a><c></c>");
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_drops_broken_tags() {
        let settings = XmlHealing {
            enabled: true,
            drop_unclosed_start: true,
            drop_orphan_end: true,
        };
        let (out, report) = healed("<a><b>x<c>y</a></d>", settings);
        assert_eq!(out, "<a>xy</a>");
        assert_eq!(report.len(), 3);
    }

    #[test]
    fn test_remove_empty_cascades() {
        let mut parsed = parse("<p><span><span></span></span>text<span/><i></i></p>");
        let names: BTreeSet<String> = ["span"].into_iter().map(String::from).collect();
        let mut report = RepairReport::default();
        remove_empty(&mut parsed.tree, &names, &mut report);
        assert_eq!(to_xml_string(&parsed.tree), "<p>text<i></i></p>");
        assert_eq!(report.len(), 3);
    }
}
