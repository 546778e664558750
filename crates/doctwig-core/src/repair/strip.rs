//! Wrapper stripping

use std::collections::BTreeSet;

use super::{RepairEdit, RepairReport};
use crate::tree::{NodeId, Tree};

/// Climb `member` out of configured wrappers that hold nothing else
///
/// Whitespace inside a stripped wrapper is dropped with it. The root's
/// direct children are never climbed out of.
pub(super) fn strip_wrappers(
    tree: &mut Tree,
    member: NodeId,
    wrappers: &BTreeSet<String>,
    report: &mut RepairReport,
) {
    while let Some(parent) = tree.parent(member) {
        if tree.parent(parent).is_none() {
            return;
        }
        let strippable = tree
            .name(parent)
            .is_some_and(|name| wrappers.contains(name));
        if !strippable || !tree.is_only_child(parent, member) {
            return;
        }
        tree.detach(member);
        let Some((grand, index)) = tree.detach(parent) else {
            return;
        };
        tree.insert_child(grand, index, member);
        report.push(RepairEdit::WrapperStripped {
            code: member,
            wrapper: parent,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::{parse, sketch};

    fn wrappers(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_climbs_nested_wrappers() {
        let mut parsed = parse("<body><p> <r>{% if x %}</r> </p></body>");
        let member = parsed.codes.relations()[0].members()[0];
        let mut report = RepairReport::default();
        strip_wrappers(&mut parsed.tree, member, &wrappers(&["p", "r"]), &mut report);

        assert_eq!(sketch(&parsed.tree, parsed.tree.root()), "body[{% if x %}]");
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_stops_at_unlisted_wrapper() {
        let mut parsed = parse("<body><tc><r>{% if x %}</r></tc></body>");
        let member = parsed.codes.relations()[0].members()[0];
        let mut report = RepairReport::default();
        strip_wrappers(&mut parsed.tree, member, &wrappers(&["r"]), &mut report);

        assert_eq!(sketch(&parsed.tree, parsed.tree.root()), "body[tc[{% if x %}]]");
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_root_children_are_kept() {
        let mut parsed = parse("<p>{% if x %}</p>");
        let member = parsed.codes.relations()[0].members()[0];
        let mut report = RepairReport::default();
        strip_wrappers(&mut parsed.tree, member, &wrappers(&["p"]), &mut report);

        assert_eq!(sketch(&parsed.tree, parsed.tree.root()), "p[{% if x %}]");
        assert!(report.is_empty());
    }
}
