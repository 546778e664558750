//! Common-ancestor relocation

use super::{RepairEdit, RepairReport};
use crate::tag::Tag;
use crate::tree::{Element, ElementKind, NodeId, Tree};

/// Where the members of a relation should end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Placement {
    /// Parents already agree; nothing to move
    Consistent,
    /// Move every member out to this depth
    Depth(usize),
    /// No depth where the parents agree
    Unreachable,
}

/// Deepest depth at which the members' parents agree
///
/// With `exact` the parents must be the same element, otherwise elements
/// with the same name are enough.
pub(super) fn common_depth(tree: &Tree, members: &[NodeId], exact: bool) -> Placement {
    let mut related = Vec::with_capacity(members.len());
    let mut depths = Vec::with_capacity(members.len());
    for &member in members {
        let Some(parent) = tree.parent(member) else {
            return Placement::Unreachable;
        };
        related.push(parent);
        depths.push(tree.depth(member));
    }

    let agree = |related: &[NodeId]| {
        related.iter().all(|&r| {
            if exact {
                r == related[0]
            } else {
                tree.name(r) == tree.name(related[0])
            }
        })
    };

    let (Some(&shallowest), Some(&deepest)) = (depths.iter().min(), depths.iter().max()) else {
        return Placement::Consistent;
    };
    if shallowest == deepest && agree(&related) {
        return Placement::Consistent;
    }

    let mut level = shallowest;
    while level > 0 {
        for (parent, depth) in related.iter_mut().zip(depths.iter_mut()) {
            while *depth > level {
                let Some(up) = tree.parent(*parent) else { break };
                *parent = up;
                *depth -= 1;
            }
        }
        if depths.iter().all(|&d| d == depths[0]) && agree(&related) {
            return Placement::Depth(depths[0]);
        }
        level -= 1;
    }
    Placement::Unreachable
}

/// Move `member` outward one level at a time until it sits at `depth`
pub(super) fn move_out(tree: &mut Tree, member: NodeId, depth: usize, report: &mut RepairReport) {
    while tree.depth(member) > depth {
        let Some(parent) = tree.parent(member) else {
            return;
        };
        if tree.parent(parent).is_none() {
            return;
        }
        let element = tree.get(member);
        let end_only = element.kind == ElementKind::Code && element.start.is_none();
        if end_only && tree.next_sibling(member).is_none() {
            push_down(tree, member, report);
        } else if tree.prev_sibling(member).is_none() {
            pull_up(tree, member, report);
        } else {
            push_down(tree, member, report);
        }
    }
}

/// Place `member` directly before its parent
fn pull_up(tree: &mut Tree, member: NodeId, report: &mut RepairReport) {
    let Some((parent, index)) = tree.detach(member) else {
        return;
    };
    // Anything nested under the member stays where it was
    for (offset, child) in tree.take_children(member).into_iter().enumerate() {
        tree.insert_child(parent, index + offset, child);
    }
    tree.insert_before(parent, member);
    report.push(RepairEdit::PulledUp {
        code: member,
        from: parent,
    });
}

/// Place `member` directly after its parent, splitting the parent when
/// siblings follow the member
fn push_down(tree: &mut Tree, member: NodeId, report: &mut RepairReport) {
    let has_followers = tree.next_sibling(member).is_some();
    let Some((parent, index)) = tree.detach(member) else {
        return;
    };
    for (offset, child) in tree.take_children(member).into_iter().enumerate() {
        tree.insert_child(parent, index + offset, child);
    }

    if !has_followers {
        tree.insert_after(parent, member);
        report.push(RepairEdit::PushedDown {
            code: member,
            from: parent,
            split: None,
        });
        return;
    }

    let tail = tree.split_children(parent, index);
    let original = tree.get_mut(parent);
    let end = original.end.take();
    if end.is_some() {
        let name = original.name().unwrap_or_default().to_string();
        original.end = Some(Tag::synthetic_end(&name));
    }
    let start = original.start.clone();
    let copy = tree.create(Element::new(ElementKind::Xml, start, end));
    for child in tail {
        tree.append_child(copy, child);
    }
    tree.insert_after(parent, member);
    tree.insert_after(member, copy);
    report.push(RepairEdit::PushedDown {
        code: member,
        from: parent,
        split: Some(copy),
    });
}
