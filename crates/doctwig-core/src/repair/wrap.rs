//! Tag wrapping
//!
//! A `{% for %}` typed into the first cell of a table row and its
//! `{% endfor %}` typed into the last cell should repeat the whole row.
//! Measurement walks outward and inward from the start member looking for
//! the nearest element with the configured name, then confirms the end
//! member reaches the same element (or one at the same depth).

use super::{RepairEdit, RepairReport};
use crate::tree::{ElementKind, NodeId, Tree};

/// A candidate element and the number of hops it took to reach it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Measurement {
    node: NodeId,
    distance: usize,
}

/// Move `start` before and `end` after the nearest `target` element the
/// end member can close
///
/// Candidates are tried nearest first. Returns false and leaves the tree
/// untouched when none works within `trials` hops.
pub(super) fn wrap(
    tree: &mut Tree,
    start: NodeId,
    end: NodeId,
    target: &str,
    trials: usize,
    report: &mut RepairReport,
) -> bool {
    let mut found: Vec<Measurement> = [
        outward_up(tree, start, target, trials),
        outward_down(tree, start, target, trials, true),
        inward_down(tree, start, target, trials),
    ]
    .into_iter()
    .flatten()
    .collect();
    found.sort_by_key(|m| m.distance);

    for around in found.into_iter().map(|m| m.node) {
        let around_depth = tree.depth(around);

        // The end already closes the target level
        let end_in_place = tree
            .prev_sibling(end)
            .is_some_and(|prev| prev == around || tree.depth(prev) == around_depth);
        if end_in_place {
            place_before(tree, start, around, report);
            return true;
        }

        let closing = if around_depth < tree.depth(end) {
            outward_down(tree, end, target, trials, false)
        } else {
            inward_up(tree, end, target, trials)
        };
        let Some(closing) = closing.map(|m| m.node) else {
            continue;
        };
        if closing != around && tree.depth(closing) != around_depth {
            continue;
        }

        place_before(tree, start, around, report);
        tree.detach(end);
        tree.insert_after(closing, end);
        report.push(RepairEdit::Wrapped {
            code: end,
            around: closing,
        });
        return true;
    }
    false
}

fn place_before(tree: &mut Tree, code: NodeId, around: NodeId, report: &mut RepairReport) {
    tree.detach(code);
    tree.insert_before(around, code);
    report.push(RepairEdit::Wrapped { code, around });
}

fn is_target(tree: &Tree, id: NodeId, target: &str) -> bool {
    let element = tree.get(id);
    element.kind == ElementKind::Xml && element.start.is_some() && element.name() == Some(target)
}

/// Climb while the current node is the first of its siblings
fn outward_up(tree: &Tree, from: NodeId, target: &str, trials: usize) -> Option<Measurement> {
    let mut current = from;
    for distance in 1..=trials {
        if tree.prev_sibling(current).is_some() {
            return None;
        }
        current = tree.parent(current)?;
        if is_target(tree, current, target) {
            return Some(Measurement {
                node: current,
                distance,
            });
        }
    }
    None
}

/// Climb while the current node is the last of its siblings; a start
/// member then tries the sibling that follows
fn outward_down(
    tree: &Tree,
    from: NodeId,
    target: &str,
    trials: usize,
    is_start: bool,
) -> Option<Measurement> {
    let mut current = from;
    for distance in 1..=trials {
        if let Some(next) = tree.next_sibling(current) {
            return (is_start && is_target(tree, next, target)).then_some(Measurement {
                node: next,
                distance,
            });
        }
        current = tree.parent(current)?;
        if is_target(tree, current, target) {
            return Some(Measurement {
                node: current,
                distance,
            });
        }
    }
    None
}

/// Step into following markup: first child, else next sibling
fn inward_down(tree: &Tree, from: NodeId, target: &str, trials: usize) -> Option<Measurement> {
    let mut current = from;
    for distance in 1..=trials {
        current = tree
            .first_child(current)
            .or_else(|| tree.next_sibling(current))?;
        if tree.get(current).kind != ElementKind::Xml {
            return None;
        }
        if is_target(tree, current, target) {
            return Some(Measurement {
                node: current,
                distance,
            });
        }
    }
    None
}

/// Step into preceding markup: previous sibling, then down through last
/// children of complete elements
fn inward_up(tree: &Tree, from: NodeId, target: &str, trials: usize) -> Option<Measurement> {
    let mut current = tree.prev_sibling(from)?;
    for distance in 1..=trials {
        let element = tree.get(current);
        if element.kind != ElementKind::Xml {
            return None;
        }
        if is_target(tree, current, target) {
            return Some(Measurement {
                node: current,
                distance,
            });
        }
        if element.start.is_none() || element.end.is_none() {
            return None;
        }
        current = tree.last_child(current)?;
    }
    None
}
