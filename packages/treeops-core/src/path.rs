//! Path algebra: lookups, relationship predicates, and the filter → sort → rebase pipeline
//! that turns a batch expressed against one snapshot into a sequential edit list.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::ops::{Operation, OperationKind, Path};

pub fn get_element_by_path<'a>(children: &'a [Element], path: &[usize]) -> Result<&'a Element> {
    let not_found = || Error::PathNotFound(path.to_vec());
    let (first, rest) = path.split_first().ok_or_else(not_found)?;
    let mut node = children.get(*first).ok_or_else(not_found)?;
    for &index in rest {
        node = node.children.get(index).ok_or_else(not_found)?;
    }
    Ok(node)
}

/// Child list of the element at `parent`; the empty path yields the root list.
pub(crate) fn children_at_mut<'a>(
    children: &'a mut Vec<Element>,
    parent: &[usize],
) -> Option<&'a mut Vec<Element>> {
    let mut current = children;
    for &index in parent {
        current = &mut current.get_mut(index)?.children;
    }
    Some(current)
}

pub(crate) fn element_at_mut<'a>(
    children: &'a mut Vec<Element>,
    path: &[usize],
) -> Option<&'a mut Element> {
    let (last, parent) = path.split_last()?;
    children_at_mut(children, parent)?.get_mut(*last)
}

/// Depth-first search by id. Returns the first match in document order.
pub fn get_path_by_id(children: &[Element], id: &str) -> Option<Path> {
    for (index, child) in children.iter().enumerate() {
        if child.id == id {
            return Some(vec![index]);
        }
        if let Some(mut rest) = get_path_by_id(&child.children, id) {
            rest.insert(0, index);
            return Some(rest);
        }
    }
    None
}

pub fn get_path_by_element(children: &[Element], element: &Element) -> Option<Path> {
    get_path_by_id(children, &element.id)
}

/// `a` is a strict, shorter prefix of `b`.
pub fn is_ancestor_path(a: &[usize], b: &[usize]) -> bool {
    a.len() < b.len() && b.starts_with(a)
}

fn is_ancestor_or_equal(a: &[usize], b: &[usize]) -> bool {
    a.len() <= b.len() && b.starts_with(a)
}

/// Same length and same parent; the last index may differ.
pub fn are_sibling_paths(a: &[usize], b: &[usize]) -> bool {
    !a.is_empty() && a.len() == b.len() && a[..a.len() - 1] == b[..b.len() - 1]
}

pub fn paths_equal(a: &[usize], b: &[usize]) -> bool {
    a == b
}

/// Parent of `path`; top-level paths (and the empty path) have the root, `[]`, as parent.
pub fn parent_path(path: &[usize]) -> &[usize] {
    match path.split_last() {
        Some((_, parent)) => parent,
        None => path,
    }
}

fn shift_for_insert(path: &[usize], at: &[usize]) -> Path {
    let mut shifted = path.to_vec();
    if let Some((&index, parent)) = at.split_last() {
        let depth = parent.len();
        if shifted.len() > depth && shifted.starts_with(parent) && shifted[depth] >= index {
            shifted[depth] += 1;
        }
    }
    shifted
}

fn shift_for_remove(path: &[usize], at: &[usize]) -> Path {
    let mut shifted = path.to_vec();
    if let Some((&index, parent)) = at.split_last() {
        let depth = parent.len();
        if shifted.len() > depth && shifted.starts_with(parent) && shifted[depth] > index {
            shifted[depth] -= 1;
        }
    }
    shifted
}

/// Effect of the already executed `op` on a not yet executed `path`.
///
/// Returns `None` when the element `path` points at no longer exists. `target` is the kind of
/// the operation that owns `path`: a `remove_node` at exactly `path` only invalidates it when
/// the owner is not an `insert_node`, so a same-path reinsertion survives the deletion.
pub fn transform_path(
    path: &[usize],
    op: &Operation,
    target: Option<OperationKind>,
) -> Option<Path> {
    match op {
        Operation::SetNode { .. }
        | Operation::SetViewport { .. }
        | Operation::SetSelection { .. } => Some(path.to_vec()),
        Operation::InsertNode { path: at, .. } => Some(shift_for_insert(path, at)),
        Operation::RemoveNode { path: at, .. } => {
            if at.is_empty() {
                return Some(path.to_vec());
            }
            if path == at.as_slice() {
                return (target == Some(OperationKind::InsertNode)).then(|| path.to_vec());
            }
            if is_ancestor_path(at, path) {
                return None;
            }
            Some(shift_for_remove(path, at))
        }
        Operation::MoveNode { path: from, new_path: to } => {
            if from == to || from.is_empty() || to.is_empty() {
                return Some(path.to_vec());
            }
            if path == from.as_slice() {
                return Some(to.clone());
            }
            if is_ancestor_path(from, path) {
                let mut moved = to.clone();
                moved.extend_from_slice(&path[from.len()..]);
                return Some(moved);
            }
            Some(shift_for_insert(&shift_for_remove(path, from), to))
        }
    }
}

/// Preimage of `path` under [`transform_path`]: a path `p` with
/// `transform_path(p, op, target) == Some(path)`, or `None` if no such path exists.
/// Where two preimages exist (a reinsertion at a removed slot) the unshifted one wins.
pub(crate) fn untransform_path(
    path: &[usize],
    op: &Operation,
    target: Option<OperationKind>,
) -> Option<Path> {
    match op {
        Operation::SetNode { .. }
        | Operation::SetViewport { .. }
        | Operation::SetSelection { .. } => Some(path.to_vec()),
        Operation::InsertNode { path: at, .. } => {
            let Some((&index, parent)) = at.split_last() else {
                return Some(path.to_vec());
            };
            let depth = parent.len();
            let mut original = path.to_vec();
            if original.len() > depth && original.starts_with(parent) {
                if original[depth] == index {
                    return None;
                }
                if original[depth] > index {
                    original[depth] -= 1;
                }
            }
            Some(original)
        }
        Operation::RemoveNode { path: at, .. } => {
            if target == Some(OperationKind::InsertNode) && path == at.as_slice() {
                return Some(path.to_vec());
            }
            Some(unshift_for_remove(path, at))
        }
        Operation::MoveNode { path: from, new_path: to } => {
            if from == to || from.is_empty() || to.is_empty() {
                return Some(path.to_vec());
            }
            if path.starts_with(to) {
                let mut original = from.clone();
                original.extend_from_slice(&path[to.len()..]);
                return Some(original);
            }
            let mut detached = path.to_vec();
            if let Some((&index, parent)) = to.split_last() {
                let depth = parent.len();
                if detached.len() > depth
                    && detached.starts_with(parent)
                    && detached[depth] > index
                {
                    detached[depth] -= 1;
                }
            }
            Some(unshift_for_remove(&detached, from))
        }
    }
}

fn unshift_for_remove(path: &[usize], at: &[usize]) -> Path {
    let mut original = path.to_vec();
    if let Some((&index, parent)) = at.split_last() {
        let depth = parent.len();
        if original.len() > depth && original.starts_with(parent) && original[depth] >= index {
            original[depth] += 1;
        }
    }
    original
}

/// Index of the latest earlier remove whose path is an ancestor of or equal to `path`.
fn covering_remove(removes: &[(usize, &[usize])], path: &[usize]) -> Option<usize> {
    removes
        .iter()
        .rev()
        .find(|(_, removed)| is_ancestor_or_equal(removed, path))
        .map(|(index, _)| *index)
}

/// Drops operations that cannot apply once the batch runs in order.
///
/// Removes nested under another remove of the same batch are redundant. After that, an
/// operation is dropped when an earlier remove covers what it touches: its own path for
/// `set_node`/`remove_node`, the parent for `insert_node`, both parents for `move_node`.
/// A `set_node` at a path that was removed and then reinserted at exactly that path stays.
pub fn filter_valid_operations(ops: &[Operation]) -> Vec<Operation> {
    let removed: Vec<&[usize]> = ops
        .iter()
        .filter_map(|op| match op {
            Operation::RemoveNode { path, .. } => Some(path.as_slice()),
            _ => None,
        })
        .collect();

    let mut earlier_removes: Vec<(usize, &[usize])> = Vec::new();
    let mut earlier_inserts: Vec<(usize, &[usize])> = Vec::new();
    let mut kept = Vec::with_capacity(ops.len());

    for (index, op) in ops.iter().enumerate() {
        let keep = match op {
            Operation::RemoveNode { path, .. } => {
                !removed.iter().any(|r| is_ancestor_path(r, path))
                    && covering_remove(&earlier_removes, path).is_none()
            }
            Operation::InsertNode { path, .. } => {
                covering_remove(&earlier_removes, parent_path(path)).is_none()
            }
            Operation::SetNode { path, .. } => match covering_remove(&earlier_removes, path) {
                None => true,
                Some(removed_at) => earlier_inserts
                    .iter()
                    .any(|(at, inserted)| *at > removed_at && *inserted == path.as_slice()),
            },
            Operation::MoveNode { path, new_path } => {
                covering_remove(&earlier_removes, parent_path(path)).is_none()
                    && covering_remove(&earlier_removes, parent_path(new_path)).is_none()
            }
            Operation::SetViewport { .. } | Operation::SetSelection { .. } => true,
        };

        if !keep {
            tracing::debug!(index, kind = ?op.kind(), "dropping operation covered by a removal");
            continue;
        }
        match op {
            Operation::RemoveNode { path, .. } => earlier_removes.push((index, path.as_slice())),
            Operation::InsertNode { path, .. } => earlier_inserts.push((index, path.as_slice())),
            _ => {}
        }
        kept.push(op.clone());
    }
    kept
}

/// Orders inserts shallow-to-deep and removes deep-to-shallow (higher index first within a
/// depth). Every other operation keeps its slot, and inserts and removes refill the slots
/// their kind occupied, so interleaving between kinds is unchanged.
pub fn sort_operations_for_execution(ops: &[Operation]) -> Vec<Operation> {
    let mut inserts: Vec<&Operation> = ops
        .iter()
        .filter(|op| op.kind() == OperationKind::InsertNode)
        .collect();
    inserts.sort_by_key(|op| op.path().map_or(0, <[usize]>::len));

    let mut removes: Vec<&Operation> = ops
        .iter()
        .filter(|op| op.kind() == OperationKind::RemoveNode)
        .collect();
    removes.sort_by(|a, b| {
        let a = a.path().unwrap_or_default();
        let b = b.path().unwrap_or_default();
        b.len().cmp(&a.len()).then_with(|| b.last().cmp(&a.last()))
    });

    let mut inserts = inserts.into_iter();
    let mut removes = removes.into_iter();
    ops.iter()
        .filter_map(|op| match op.kind() {
            OperationKind::InsertNode => inserts.next(),
            OperationKind::RemoveNode => removes.next(),
            _ => Some(op),
        })
        .cloned()
        .collect()
}

fn rebase_path(path: &[usize], preceding: &[Operation], target: OperationKind) -> Option<Path> {
    preceding
        .iter()
        .try_fold(path.to_vec(), |acc, op| transform_path(&acc, op, Some(target)))
}

/// Position of the reinsertion a `set_node` at `path` refers to, if the path was removed and
/// then reinserted at exactly the same path earlier in the batch.
fn reinsertion_anchor(preceding: &[Operation], path: &[usize]) -> Option<usize> {
    let anchor = preceding.iter().rposition(|op| {
        matches!(op, Operation::InsertNode { path: at, .. } if at.as_slice() == path)
    })?;
    preceding[..anchor]
        .iter()
        .any(|op| {
            matches!(op, Operation::RemoveNode { path: at, .. } if is_ancestor_or_equal(at, path))
        })
        .then_some(anchor)
}

/// Rebases every operation onto the tree shape produced by the operations before it.
///
/// Each path is folded through all strictly preceding operations using their original
/// paths, never the rebased ones. Operations whose path (or move destination) is
/// invalidated along the way are dropped.
pub fn transform_valid_operations(ops: &[Operation]) -> Vec<Operation> {
    let mut rebased_ops = Vec::with_capacity(ops.len());
    for (index, op) in ops.iter().enumerate() {
        let preceding = &ops[..index];
        let kind = op.kind();
        let rebased = match op {
            Operation::SetViewport { .. } | Operation::SetSelection { .. } => Some(op.clone()),
            Operation::SetNode { path, .. } => {
                let path = match reinsertion_anchor(preceding, path) {
                    Some(anchor) => {
                        rebase_path(path, &preceding[..anchor], OperationKind::InsertNode)
                            .and_then(|p| rebase_path(&p, &preceding[anchor + 1..], kind))
                    }
                    None => rebase_path(path, preceding, kind),
                };
                path.map(|p| with_path(op, p))
            }
            Operation::InsertNode { path, .. } | Operation::RemoveNode { path, .. } => {
                rebase_path(path, preceding, kind).map(|p| with_path(op, p))
            }
            Operation::MoveNode { path, new_path } => {
                match (
                    rebase_path(path, preceding, kind),
                    rebase_path(new_path, preceding, kind),
                ) {
                    (Some(path), Some(new_path)) => Some(Operation::MoveNode { path, new_path }),
                    _ => None,
                }
            }
        };
        match rebased {
            Some(op) => rebased_ops.push(op),
            None => tracing::debug!(
                index,
                kind = ?kind,
                "dropping operation invalidated while rebasing"
            ),
        }
    }
    rebased_ops
}

fn with_path(op: &Operation, path: Path) -> Operation {
    let mut op = op.clone();
    if let Some(slot) = op.path_mut() {
        *slot = path;
    }
    op
}

/// Filter, sort, then rebase a batch so it can be executed in one sequential pass.
pub fn preprocess_operations(ops: &[Operation]) -> Vec<Operation> {
    if ops.is_empty() {
        return Vec::new();
    }
    let filtered = filter_valid_operations(ops);
    if filtered.is_empty() {
        return filtered;
    }
    let sorted = sort_operations_for_execution(&filtered);
    let rebased = transform_valid_operations(&sorted);
    if rebased.len() != ops.len() {
        tracing::debug!(
            submitted = ops.len(),
            executable = rebased.len(),
            "preprocessing shrank the batch"
        );
    }
    rebased
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, Properties};

    fn el(id: &str) -> Element {
        Element::new(id, "shape")
    }

    fn set(path: Vec<usize>) -> Operation {
        Operation::set(path, Properties::new(), Properties::new())
    }

    #[test]
    fn predicates() {
        assert!(is_ancestor_path(&[0], &[0, 1]));
        assert!(!is_ancestor_path(&[0, 1], &[0, 1]));
        assert!(!is_ancestor_path(&[1], &[0, 1]));
        assert!(are_sibling_paths(&[0, 1], &[0, 4]));
        assert!(!are_sibling_paths(&[0, 1], &[1, 1]));
        assert!(!are_sibling_paths(&[0], &[0, 1]));
        assert!(paths_equal(&[2, 3], &[2, 3]));
        assert_eq!(parent_path(&[2, 3]), &[2]);
        assert!(parent_path(&[2]).is_empty());
    }

    #[test]
    fn lookup_by_path_and_id() {
        let tree = vec![el("a").with_children(vec![el("b"), el("c")]), el("d")];
        assert_eq!(get_element_by_path(&tree, &[0, 1]).map(|e| e.id.as_str()), Ok("c"));
        assert_eq!(
            get_element_by_path(&tree, &[0, 2]),
            Err(Error::PathNotFound(vec![0, 2]))
        );
        assert_eq!(get_element_by_path(&tree, &[]), Err(Error::PathNotFound(vec![])));
        assert_eq!(get_path_by_id(&tree, "c"), Some(vec![0, 1]));
        assert_eq!(get_path_by_element(&tree, &el("d")), Some(vec![1]));
        assert_eq!(get_path_by_id(&tree, "zz"), None);
    }

    #[test]
    fn insert_shifts_siblings_and_descendants() {
        let op = Operation::insert(vec![1], el("x"));
        assert_eq!(transform_path(&[0], &op, None), Some(vec![0]));
        assert_eq!(transform_path(&[1], &op, None), Some(vec![2]));
        assert_eq!(transform_path(&[3, 2], &op, None), Some(vec![4, 2]));

        let nested = Operation::insert(vec![0, 1], el("x"));
        assert_eq!(transform_path(&[0, 1, 5], &nested, None), Some(vec![0, 2, 5]));
        assert_eq!(transform_path(&[1, 1], &nested, None), Some(vec![1, 1]));
        assert_eq!(transform_path(&[0], &nested, None), Some(vec![0]));
    }

    #[test]
    fn remove_invalidates_subtree_and_closes_gap() {
        let op = Operation::remove(vec![1], el("x"));
        assert_eq!(transform_path(&[1], &op, Some(OperationKind::SetNode)), None);
        assert_eq!(transform_path(&[1, 0], &op, Some(OperationKind::SetNode)), None);
        assert_eq!(
            transform_path(&[1], &op, Some(OperationKind::InsertNode)),
            Some(vec![1])
        );
        assert_eq!(transform_path(&[2, 3], &op, None), Some(vec![1, 3]));
        assert_eq!(transform_path(&[0, 3], &op, None), Some(vec![0, 3]));
    }

    #[test]
    fn move_rewrites_prefix_and_shifts_neighbours() {
        let op = Operation::move_node(vec![1, 2], vec![3, 0]);
        assert_eq!(transform_path(&[1, 2], &op, None), Some(vec![3, 0]));
        assert_eq!(transform_path(&[1, 2, 0], &op, None), Some(vec![3, 0, 0]));
        assert_eq!(transform_path(&[1, 1], &op, None), Some(vec![1, 1]));
        assert_eq!(transform_path(&[1, 3], &op, None), Some(vec![1, 2]));
        assert_eq!(transform_path(&[3, 0], &op, None), Some(vec![3, 1]));

        let noop = Operation::move_node(vec![2], vec![2]);
        assert_eq!(transform_path(&[2], &noop, None), Some(vec![2]));
    }

    #[test]
    fn untransform_inverts_transform() {
        let ops = [
            Operation::insert(vec![1], el("x")),
            Operation::remove(vec![1], el("x")),
            Operation::move_node(vec![0, 2], vec![1]),
            Operation::move_node(vec![3], vec![0, 1]),
        ];
        let paths: [&[usize]; 6] = [&[0], &[1], &[2], &[0, 1], &[0, 3, 1], &[2, 0]];
        for op in &ops {
            for path in paths {
                if let Some(original) = untransform_path(path, op, Some(OperationKind::SetNode)) {
                    assert_eq!(
                        transform_path(&original, op, Some(OperationKind::SetNode)).as_deref(),
                        Some(path),
                        "{op:?} {path:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn filter_drops_work_under_removed_parents() {
        let ops = vec![
            Operation::remove(vec![0], el("a")),
            Operation::insert(vec![0, 1], el("x")),
            Operation::move_node(vec![1, 0], vec![0, 0]),
            set(vec![0, 2]),
            Operation::insert(vec![2, 1], el("y")),
        ];
        let kept = filter_valid_operations(&ops);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1], ops[4]);
    }

    #[test]
    fn only_earlier_removes_count() {
        let ops = vec![set(vec![0]), Operation::remove(vec![0], el("a"))];
        assert_eq!(filter_valid_operations(&ops).len(), 2);
    }

    #[test]
    fn sort_preserves_slots() {
        let ops = vec![
            Operation::insert(vec![0, 0], el("deep")),
            set(vec![5]),
            Operation::remove(vec![1], el("r1")),
            Operation::insert(vec![1], el("shallow")),
            Operation::remove(vec![2, 0], el("r2")),
        ];
        let sorted = sort_operations_for_execution(&ops);
        assert_eq!(sorted[0], ops[3]);
        assert_eq!(sorted[1], ops[1]);
        assert_eq!(sorted[2], ops[4]);
        assert_eq!(sorted[3], ops[0]);
        assert_eq!(sorted[4], ops[2]);
    }

    #[test]
    fn rebase_folds_over_original_paths() {
        let ops = vec![
            Operation::remove(vec![3], el("d")),
            Operation::remove(vec![1], el("b")),
            set(vec![4]),
        ];
        let rebased = transform_valid_operations(&ops);
        assert_eq!(rebased[2].path(), Some(&[2][..]));
    }
}
