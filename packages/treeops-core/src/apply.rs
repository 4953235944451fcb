use std::borrow::Cow;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::element::{merge_side_channel, Element, Properties};
use crate::ops::Operation;
use crate::path::{
    children_at_mut, element_at_mut, filter_valid_operations, sort_operations_for_execution,
    transform_valid_operations,
};
use crate::traverse::{dfs, TreeNode};

/// The board contents an executor works on. Viewport and selection are optional side
/// channels; updates to a missing channel are ignored.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BoardState {
    pub children: Vec<Element>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub viewport: Option<Properties>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub selection: Option<Properties>,
}

impl BoardState {
    pub fn new(children: Vec<Element>) -> Self {
        Self {
            children,
            viewport: None,
            selection: None,
        }
    }

    pub fn with_viewport(mut self, viewport: Properties) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_selection(mut self, selection: Properties) -> Self {
        self.selection = Some(selection);
        self
    }
}

/// The board is the root container: it owns the top-level elements but is not one.
impl TreeNode for BoardState {
    fn children(&self) -> &[Element] {
        &self.children
    }

    fn as_element(&self) -> Option<&Element> {
        None
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ApplyOptions {
    /// Blocks tree and selection changes. Viewport changes still apply.
    pub readonly: bool,
    pub skip_viewport_operations: bool,
    pub skip_selection_operations: bool,
    /// Filter and sort, but execute the sorted paths as given.
    pub skip_path_transform: bool,
    /// Execute the batch verbatim, for lists that are already sequential.
    pub skip_preprocessing: bool,
}

impl ApplyOptions {
    pub fn readonly() -> Self {
        Self {
            readonly: true,
            ..Self::default()
        }
    }

    pub fn verbatim() -> Self {
        Self {
            skip_preprocessing: true,
            ..Self::default()
        }
    }

    fn tree_only(self) -> Self {
        Self {
            skip_viewport_operations: true,
            skip_selection_operations: true,
            ..self
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ChangeMetadata {
    /// Targets of `set_node` together with their descendants, after the update.
    pub changed_elements: Vec<Element>,
    pub removed_elements: Vec<Element>,
    pub has_changes: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ApplyOutcome {
    pub state: BoardState,
    pub metadata: ChangeMetadata,
}

fn prepare<'a>(ops: &'a [Operation], options: &ApplyOptions) -> Cow<'a, [Operation]> {
    if options.skip_preprocessing {
        return Cow::Borrowed(ops);
    }
    let sorted = sort_operations_for_execution(&filter_valid_operations(ops));
    if options.skip_path_transform {
        Cow::Owned(sorted)
    } else {
        Cow::Owned(transform_valid_operations(&sorted))
    }
}

/// Applies a batch to a copy of `state`; the input is never touched.
///
/// Unless disabled through `options`, the batch is filtered, sorted and rebased first. An
/// operation whose path does not resolve is skipped with a warning and the rest of the
/// batch still applies.
pub fn apply_operations(
    state: &BoardState,
    ops: &[Operation],
    options: &ApplyOptions,
) -> ApplyOutcome {
    execute(state.clone(), ops, options)
}

/// Tree-only form of [`apply_operations`]: viewport and selection updates are ignored.
pub fn apply_to_children(
    children: &[Element],
    ops: &[Operation],
    options: &ApplyOptions,
) -> Vec<Element> {
    let state = BoardState::new(children.to_vec());
    execute(state, ops, &options.tree_only()).state.children
}

pub fn apply(children: &[Element], ops: &[Operation]) -> Vec<Element> {
    if ops.is_empty() {
        return children.to_vec();
    }
    apply_to_children(children, ops, &ApplyOptions::default())
}

/// Runs an already sequential list, such as an undo list, exactly as given.
pub fn apply_diff_operations(children: &[Element], ops: &[Operation]) -> Vec<Element> {
    apply_to_children(children, ops, &ApplyOptions::verbatim())
}

fn execute(mut state: BoardState, ops: &[Operation], options: &ApplyOptions) -> ApplyOutcome {
    let mut metadata = ChangeMetadata::default();
    if ops.is_empty() {
        return ApplyOutcome { state, metadata };
    }

    let prepared = prepare(ops, options);
    for (index, op) in prepared.iter().enumerate() {
        let applied = match op {
            Operation::SetNode {
                path,
                new_properties,
                ..
            } => {
                if options.readonly {
                    continue;
                }
                match element_at_mut(&mut state.children, path) {
                    Some(element) => {
                        element.merge_properties(new_properties);
                        let changed = &mut metadata.changed_elements;
                        dfs(
                            &*element,
                            &mut |e: &Element| {
                                changed.push(e.clone());
                                false
                            },
                            false,
                        );
                        true
                    }
                    None => false,
                }
            }
            Operation::InsertNode { path, node } => {
                if options.readonly {
                    continue;
                }
                insert_at(&mut state.children, path, node.clone()).is_ok()
            }
            Operation::RemoveNode { path, .. } => {
                if options.readonly {
                    continue;
                }
                match remove_at(&mut state.children, path) {
                    Some(removed) => {
                        metadata.removed_elements.push(removed);
                        true
                    }
                    None => false,
                }
            }
            Operation::MoveNode { path, new_path } => {
                if options.readonly {
                    continue;
                }
                move_subtree(&mut state.children, path, new_path)
            }
            Operation::SetViewport { new_properties, .. } => {
                if options.skip_viewport_operations {
                    continue;
                }
                match (state.viewport.as_mut(), new_properties) {
                    (Some(viewport), Some(properties)) => {
                        merge_side_channel(viewport, properties);
                        true
                    }
                    _ => continue,
                }
            }
            Operation::SetSelection { new_properties, .. } => {
                if options.readonly || options.skip_selection_operations {
                    continue;
                }
                match (state.selection.as_mut(), new_properties) {
                    (Some(selection), Some(properties)) => {
                        merge_side_channel(selection, properties);
                        true
                    }
                    _ => continue,
                }
            }
        };

        if applied {
            metadata.has_changes = true;
        } else {
            tracing::warn!(
                index,
                kind = ?op.kind(),
                path = ?op.path(),
                "skipping operation whose path does not resolve"
            );
        }
    }

    ApplyOutcome { state, metadata }
}

/// Inserts `node` at `path`, handing the node back if the slot does not exist.
fn insert_at(children: &mut Vec<Element>, path: &[usize], node: Element) -> Result<(), Element> {
    let Some((&index, parent)) = path.split_last() else {
        return Err(node);
    };
    match children_at_mut(children, parent) {
        Some(siblings) if index <= siblings.len() => {
            siblings.insert(index, node);
            Ok(())
        }
        _ => Err(node),
    }
}

fn remove_at(children: &mut Vec<Element>, path: &[usize]) -> Option<Element> {
    let (&index, parent) = path.split_last()?;
    let siblings = children_at_mut(children, parent)?;
    (index < siblings.len()).then(|| siblings.remove(index))
}

/// Detaches the subtree at `path` and reinserts it at `new_path`, which addresses the tree
/// with the subtree already detached. A destination that does not resolve puts the subtree
/// back where it was.
fn move_subtree(children: &mut Vec<Element>, path: &[usize], new_path: &[usize]) -> bool {
    let Some(node) = remove_at(children, path) else {
        return false;
    };
    match insert_at(children, new_path, node) {
        Ok(()) => true,
        Err(node) => {
            if insert_at(children, path, node).is_err() {
                tracing::warn!(?path, "could not restore node after a failed move");
            }
            false
        }
    }
}
