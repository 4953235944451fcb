use crate::element::{Element, Properties};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Root-relative child indices. `path[0]` indexes the root's children; the root itself has
/// no path.
pub type Path = Vec<usize>;

/// Field-less discriminant of [`Operation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OperationKind {
    InsertNode,
    RemoveNode,
    SetNode,
    MoveNode,
    SetViewport,
    SetSelection,
}

impl OperationKind {
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            OperationKind::InsertNode | OperationKind::RemoveNode | OperationKind::MoveNode
        )
    }
}

/// One atomic tree or side-channel mutation.
///
/// Paths in a batch are expressed against the snapshot the batch was computed from, not
/// adjusted for each other; see [`crate::path::preprocess_operations`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")
)]
pub enum Operation {
    InsertNode {
        path: Path,
        node: Element,
    },
    /// `node` is carried for inversion and metadata; the target is located by `path`.
    RemoveNode {
        path: Path,
        node: Element,
    },
    /// `properties` holds the prior values, `new_properties` the values to merge. A `Null`
    /// in `new_properties` deletes the attribute.
    SetNode {
        path: Path,
        properties: Properties,
        new_properties: Properties,
    },
    /// `new_path` is where the node rests once moved: the insertion point in the tree
    /// with the subtree already detached.
    MoveNode {
        path: Path,
        new_path: Path,
    },
    SetViewport {
        #[cfg_attr(feature = "serde", serde(default))]
        properties: Option<Properties>,
        #[cfg_attr(feature = "serde", serde(default))]
        new_properties: Option<Properties>,
    },
    SetSelection {
        #[cfg_attr(feature = "serde", serde(default))]
        properties: Option<Properties>,
        #[cfg_attr(feature = "serde", serde(default))]
        new_properties: Option<Properties>,
    },
}

impl Operation {
    pub fn insert(path: Path, node: Element) -> Self {
        Operation::InsertNode { path, node }
    }

    pub fn remove(path: Path, node: Element) -> Self {
        Operation::RemoveNode { path, node }
    }

    pub fn set(path: Path, properties: Properties, new_properties: Properties) -> Self {
        Operation::SetNode {
            path,
            properties,
            new_properties,
        }
    }

    pub fn move_node(path: Path, new_path: Path) -> Self {
        Operation::MoveNode { path, new_path }
    }

    pub fn set_viewport(
        properties: Option<Properties>,
        new_properties: Option<Properties>,
    ) -> Self {
        Operation::SetViewport {
            properties,
            new_properties,
        }
    }

    pub fn set_selection(
        properties: Option<Properties>,
        new_properties: Option<Properties>,
    ) -> Self {
        Operation::SetSelection {
            properties,
            new_properties,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::InsertNode { .. } => OperationKind::InsertNode,
            Operation::RemoveNode { .. } => OperationKind::RemoveNode,
            Operation::SetNode { .. } => OperationKind::SetNode,
            Operation::MoveNode { .. } => OperationKind::MoveNode,
            Operation::SetViewport { .. } => OperationKind::SetViewport,
            Operation::SetSelection { .. } => OperationKind::SetSelection,
        }
    }

    /// Tree path the operation addresses; `None` for side-channel updates.
    pub fn path(&self) -> Option<&[usize]> {
        match self {
            Operation::InsertNode { path, .. }
            | Operation::RemoveNode { path, .. }
            | Operation::SetNode { path, .. }
            | Operation::MoveNode { path, .. } => Some(path),
            Operation::SetViewport { .. } | Operation::SetSelection { .. } => None,
        }
    }

    pub fn new_path(&self) -> Option<&[usize]> {
        match self {
            Operation::MoveNode { new_path, .. } => Some(new_path),
            _ => None,
        }
    }

    pub(crate) fn path_mut(&mut self) -> Option<&mut Path> {
        match self {
            Operation::InsertNode { path, .. }
            | Operation::RemoveNode { path, .. }
            | Operation::SetNode { path, .. }
            | Operation::MoveNode { path, .. } => Some(path),
            Operation::SetViewport { .. } | Operation::SetSelection { .. } => None,
        }
    }

    /// Prefixes every tree path of the operation with `base`.
    pub fn with_base_path(mut self, base: &[usize]) -> Self {
        if base.is_empty() {
            return self;
        }
        if let Some(path) = self.path_mut() {
            path.splice(0..0, base.iter().copied());
        }
        if let Operation::MoveNode { new_path, .. } = &mut self {
            new_path.splice(0..0, base.iter().copied());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_prefixes_both_move_paths() {
        let op = Operation::move_node(vec![2], vec![0]).with_base_path(&[1, 3]);
        assert_eq!(op.path(), Some(&[1, 3, 2][..]));
        assert_eq!(op.new_path(), Some(&[1, 3, 0][..]));
        assert_eq!(op.kind(), OperationKind::MoveNode);
    }

    #[test]
    fn side_channels_have_no_path() {
        let op = Operation::set_viewport(None, Some(Properties::new()));
        assert!(op.path().is_none());
        assert!(!op.kind().is_structural());
    }
}
