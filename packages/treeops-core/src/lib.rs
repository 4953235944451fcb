#![forbid(unsafe_code)]
//! Tree-operation engine for whiteboard documents.
//! Computes keyed diffs between element trees, turns batches of path-addressed operations
//! into a sequential edit list (filter, sort, rebase), applies them to a copy of the board,
//! and inverts them for undo. Everything is synchronous and works on owned values; the host
//! document is only seen through the traits in [`traverse`].

pub mod apply;
pub mod diff;
pub mod element;
pub mod error;
pub mod ops;
pub mod path;
pub mod traverse;
pub mod undo;

#[cfg(feature = "serde")]
pub mod json;

pub use apply::{
    apply, apply_diff_operations, apply_operations, apply_to_children, ApplyOptions,
    ApplyOutcome, BoardState, ChangeMetadata,
};
pub use diff::{diff, diff_at, DiffCache, DEFAULT_CACHE_CAPACITY};
pub use element::{is_value_changed, Element, Properties, Value};
pub use error::{Error, Result};
pub use ops::{Operation, OperationKind, Path};
pub use path::{
    are_sibling_paths, filter_valid_operations, get_element_by_path, get_path_by_element,
    get_path_by_id, is_ancestor_path, parent_path, paths_equal, preprocess_operations,
    sort_operations_for_execution, transform_path, transform_valid_operations,
};
pub use traverse::{bfs, dfs, get_hit_elements, HitTest, TreeNode};
pub use undo::{invert_batch, inverse_operation, undo_batch};
