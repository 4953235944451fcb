use crate::apply::apply_diff_operations;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::ops::Operation;
use crate::path::preprocess_operations;

fn require_path(op: &Operation, path: &[usize]) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidOperation(format!(
            "{:?} without a tree path cannot be inverted",
            op.kind()
        )));
    }
    Ok(())
}

/// The operation that exactly undoes `op` when executed right after it.
///
/// A `set_viewport` with one side missing inverts to an update that re-applies the side that
/// is present.
pub fn inverse_operation(op: &Operation) -> Result<Operation> {
    match op {
        Operation::InsertNode { path, node } => {
            require_path(op, path)?;
            Ok(Operation::remove(path.clone(), node.clone()))
        }
        Operation::RemoveNode { path, node } => {
            require_path(op, path)?;
            Ok(Operation::insert(path.clone(), node.clone()))
        }
        Operation::MoveNode { path, new_path } => {
            require_path(op, path)?;
            require_path(op, new_path)?;
            Ok(Operation::move_node(new_path.clone(), path.clone()))
        }
        Operation::SetNode {
            path,
            properties,
            new_properties,
        } => {
            require_path(op, path)?;
            Ok(Operation::set(
                path.clone(),
                new_properties.clone(),
                properties.clone(),
            ))
        }
        Operation::SetSelection {
            properties,
            new_properties,
        } => Ok(Operation::set_selection(
            new_properties.clone(),
            properties.clone(),
        )),
        Operation::SetViewport {
            properties,
            new_properties,
        } => match (properties, new_properties) {
            (Some(_), Some(_)) | (None, None) => Ok(Operation::set_viewport(
                new_properties.clone(),
                properties.clone(),
            )),
            (Some(present), None) | (None, Some(present)) => Ok(Operation::set_viewport(
                Some(present.clone()),
                Some(present.clone()),
            )),
        },
    }
}

/// Undo list for a batch: the preprocessed batch, inverted operation by operation, in
/// reverse. The result is sequential and must be executed without preprocessing.
pub fn invert_batch(ops: &[Operation]) -> Result<Vec<Operation>> {
    let mut inverted = preprocess_operations(ops)
        .iter()
        .map(inverse_operation)
        .collect::<Result<Vec<_>>>()?;
    inverted.reverse();
    Ok(inverted)
}

/// Reverts the effect `ops` had when applied to the tree that is now `children`.
pub fn undo_batch(children: &[Element], ops: &[Operation]) -> Result<Vec<Element>> {
    let inverted = invert_batch(ops)?;
    Ok(apply_diff_operations(children, &inverted))
}
