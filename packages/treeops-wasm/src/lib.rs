#![forbid(unsafe_code)]
//! WASM-friendly bridge for the tree-operation engine.
//! Boards, elements and operations cross the boundary as plain JS values shaped like their
//! JSON form (`{ type: "insert_node", path, node }`, `{ id, type, ...attributes, children }`).

use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use treeops_core::json::operation_from_value;
use treeops_core::{
    ApplyOptions, BoardState, DiffCache, Element, Operation, DEFAULT_CACHE_CAPACITY,
};
use wasm_bindgen::prelude::*;

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn elements_from_js(value: JsValue) -> Result<Vec<Element>, JsValue> {
    from_value(value).map_err(js_error)
}

/// Operations go through `serde_json` first so unknown kinds surface as
/// "unsupported operation" rather than a generic decode failure.
fn ops_from_js(value: JsValue) -> Result<Vec<Operation>, JsValue> {
    let raw: Vec<serde_json::Value> = from_value(value).map_err(js_error)?;
    raw.into_iter()
        .map(|op| operation_from_value(op).map_err(js_error))
        .collect()
}

/// Plain objects instead of `Map`s, so attribute bags read like JSON on the JS side.
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(js_error)
}

fn ops_to_js(ops: &[Operation]) -> Result<JsValue, JsValue> {
    to_js(ops)
}

#[wasm_bindgen]
pub fn diff(old: JsValue, new: JsValue) -> Result<JsValue, JsValue> {
    let old = elements_from_js(old)?;
    let new = elements_from_js(new)?;
    ops_to_js(&treeops_core::diff(&old, &new))
}

#[wasm_bindgen]
pub fn apply(children: JsValue, ops: JsValue) -> Result<JsValue, JsValue> {
    let children = elements_from_js(children)?;
    let ops = ops_from_js(ops)?;
    to_js(&treeops_core::apply(&children, &ops))
}

/// Returns `{ state, metadata }`. `options` may be `undefined`.
#[wasm_bindgen(js_name = applyOperations)]
pub fn apply_operations(
    state: JsValue,
    ops: JsValue,
    options: JsValue,
) -> Result<JsValue, JsValue> {
    let state: BoardState = from_value(state).map_err(js_error)?;
    let ops = ops_from_js(ops)?;
    let options: ApplyOptions = if options.is_undefined() || options.is_null() {
        ApplyOptions::default()
    } else {
        from_value(options).map_err(js_error)?
    };
    let outcome = treeops_core::apply_operations(&state, &ops, &options);
    to_js(&outcome)
}

#[wasm_bindgen(js_name = preprocessOperations)]
pub fn preprocess_operations(ops: JsValue) -> Result<JsValue, JsValue> {
    let ops = ops_from_js(ops)?;
    ops_to_js(&treeops_core::preprocess_operations(&ops))
}

#[wasm_bindgen(js_name = inverseOperation)]
pub fn inverse_operation(op: JsValue) -> Result<JsValue, JsValue> {
    let raw: serde_json::Value = from_value(op).map_err(js_error)?;
    let op = operation_from_value(raw).map_err(js_error)?;
    let inverse = treeops_core::inverse_operation(&op).map_err(js_error)?;
    to_js(&inverse)
}

/// Undo list for a batch; replay it with `skipPreprocessing: true`.
#[wasm_bindgen(js_name = invertBatch)]
pub fn invert_batch(ops: JsValue) -> Result<JsValue, JsValue> {
    let ops = ops_from_js(ops)?;
    let inverted = treeops_core::invert_batch(&ops).map_err(js_error)?;
    ops_to_js(&inverted)
}

/// A diff entry point with its own memo, for hosts that diff the same boards repeatedly.
#[wasm_bindgen]
pub struct DiffSession {
    cache: DiffCache,
}

#[wasm_bindgen]
impl DiffSession {
    #[wasm_bindgen(constructor)]
    pub fn new(capacity: Option<u32>) -> DiffSession {
        let capacity = capacity.map_or(DEFAULT_CACHE_CAPACITY, |c| c as usize);
        DiffSession {
            cache: DiffCache::with_capacity(capacity),
        }
    }

    pub fn diff(&mut self, old: JsValue, new: JsValue) -> Result<JsValue, JsValue> {
        let old = elements_from_js(old)?;
        let new = elements_from_js(new)?;
        ops_to_js(&self.cache.diff(&old, &new))
    }

    #[wasm_bindgen(js_name = diffAt)]
    pub fn diff_at(
        &mut self,
        old: JsValue,
        new: JsValue,
        base_path: Vec<u32>,
    ) -> Result<JsValue, JsValue> {
        let old = elements_from_js(old)?;
        let new = elements_from_js(new)?;
        let base: Vec<usize> = base_path.into_iter().map(|i| i as usize).collect();
        ops_to_js(&self.cache.diff_at(&old, &new, &base))
    }

    #[wasm_bindgen(js_name = cacheSize)]
    pub fn cache_size(&self) -> u32 {
        self.cache.len() as u32
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
