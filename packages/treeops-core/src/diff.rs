//! Keyed tree diff.
//!
//! Children are matched per sibling list by `id`. The diff first plans a sequential edit
//! script: removals deep-first, per-level reorders, property updates, then insertions
//! shallow-first. It then rewrites every path of that script into the coordinates of the
//! batch convention, so that rebasing a path over the operations before it yields the
//! sequential path again. A planned batch is checked by applying it; when it does not
//! rebuild the target, the diff replaces the whole list instead.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use crate::apply::apply;
use crate::element::{
    is_value_changed, present_attributes, Element, Properties, Value, CHILDREN_KEY, ID_KEY,
    TYPE_KEY,
};
use crate::ops::{Operation, OperationKind, Path};
use crate::path::{transform_path, untransform_path};

/// Number of memoized results a [`DiffCache`] keeps by default.
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Operations that turn `old` into `new`.
pub fn diff(old: &[Element], new: &[Element]) -> Vec<Operation> {
    diff_at(old, new, &[])
}

/// Like [`diff`], for child lists that live under `base_path`; every emitted path is
/// prefixed with it.
pub fn diff_at(old: &[Element], new: &[Element], base_path: &[usize]) -> Vec<Operation> {
    if std::ptr::eq(old, new) || (old.is_empty() && new.is_empty()) {
        return Vec::new();
    }

    let batch = planned(old, new).unwrap_or_else(|| {
        tracing::debug!(
            old = old.len(),
            new = new.len(),
            "edit script has no batch form, replacing the list"
        );
        replace_all(old, new)
    });
    batch
        .into_iter()
        .map(|op| op.with_base_path(base_path))
        .collect()
}

/// The minimal batch, when every step of the edit script can be expressed and the result
/// rebuilds `new`.
fn planned(old: &[Element], new: &[Element]) -> Option<Vec<Operation>> {
    let mut script = Script::default();
    script.plan(old, new, &[], &[], &[]);
    [RunOrder::LastFirst, RunOrder::FirstFirst]
        .into_iter()
        .find_map(|order| {
            let batch = compact(script.to_batch(order)?);
            (apply(old, &batch) == new).then_some(batch)
        })
}

/// Removes every old element, then inserts the new ones back to front at the start of the
/// list. The inserts sit just past the removed range, which every removal shifts back to 0.
fn replace_all(old: &[Element], new: &[Element]) -> Vec<Operation> {
    let removes = old
        .iter()
        .enumerate()
        .rev()
        .map(|(i, element)| Operation::remove(vec![i], element.clone()));
    if old.is_empty() {
        return new
            .iter()
            .map(|element| Operation::insert(vec![0], element.clone()))
            .collect();
    }
    let inserts = new
        .iter()
        .rev()
        .map(|element| Operation::insert(vec![old.len()], element.clone()));
    removes.chain(inserts).collect()
}

fn child_path(parent: &[usize], index: usize) -> Path {
    let mut path = Vec::with_capacity(parent.len() + 1);
    path.extend_from_slice(parent);
    path.push(index);
    path
}

/// Id-based matching of one old and one new sibling list. Only the first occurrence of an
/// id takes part; later duplicates count as unmatched.
struct Pairing {
    old_to_new: Vec<Option<usize>>,
    new_to_old: Vec<Option<usize>>,
}

impl Pairing {
    fn new(old: &[Element], new: &[Element]) -> Self {
        let old_ids = first_index_by_id(old);
        let new_ids = first_index_by_id(new);
        Self {
            old_to_new: old
                .iter()
                .enumerate()
                .map(|(i, e)| counterpart(&old_ids, &new_ids, i, &e.id))
                .collect(),
            new_to_old: new
                .iter()
                .enumerate()
                .map(|(j, e)| counterpart(&new_ids, &old_ids, j, &e.id))
                .collect(),
        }
    }
}

fn counterpart(
    own: &HashMap<&str, usize>,
    other: &HashMap<&str, usize>,
    index: usize,
    id: &str,
) -> Option<usize> {
    if own.get(id) != Some(&index) {
        return None;
    }
    other.get(id).copied()
}

fn first_index_by_id(list: &[Element]) -> HashMap<&str, usize> {
    let mut ids = HashMap::with_capacity(list.len());
    for (index, element) in list.iter().enumerate() {
        ids.entry(element.id.as_str()).or_insert(index);
    }
    ids
}

/// Own-property difference of a matched pair, excluding children. Returns the prior and the
/// new values of every changed key; a key that disappeared maps to `Null` on the new side.
fn property_changes(old: &Element, new: &Element) -> Option<(Properties, Properties)> {
    let mut before = Properties::new();
    let mut after = Properties::new();

    if old.element_type != new.element_type {
        before.insert(TYPE_KEY.to_string(), Value::String(old.element_type.clone()));
        after.insert(TYPE_KEY.to_string(), Value::String(new.element_type.clone()));
    }

    let keys: BTreeSet<&String> = old
        .attributes
        .keys()
        .chain(new.attributes.keys())
        .filter(|k| !matches!(k.as_str(), ID_KEY | TYPE_KEY | CHILDREN_KEY))
        .collect();
    for key in keys {
        let (prior, next) = (old.attributes.get(key), new.attributes.get(key));
        if is_value_changed(prior, next) {
            before.insert(key.clone(), prior.cloned().unwrap_or_default());
            after.insert(key.clone(), next.cloned().unwrap_or_default());
        }
    }

    (!after.is_empty()).then_some((before, after))
}

/// Membership mask of one longest strictly increasing subsequence.
fn longest_increasing_run(seq: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }
    let mut keep = vec![false; seq.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        keep[i] = true;
        cursor = prev[i];
    }
    keep
}

/// New children that sit next to each other in the target list.
struct InsertRun {
    /// Final path of the parent.
    parent: Path,
    /// Survivors in front of the run.
    slot: usize,
    nodes: Vec<Element>,
}

impl InsertRun {
    /// Front to back, each node right after the previous one.
    fn forward(&self, at: usize) -> Vec<Operation> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| Operation::insert(child_path(&self.parent, at + i), node.clone()))
            .collect()
    }

    /// Back to front, every node at the head of the run.
    fn backward(&self, at: usize) -> Vec<Operation> {
        self.nodes
            .iter()
            .rev()
            .map(|node| Operation::insert(child_path(&self.parent, at), node.clone()))
            .collect()
    }
}

/// Order in which the insert runs of one sibling list go in.
#[derive(Clone, Copy, Debug)]
enum RunOrder {
    /// Last run first; no run shifts the slot of a run still to come.
    LastFirst,
    /// First run first; each slot also counts the nodes of the runs before it.
    FirstFirst,
}

/// The sequential edit script, phase by phase.
#[derive(Default)]
struct Script {
    removes: Vec<Operation>,
    moves: Vec<Operation>,
    sets: Vec<Operation>,
    runs: Vec<InsertRun>,
}

impl Script {
    /// `old_parent` addresses the level in the old tree, `kept_parent` in the tree after
    /// removals and reorders of the levels above, `final_parent` in the new tree.
    fn plan(
        &mut self,
        old: &[Element],
        new: &[Element],
        old_parent: &[usize],
        kept_parent: &[usize],
        final_parent: &[usize],
    ) {
        let pairing = Pairing::new(old, new);

        for (i, matched) in pairing.old_to_new.iter().enumerate() {
            if matched.is_none() {
                self.removes
                    .push(Operation::remove(child_path(old_parent, i), old[i].clone()));
            }
        }

        self.plan_moves(&pairing, kept_parent);

        let mut runs: Vec<InsertRun> = Vec::new();
        let mut rank = 0;
        for (j, matched) in pairing.new_to_old.iter().enumerate() {
            let Some(i) = *matched else {
                match runs.last_mut() {
                    Some(run) if run.slot == rank => run.nodes.push(new[j].clone()),
                    _ => runs.push(InsertRun {
                        parent: final_parent.to_vec(),
                        slot: rank,
                        nodes: vec![new[j].clone()],
                    }),
                }
                continue;
            };
            let (before, after) = (&old[i], &new[j]);
            let kept_path = child_path(kept_parent, rank);
            if let Some((properties, new_properties)) = property_changes(before, after) {
                self.sets
                    .push(Operation::set(kept_path.clone(), properties, new_properties));
            }
            self.plan(
                &before.children,
                &after.children,
                &child_path(old_parent, i),
                &kept_path,
                &child_path(final_parent, j),
            );
            rank += 1;
        }

        self.runs.extend(runs);
    }

    /// Reorders the surviving children of one level. Elements on a longest increasing run
    /// stay; the others are moved, highest target first, right in front of their successor.
    fn plan_moves(&mut self, pairing: &Pairing, parent: &[usize]) {
        let mut current: Vec<usize> = pairing.old_to_new.iter().flatten().copied().collect();
        let stays = longest_increasing_run(&current);
        let mut pending: Vec<usize> = current
            .iter()
            .zip(&stays)
            .filter(|(_, stays)| !**stays)
            .map(|(target, _)| *target)
            .collect();
        pending.sort_unstable_by(|a, b| b.cmp(a));

        let mut in_new_order = current.clone();
        in_new_order.sort_unstable();

        for target in pending {
            let Some(from) = current.iter().position(|&t| t == target) else {
                continue;
            };
            current.remove(from);
            let to = in_new_order
                .iter()
                .find(|&&t| t > target)
                .and_then(|successor| current.iter().position(|t| t == successor))
                .unwrap_or(current.len());
            current.insert(to, target);
            if from != to {
                self.moves.push(Operation::move_node(
                    child_path(parent, from),
                    child_path(parent, to),
                ));
            }
        }
    }

    /// Sequential script rewritten into batch coordinates, or `None` when some step has no
    /// batch path that rebases onto it.
    fn to_batch(&self, order: RunOrder) -> Option<Vec<Operation>> {
        let mut removes = self.removes.clone();
        removes.sort_by(|a, b| {
            let a = a.path().unwrap_or_default();
            let b = b.path().unwrap_or_default();
            b.len().cmp(&a.len()).then_with(|| b.last().cmp(&a.last()))
        });

        let mut batch: Vec<Operation> = Vec::new();
        let steps = removes
            .into_iter()
            .chain(self.moves.iter().cloned())
            .chain(self.sets.iter().cloned());
        for step in steps {
            let op = express(step, &batch)?;
            batch.push(op);
        }

        // A run whose first node rebases to a slot at or before its own slot can go in
        // front to back; otherwise that slot is taken by the next node, and back to front
        // is the order that resolves.
        for (run, at) in self.ordered_runs(order) {
            if !place(run.forward(at), &mut batch) && !place(run.backward(at), &mut batch) {
                tracing::debug!(
                    parent = ?run.parent,
                    slot = run.slot,
                    ?order,
                    "insert run has no batch form"
                );
                return None;
            }
        }
        Some(batch)
    }

    /// Runs shallow-first, each with the slot it is inserted at.
    fn ordered_runs(&self, order: RunOrder) -> Vec<(&InsertRun, usize)> {
        let mut ordered: Vec<(&InsertRun, usize)> = Vec::with_capacity(self.runs.len());
        let mut rest = self.runs.as_slice();
        while let Some(first) = rest.first() {
            let len = rest.iter().take_while(|run| run.parent == first.parent).count();
            let (level, tail) = rest.split_at(len);
            match order {
                RunOrder::LastFirst => {
                    ordered.extend(level.iter().rev().map(|run| (run, run.slot)));
                }
                RunOrder::FirstFirst => {
                    let mut placed = 0;
                    for run in level {
                        ordered.push((run, run.slot + placed));
                        placed += run.nodes.len();
                    }
                }
            }
            rest = tail;
        }
        ordered.sort_by_key(|(run, _)| run.parent.len());
        ordered
    }
}

/// Appends `steps` to `batch` in batch coordinates. Leaves `batch` untouched and returns
/// false if any of them cannot be expressed.
fn place(steps: Vec<Operation>, batch: &mut Vec<Operation>) -> bool {
    let mark = batch.len();
    for step in steps {
        match express(step, batch) {
            Some(op) => batch.push(op),
            None => {
                batch.truncate(mark);
                return false;
            }
        }
    }
    true
}

fn express(step: Operation, preceding: &[Operation]) -> Option<Operation> {
    match step {
        Operation::MoveNode { path, new_path } => {
            let kind = Some(OperationKind::MoveNode);
            Some(Operation::MoveNode {
                path: original_path(&path, preceding, kind)?,
                new_path: original_path(&new_path, preceding, kind)?,
            })
        }
        mut op => {
            let kind = Some(op.kind());
            if let Some(slot) = op.path_mut() {
                *slot = original_path(slot, preceding, kind)?;
            }
            Some(op)
        }
    }
}

/// Walks `path` back through `preceding`, newest first, to the path that rebases onto it.
fn original_path(
    path: &[usize],
    preceding: &[Operation],
    kind: Option<OperationKind>,
) -> Option<Path> {
    let mut current = path.to_vec();
    for op in preceding.iter().rev() {
        if !op.kind().is_structural() {
            continue;
        }
        current = untransform_path(&current, op, kind)
            .filter(|candidate| transform_path(candidate, op, kind).as_ref() == Some(&current))?;
    }
    Some(current)
}

/// Merges consecutive `set_node`s on one path and drops moves that go nowhere.
fn compact(batch: Vec<Operation>) -> Vec<Operation> {
    let mut out: Vec<Operation> = Vec::with_capacity(batch.len());
    for op in batch {
        if let Operation::MoveNode { path, new_path } = &op {
            if path == new_path {
                continue;
            }
        }
        if let (
            Some(Operation::SetNode {
                path: last_path,
                properties: last_properties,
                new_properties: last_new,
            }),
            Operation::SetNode {
                path,
                properties,
                new_properties,
            },
        ) = (out.last_mut(), &op)
        {
            if last_path == path {
                for (key, value) in properties {
                    last_properties
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
                last_new.extend(new_properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                continue;
            }
        }
        out.push(op);
    }
    out
}

/// Bounded memo of diff results, owned by the caller.
///
/// Keys cover the full content of both inputs and the base path, and a hit is compared
/// against the stored inputs before it is returned, so the cache never changes a result.
/// When full, the oldest half of the entries is evicted.
#[derive(Debug)]
pub struct DiffCache {
    capacity: usize,
    entries: HashMap<u64, CachedDiff>,
    order: VecDeque<u64>,
}

#[derive(Debug)]
struct CachedDiff {
    old: Vec<Element>,
    new: Vec<Element>,
    base_path: Path,
    ops: Vec<Operation>,
}

impl Default for DiffCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// A capacity of zero disables memoization.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn diff(&mut self, old: &[Element], new: &[Element]) -> Vec<Operation> {
        self.diff_at(old, new, &[])
    }

    pub fn diff_at(
        &mut self,
        old: &[Element],
        new: &[Element],
        base_path: &[usize],
    ) -> Vec<Operation> {
        if self.capacity == 0 || std::ptr::eq(old, new) || (old.is_empty() && new.is_empty()) {
            return diff_at(old, new, base_path);
        }

        let key = fingerprint(old, new, base_path);
        if let Some(hit) = self.entries.get(&key) {
            if hit.old.as_slice() == old
                && hit.new.as_slice() == new
                && hit.base_path.as_slice() == base_path
            {
                tracing::debug!(key, "diff cache hit");
                return hit.ops.clone();
            }
        }

        let ops = diff_at(old, new, base_path);
        self.store(
            key,
            CachedDiff {
                old: old.to_vec(),
                new: new.to_vec(),
                base_path: base_path.to_vec(),
                ops: ops.clone(),
            },
        );
        ops
    }

    fn store(&mut self, key: u64, entry: CachedDiff) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict_oldest_half();
        }
        if self.entries.insert(key, entry).is_none() {
            self.order.push_back(key);
        }
    }

    fn evict_oldest_half(&mut self) {
        let count = (self.entries.len() / 2).max(1).min(self.order.len());
        for key in self.order.drain(..count) {
            self.entries.remove(&key);
        }
        tracing::debug!(evicted = count, remaining = self.entries.len(), "diff cache eviction");
    }
}

fn fingerprint(old: &[Element], new: &[Element], base_path: &[usize]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_elements(old, &mut hasher);
    hash_elements(new, &mut hasher);
    base_path.hash(&mut hasher);
    hasher.finish()
}

fn hash_elements<H: Hasher>(list: &[Element], state: &mut H) {
    list.len().hash(state);
    for element in list {
        element.id.hash(state);
        element.element_type.hash(state);
        present_attributes(&element.attributes).count().hash(state);
        for (key, value) in present_attributes(&element.attributes) {
            key.hash(state);
            hash_value(value, state);
        }
        hash_elements(&element.children, state);
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Number(n) => {
            2u8.hash(state);
            n.to_bits().hash(state);
        }
        Value::String(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            for (key, item) in map {
                key.hash(state);
                hash_value(item, state);
            }
        }
    }
}
