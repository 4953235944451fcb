use std::collections::VecDeque;

use crate::element::Element;

/// Anything that owns a child list of elements.
///
/// The root container of a board is a `TreeNode` too, but it is not an element: it reports
/// `None` from [`TreeNode::as_element`] and is never handed to visitors.
pub trait TreeNode {
    fn children(&self) -> &[Element];

    fn as_element(&self) -> Option<&Element>;

    fn is_board(&self) -> bool {
        self.as_element().is_none()
    }
}

impl TreeNode for Element {
    fn children(&self) -> &[Element] {
        &self.children
    }

    fn as_element(&self) -> Option<&Element> {
        Some(self)
    }
}

/// A bare child list behaves like a root container.
impl TreeNode for [Element] {
    fn children(&self) -> &[Element] {
        self
    }

    fn as_element(&self) -> Option<&Element> {
        None
    }
}

/// Host-side geometry check; the engine knows nothing about element shapes.
pub trait HitTest {
    fn is_hit(&self, element: &Element, x: f64, y: f64) -> bool;
}

/// Pre-order walk. With `quick_quit`, the walk stops as soon as `visit` returns `true`, and
/// the function reports whether it stopped early.
pub fn dfs<'a, N, F>(node: &'a N, visit: &mut F, quick_quit: bool) -> bool
where
    N: TreeNode + ?Sized,
    F: FnMut(&'a Element) -> bool,
{
    if let Some(element) = node.as_element() {
        if visit(element) && quick_quit {
            return true;
        }
    }
    for child in node.children() {
        if dfs(child, visit, quick_quit) {
            return true;
        }
    }
    false
}

/// Level-order walk with the same early-exit contract as [`dfs`].
pub fn bfs<'a, N, F>(node: &'a N, visit: &mut F, quick_quit: bool) -> bool
where
    N: TreeNode + ?Sized,
    F: FnMut(&'a Element) -> bool,
{
    if let Some(element) = node.as_element() {
        if visit(element) && quick_quit {
            return true;
        }
    }
    let mut queue: VecDeque<&'a Element> = node.children().iter().collect();
    while let Some(element) = queue.pop_front() {
        if visit(element) && quick_quit {
            return true;
        }
        queue.extend(element.children.iter());
    }
    false
}

/// Every element under the point, in depth-first order.
pub fn get_hit_elements<'a, B>(board: &'a B, x: f64, y: f64) -> Vec<&'a Element>
where
    B: TreeNode + HitTest + ?Sized,
{
    let mut hits = Vec::new();
    dfs(
        board,
        &mut |element: &'a Element| {
            if board.is_hit(element, x, y) {
                hits.push(element);
            }
            false
        },
        false,
    );
    hits
}
