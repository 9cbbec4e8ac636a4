pub mod classify;
pub mod parser;

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
}

/// Rendered bounding box of a node, in page coordinates.
///
/// Set by the host when layout information exists; absent in headless
/// contexts. Distances between boxes use the Manhattan metric on the
/// top-left corners, which is what visual pairing is calibrated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn manhattan_distance(&self, other: &Rect) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Stable identity for a node, derived from its allocation.
///
/// Only meaningful while the node is alive; pair with a held [`WeakHandle`]
/// when identity must survive a lookup (see `engine::tracker`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Internal mutable DOM node payload.
/// Only `Text` nodes carry text; children are ordered.
#[derive(Debug)]
pub struct NodeData {
    pub kind: NodeKind,
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub children: Vec<NodeHandle>,
    pub parent: WeakHandle,
    pub layout: Option<Rect>,
}

/// Shared handle to a DOM node.
///
/// The host document owns the tree; the engine clones handles freely
/// (cheap `Rc` bumps) but persists only weak references across passes.
#[derive(Debug, Clone)]
pub struct NodeHandle(Rc<RefCell<NodeData>>);

/// Non-owning handle; does not keep the node alive.
#[derive(Debug, Clone)]
pub struct WeakHandle(Weak<RefCell<NodeData>>);

impl WeakHandle {
    pub fn new() -> Self {
        Self(Weak::new())
    }

    pub fn upgrade(&self) -> Option<NodeHandle> {
        self.0.upgrade().map(NodeHandle)
    }
}

impl Default for WeakHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeHandle {
    pub fn document() -> Self {
        Self::from_data(NodeData {
            kind: NodeKind::Document,
            tag: "#document".into(),
            attributes: HashMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: WeakHandle::new(),
            layout: None,
        })
    }

    pub fn element(tag: impl Into<String>, attributes: HashMap<String, String>) -> Self {
        Self::from_data(NodeData {
            kind: NodeKind::Element,
            tag: tag.into(),
            attributes,
            text: String::new(),
            children: Vec::new(),
            parent: WeakHandle::new(),
            layout: None,
        })
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::from_data(NodeData {
            kind: NodeKind::Text,
            tag: String::new(),
            attributes: HashMap::new(),
            text: content.into(),
            children: Vec::new(),
            parent: WeakHandle::new(),
            layout: None,
        })
    }

    fn from_data(data: NodeData) -> Self {
        Self(Rc::new(RefCell::new(data)))
    }

    pub fn data(&self) -> Ref<'_, NodeData> {
        self.0.borrow()
    }

    pub fn data_mut(&self) -> RefMut<'_, NodeData> {
        self.0.borrow_mut()
    }

    pub fn id(&self) -> NodeId {
        NodeId(Rc::as_ptr(&self.0) as usize)
    }

    pub fn downgrade(&self) -> WeakHandle {
        WeakHandle(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &NodeHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    pub fn tag(&self) -> String {
        self.data().tag.clone()
    }

    pub fn is_element(&self) -> bool {
        self.kind() == NodeKind::Element
    }

    pub fn is_text(&self) -> bool {
        self.kind() == NodeKind::Text
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.data().attributes.get(name).cloned()
    }

    pub fn set_attr(&self, name: impl Into<String>, value: impl Into<String>) {
        self.data_mut().attributes.insert(name.into(), value.into());
    }

    pub fn own_text(&self) -> String {
        self.data().text.clone()
    }

    pub fn set_text(&self, content: impl Into<String>) {
        self.data_mut().text = content.into();
    }

    pub fn layout(&self) -> Option<Rect> {
        self.data().layout
    }

    pub fn set_layout(&self, rect: Rect) {
        self.data_mut().layout = Some(rect);
    }

    pub fn children(&self) -> Vec<NodeHandle> {
        self.data().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.data().parent.upgrade()
    }

    /// Append a child, taking it out of any previous parent.
    pub fn append_child(&self, child: &NodeHandle) {
        child.detach();
        child.data_mut().parent = self.downgrade();
        self.data_mut().children.push(child.clone());
    }

    /// Insert a child at `index` (clamped to the child count).
    pub fn insert_child(&self, index: usize, child: &NodeHandle) {
        child.detach();
        child.data_mut().parent = self.downgrade();
        let mut data = self.data_mut();
        let index = index.min(data.children.len());
        data.children.insert(index, child.clone());
    }

    /// Remove this node from its parent's child list, if attached.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.data_mut().children.retain(|c| !c.ptr_eq(self));
        }
        self.data_mut().parent = WeakHandle::new();
    }

    /// Position of this node among its parent's children.
    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let index = parent.data().children.iter().position(|c| c.ptr_eq(self));
        index
    }

    /// Swap this node for `replacement` at the same sibling position.
    pub fn replace_with(&self, replacement: &NodeHandle) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };
        let Some(index) = self.index_in_parent() else {
            return false;
        };
        self.detach();
        parent.insert_child(index, replacement);
        true
    }

    /// Ancestors from the immediate parent upward.
    pub fn ancestors(&self) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            out.push(node);
        }
        out
    }

    /// Whether `ancestor` is this node or a strict ancestor of it.
    pub fn is_within(&self, ancestor: &NodeHandle) -> bool {
        if self.ptr_eq(ancestor) {
            return true;
        }
        self.ancestors().iter().any(|a| a.ptr_eq(ancestor))
    }

    /// All nodes in this subtree, preorder, excluding `self`.
    pub fn descendants(&self) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// Preorder descendants for which `pred` holds.
    pub fn find_all(&self, pred: impl Fn(&NodeHandle) -> bool) -> Vec<NodeHandle> {
        self.descendants().into_iter().filter(|n| pred(n)).collect()
    }

    /// First preorder descendant for which `pred` holds.
    pub fn find_first(&self, pred: impl Fn(&NodeHandle) -> bool) -> Option<NodeHandle> {
        self.descendants().into_iter().find(|n| pred(n))
    }

    /// Recursively count all nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self
            .data()
            .children
            .iter()
            .map(|c| c.node_count())
            .sum::<usize>()
    }

    /// Collect all text content recursively, space-joined and trimmed per run.
    pub fn collect_text(&self) -> String {
        let mut buf = String::new();
        self.collect_text_inner(&mut buf);
        buf
    }

    fn collect_text_inner(&self, buf: &mut String) {
        let data = self.data();
        if !data.text.is_empty() {
            let trimmed = data.text.trim();
            if !trimmed.is_empty() {
                if !buf.is_empty() {
                    buf.push(' ');
                }
                buf.push_str(trimmed);
            }
        }
        for child in &data.children {
            child.collect_text_inner(buf);
        }
    }

    /// Deep copy of this subtree. Parent links inside the copy are rebuilt;
    /// the copy itself starts detached and layout boxes are not carried over.
    pub fn deep_clone(&self) -> NodeHandle {
        let data = self.data();
        let clone = Self::from_data(NodeData {
            kind: data.kind,
            tag: data.tag.clone(),
            attributes: data.attributes.clone(),
            text: data.text.clone(),
            children: Vec::new(),
            parent: WeakHandle::new(),
            layout: None,
        });
        for child in &data.children {
            let child_clone = child.deep_clone();
            child_clone.data_mut().parent = clone.downgrade();
            clone.data_mut().children.push(child_clone);
        }
        clone
    }
}

fn collect_descendants(node: &NodeHandle, out: &mut Vec<NodeHandle>) {
    for child in node.children() {
        out.push(child.clone());
        collect_descendants(&child, out);
    }
}

/// A parsed document tree.
#[derive(Debug, Clone)]
pub struct DomTree {
    pub root: NodeHandle,
}

impl DomTree {
    pub fn new(root: NodeHandle) -> Self {
        Self { root }
    }

    /// The `body` element, when the tree has one. Rewriting is scoped to it.
    pub fn body(&self) -> Option<NodeHandle> {
        self.root
            .find_first(|n| n.is_element() && n.data().tag == "body")
    }
}
