//! The mutable XML DOM.
//!
//! Litchi's own XML layer (`common::xml_slice`) only ever hands back
//! byte-range slices into an immutable buffer — it has no notion of
//! insert/detach/reparent, because litchi never edits a document in place.
//! That is exactly what every operation in this crate needs (run splitting,
//! tracked-change unwrapping, bookmark insertion), so the tree here is
//! instead grounded on the `indextree`-backed `XmlDocument` used by the
//! Open-Xml-PowerTools `redline-rs` port: an arena of nodes addressed by
//! stable `NodeId`s, mutated with `insert_before`/`detach`/`reparent`-style
//! primitives rather than a recursive owned-tree rebuild.

use indextree::{Arena, NodeId};

use super::node::XmlNodeData;
use super::xname::{XAttribute, XName};

/// An XML document: an arena of nodes plus the id of the document element.
pub struct XmlDocument {
    arena: Arena<XmlNodeData>,
    root: Option<NodeId>,
}

impl XmlDocument {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    /// Allocate a detached node without attaching it anywhere.
    pub fn new_node(&mut self, data: XmlNodeData) -> NodeId {
        self.arena.new_node(data)
    }

    /// Set the document element, allocating it fresh.
    pub fn add_root(&mut self, data: XmlNodeData) -> NodeId {
        let id = self.arena.new_node(data);
        self.root = Some(id);
        id
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Record `id` (already allocated via [`Self::new_node`]) as the document
    /// element. Used by the reader, which allocates the first element before
    /// it knows it has no parent.
    pub fn set_root_for_reader(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Allocate `data` as a new node and append it as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, data: XmlNodeData) -> NodeId {
        let id = self.arena.new_node(data);
        parent.append(id, &mut self.arena);
        id
    }

    /// Append an existing (possibly detached) node as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        parent.append(child, &mut self.arena);
    }

    pub fn insert_before(&mut self, new_sibling: NodeId, anchor: NodeId) {
        anchor.insert_before(new_sibling, &mut self.arena);
    }

    pub fn insert_after(&mut self, new_sibling: NodeId, anchor: NodeId) {
        anchor.insert_after(new_sibling, &mut self.arena);
    }

    /// Detach `node` from its parent and siblings, leaving its own subtree intact.
    pub fn detach(&mut self, node: NodeId) {
        node.detach(&mut self.arena);
    }

    /// Detach `node` and every descendant, dropping the subtree from the tree.
    pub fn remove_subtree(&mut self, node: NodeId) {
        node.remove_subtree(&mut self.arena);
    }

    /// Move all children of `node` to become children of `new_parent`, preserving order.
    pub fn reparent_children(&mut self, node: NodeId, new_parent: NodeId) {
        let kids: Vec<NodeId> = node.children(&self.arena).collect();
        for kid in kids {
            kid.detach(&mut self.arena);
            new_parent.append(kid, &mut self.arena);
        }
    }

    /// Move `node`'s children to occupy `node`'s position among its own
    /// siblings, then detach `node` itself. Used to "unwrap" a wrapper
    /// element (`w:ins`, `w:del`, ...) in place.
    pub fn unwrap_into_parent(&mut self, node: NodeId) {
        let kids: Vec<NodeId> = node.children(&self.arena).collect();
        let mut anchor = node;
        for kid in kids {
            kid.detach(&mut self.arena);
            anchor.insert_before(kid, &mut self.arena);
            anchor = kid;
        }
        node.detach(&mut self.arena);
    }

    pub fn get(&self, id: NodeId) -> Option<&XmlNodeData> {
        self.arena.get(id).map(|n| n.get())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut XmlNodeData> {
        self.arena.get_mut(id).map(|n| n.get_mut())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.parent())
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.ancestors(&self.arena)
    }

    pub fn following_siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.following_siblings(&self.arena)
    }

    pub fn preceding_siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.preceding_siblings(&self.arena)
    }

    pub fn is_element(&self, id: NodeId, namespace: &str, local: &str) -> bool {
        self.get(id).is_some_and(|d| d.is_element(namespace, local))
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|d| d.as_element()).map(|(n, _)| n.local())
    }

    pub fn attr(&self, id: NodeId, name: &XName) -> Option<&str> {
        self.get(id)
            .and_then(|d| d.as_element())
            .and_then(|(_, attrs)| attrs.iter().find(|a| &a.name == name))
            .map(|a| a.value.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, name: XName, value: impl Into<String>) {
        if let Some(XmlNodeData::Element { attrs, .. }) = self.get_mut(id) {
            let value = value.into();
            if let Some(existing) = attrs.iter_mut().find(|a| a.name == name) {
                existing.value = value;
            } else {
                attrs.push(XAttribute::new(name, value));
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &XName) {
        if let Some(XmlNodeData::Element { attrs, .. }) = self.get_mut(id) {
            attrs.retain(|a| &a.name != name);
        }
    }

    /// Remove every attribute whose local name starts with `prefix` (e.g. `rsid`).
    pub fn remove_attrs_with_local_prefix(&mut self, id: NodeId, prefix: &str) {
        if let Some(XmlNodeData::Element { attrs, .. }) = self.get_mut(id) {
            attrs.retain(|a| !a.name.local.starts_with(prefix));
        }
    }

    /// Direct (non-recursive) text content: the concatenation of this
    /// node's own `Text` children, ignoring descendant elements. Matches the
    /// "non-recursive textContent" design note — hashing/comparison must
    /// never use the DOM's full recursive text accumulator.
    pub fn direct_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            if let Some(t) = self.get(child).and_then(|d| d.as_text()) {
                out.push_str(t);
            }
        }
        out
    }

    /// Find the first descendant element (depth-first, self excluded from
    /// the "first" search unless `include_self`) matching `(namespace, local)`.
    pub fn find_descendant(&self, id: NodeId, namespace: &str, local: &str) -> Option<NodeId> {
        self.descendants(id).find(|&d| self.is_element(d, namespace, local))
    }

    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let data = self.get(id).cloned().expect("node exists");
        let new_id = self.new_node(data);
        let kids: Vec<NodeId> = self.children(id).collect();
        for kid in kids {
            let cloned_kid = self.clone_subtree(kid);
            new_id.append(cloned_kid, &mut self.arena);
        }
        new_id
    }
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for XmlDocument {
    /// Deep clone the whole document into a fresh arena, preserving `NodeId`
    /// values (indextree ids are arena-relative indices, so copying node data
    /// in allocation order yields an isomorphic tree with identical ids —
    /// required so `_bk_*` lookups resolve the same way in accept/reject clones).
    fn clone(&self) -> Self {
        let mut arena = Arena::new();
        for node in self.arena.iter() {
            arena.new_node(node.get().clone());
        }
        if let Some(root) = self.root {
            rebuild_structure(&self.arena, &mut arena, root);
        }
        Self {
            arena,
            root: self.root,
        }
    }
}

fn rebuild_structure(src: &Arena<XmlNodeData>, dst: &mut Arena<XmlNodeData>, node: NodeId) {
    for child in node.children(src) {
        node.append(child, dst);
        rebuild_structure(src, dst, child);
    }
}
