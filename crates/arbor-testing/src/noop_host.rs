//! In-memory host used by tests and demos.
//!
//! Nodes live in a flat vector addressed by [`NodeHandle`]. Every mutation
//! the engine performs is recorded as a [`HostOp`] so tests can assert on how
//! many host operations a commit issued, not only on the final tree.

use std::fmt;
use std::fmt::Write as _;

use arbor_core::{AttrValue, Attributes, HostConfig, HostError};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub usize);

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostNodeKind {
    Container,
    Element { tag: String, attrs: Attributes },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateElement { node: NodeHandle, tag: String },
    CreateText { node: NodeHandle, text: String },
    AppendInitial { parent: NodeHandle, child: NodeHandle },
    Append { parent: NodeHandle, child: NodeHandle },
    Insert { parent: NodeHandle, child: NodeHandle, before: NodeHandle },
    Remove { parent: NodeHandle, child: NodeHandle },
    SetText { node: NodeHandle, text: String },
    SetAttrs { node: NodeHandle },
}

impl HostOp {
    /// Whether the op touched a node already attached to the visible tree.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            HostOp::CreateElement { .. } | HostOp::CreateText { .. } | HostOp::AppendInitial { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct HostNode {
    kind: HostNodeKind,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

#[derive(Debug, Default)]
pub struct NoopHost {
    nodes: Vec<HostNode>,
    ops: Vec<HostOp>,
}

impl NoopHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached container node to render into.
    pub fn create_container(&mut self) -> NodeHandle {
        self.push(HostNodeKind::Container)
    }

    fn push(&mut self, kind: HostNodeKind) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len());
        self.nodes.push(HostNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        handle
    }

    fn node(&self, handle: NodeHandle) -> Result<&HostNode, HostError> {
        self.nodes.get(handle.0).ok_or_else(|| missing(handle))
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Result<&mut HostNode, HostError> {
        self.nodes.get_mut(handle.0).ok_or_else(|| missing(handle))
    }

    fn detach(&mut self, child: NodeHandle) -> Result<(), HostError> {
        if let Some(parent) = self.node(child)?.parent {
            self.node_mut(parent)?.children.retain(|existing| *existing != child);
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }

    fn attach_at(&mut self, parent: NodeHandle, child: NodeHandle, position: Option<usize>) -> Result<(), HostError> {
        self.node(parent)?;
        self.detach(child)?;
        let children = &mut self.node_mut(parent)?.children;
        match position {
            Some(position) => children.insert(position, child),
            None => children.push(child),
        }
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn kind(&self, handle: NodeHandle) -> Option<&HostNodeKind> {
        self.nodes.get(handle.0).map(|node| &node.kind)
    }

    pub fn children(&self, handle: NodeHandle) -> &[NodeHandle] {
        self.nodes
            .get(handle.0)
            .map_or(&[][..], |node| node.children.as_slice())
    }

    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(handle.0).and_then(|node| node.parent)
    }

    pub fn text(&self, handle: NodeHandle) -> Option<&str> {
        match self.kind(handle)? {
            HostNodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn tag(&self, handle: NodeHandle) -> Option<&str> {
        match self.kind(handle)? {
            HostNodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, handle: NodeHandle, name: &str) -> Option<&AttrValue> {
        match self.kind(handle)? {
            HostNodeKind::Element { attrs, .. } => attrs.get(name),
            _ => None,
        }
    }

    /// Concatenated text of every text node below `handle`.
    pub fn text_content(&self, handle: NodeHandle) -> String {
        let mut out = String::new();
        self.collect_text(handle, &mut out);
        out
    }

    fn collect_text(&self, handle: NodeHandle, out: &mut String) {
        if let Some(text) = self.text(handle) {
            out.push_str(text);
        }
        for child in self.children(handle) {
            self.collect_text(*child, out);
        }
    }

    /// Markup-like rendering of the children of `handle`, e.g.
    /// `<ul><li id="a">A</li></ul>`. The container itself is not printed.
    pub fn snapshot(&self, handle: NodeHandle) -> String {
        let mut out = String::new();
        for child in self.children(handle) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, handle: NodeHandle, out: &mut String) {
        match self.kind(handle) {
            Some(HostNodeKind::Text(text)) => out.push_str(text),
            Some(HostNodeKind::Element { tag, attrs }) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in attrs {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                out.push('>');
                for child in self.children(handle) {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
            Some(HostNodeKind::Container) | None => {}
        }
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of nodes ever created, containers included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn missing(handle: NodeHandle) -> HostError {
    HostError::Missing {
        handle: format!("{handle:?}"),
    }
}

impl HostConfig for NoopHost {
    type Instance = NodeHandle;

    fn create_instance(&mut self, tag: &str, attrs: &Attributes) -> Result<NodeHandle, HostError> {
        let node = self.push(HostNodeKind::Element {
            tag: tag.to_owned(),
            attrs: attrs.clone(),
        });
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        Ok(node)
    }

    fn create_text_instance(&mut self, text: &str) -> Result<NodeHandle, HostError> {
        let node = self.push(HostNodeKind::Text(text.to_owned()));
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_owned(),
        });
        Ok(node)
    }

    fn append_initial_child(&mut self, parent: &NodeHandle, child: &NodeHandle) -> Result<(), HostError> {
        if self.node(*child)?.parent.is_some() {
            return Err(HostError::AlreadyAttached {
                handle: format!("{child:?}"),
            });
        }
        self.attach_at(*parent, *child, None)?;
        self.ops.push(HostOp::AppendInitial {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn append_child_to_container(&mut self, container: &NodeHandle, child: &NodeHandle) -> Result<(), HostError> {
        self.attach_at(*container, *child, None)?;
        self.ops.push(HostOp::Append {
            parent: *container,
            child: *child,
        });
        Ok(())
    }

    fn insert_child_to_container(
        &mut self,
        child: &NodeHandle,
        container: &NodeHandle,
        before: &NodeHandle,
    ) -> Result<(), HostError> {
        if self.node(*before)?.parent != Some(*container) {
            return Err(HostError::MissingAnchor {
                handle: format!("{before:?}"),
            });
        }
        self.detach(*child)?;
        let position = self
            .children(*container)
            .iter()
            .position(|existing| existing == before);
        self.attach_at(*container, *child, position)?;
        self.ops.push(HostOp::Insert {
            parent: *container,
            child: *child,
            before: *before,
        });
        Ok(())
    }

    fn remove_child(&mut self, child: &NodeHandle, container: &NodeHandle) -> Result<(), HostError> {
        if self.node(*child)?.parent != Some(*container) {
            return Err(missing(*child));
        }
        self.detach(*child)?;
        self.ops.push(HostOp::Remove {
            parent: *container,
            child: *child,
        });
        Ok(())
    }

    fn commit_text_update(&mut self, instance: &NodeHandle, text: &str) -> Result<(), HostError> {
        match &mut self.node_mut(*instance)?.kind {
            HostNodeKind::Text(existing) => *existing = text.to_owned(),
            _ => {
                return Err(HostError::Unsupported {
                    operation: "commit_text_update",
                    handle: format!("{instance:?}"),
                })
            }
        }
        self.ops.push(HostOp::SetText {
            node: *instance,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn commit_update(&mut self, instance: &NodeHandle, _tag: &str, attrs: &Attributes) -> Result<(), HostError> {
        match &mut self.node_mut(*instance)?.kind {
            HostNodeKind::Element { attrs: existing, .. } => *existing = attrs.clone(),
            _ => {
                return Err(HostError::Unsupported {
                    operation: "commit_update",
                    handle: format!("{instance:?}"),
                })
            }
        }
        self.ops.push(HostOp::SetAttrs { node: *instance });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_moves_an_attached_child_before_the_anchor() {
        let mut host = NoopHost::new();
        let root = host.create_container();
        let a = host.create_text_instance("a").unwrap();
        let b = host.create_text_instance("b").unwrap();
        let c = host.create_text_instance("c").unwrap();
        for child in [a, b, c] {
            host.append_child_to_container(&root, &child).unwrap();
        }
        host.insert_child_to_container(&c, &root, &a).unwrap();
        assert_eq!(host.children(root), &[c, a, b]);
        assert_eq!(host.snapshot(root), "cab");
    }

    #[test]
    fn removing_a_foreign_child_is_an_error() {
        let mut host = NoopHost::new();
        let root = host.create_container();
        let other = host.create_container();
        let text = host.create_text_instance("x").unwrap();
        host.append_child_to_container(&other, &text).unwrap();
        assert!(matches!(
            host.remove_child(&text, &root),
            Err(HostError::Missing { .. })
        ));
        assert_eq!(host.children(other), &[text]);
    }

    #[test]
    fn snapshot_prints_attributes_in_insertion_order() {
        let mut host = NoopHost::new();
        let root = host.create_container();
        let mut attrs = Attributes::new();
        attrs.insert("id".into(), "a".into());
        attrs.insert("hidden".into(), false.into());
        let div = host.create_instance("div", &attrs).unwrap();
        let text = host.create_text_instance("hi").unwrap();
        host.append_initial_child(&div, &text).unwrap();
        host.append_child_to_container(&root, &div).unwrap();
        assert_eq!(host.snapshot(root), "<div id=\"a\" hidden=\"false\">hi</div>");
    }
}
