//! Work nodes and the double-buffered work tree.
//!
//! Every tree position owns up to two [`WorkNode`]s: the committed one
//! reachable from the root's current pointer and the work-in-progress one
//! being built by a pass. The pair points at each other through `alternate`.
//! Nodes live in a generational arena so back-references are plain ids and a
//! stale id never aliases a recycled slot.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use crate::element::{Child, ElementType, Key, NodeRef, Props};
use crate::flags::Flags;
use crate::hooks::{EffectRef, Hook};
use crate::ring::Ring;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkTag {
    FunctionComponent,
    HostRoot,
    HostComponent,
    HostText,
    Fragment,
}

impl WorkTag {
    pub fn is_host(self) -> bool {
        matches!(self, WorkTag::HostComponent | WorkTag::HostText)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId {
    index: u32,
    generation: u32,
}

impl fmt::Debug for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Input a node is rendered with.
#[derive(Clone, Debug)]
pub(crate) enum PendingProps {
    Root,
    Props(Props),
    Text(Rc<str>),
    /// A fragment's pending input is its children list.
    Children(Child),
}

impl PendingProps {
    pub(crate) fn text(&self) -> Option<&Rc<str>> {
        match self {
            PendingProps::Text(text) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn props(&self) -> Option<&Props> {
        match self {
            PendingProps::Props(props) => Some(props),
            _ => None,
        }
    }
}

/// Committed local state of a node.
#[derive(Clone, Default)]
pub(crate) enum NodeState {
    #[default]
    None,
    Root {
        element: Child,
    },
    Component {
        hooks: Vec<Hook>,
        /// This instance's effect records in registration order.
        effects: Option<Ring<EffectRef>>,
    },
}

pub struct WorkNode<I> {
    pub(crate) tag: WorkTag,
    pub(crate) key: Option<Key>,
    pub(crate) element_type: Option<ElementType>,
    pub(crate) state_node: Option<I>,
    pub(crate) parent: Option<WorkId>,
    pub(crate) child: Option<WorkId>,
    pub(crate) sibling: Option<WorkId>,
    pub(crate) index: usize,
    pub(crate) pending_props: PendingProps,
    pub(crate) memoized_props: Option<PendingProps>,
    pub(crate) state: NodeState,
    pub(crate) node_ref: Option<NodeRef>,
    pub(crate) alternate: Option<WorkId>,
    pub(crate) flags: Flags,
    pub(crate) subtree_flags: Flags,
    pub(crate) deletions: Vec<WorkId>,
}

impl<I> WorkNode<I> {
    fn new(tag: WorkTag, key: Option<Key>, pending_props: PendingProps) -> Self {
        Self {
            tag,
            key,
            element_type: None,
            state_node: None,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            pending_props,
            memoized_props: None,
            state: NodeState::None,
            node_ref: None,
            alternate: None,
            flags: Flags::empty(),
            subtree_flags: Flags::empty(),
            deletions: Vec::new(),
        }
    }

    pub fn tag(&self) -> WorkTag {
        self.tag
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn subtree_flags(&self) -> Flags {
        self.subtree_flags
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn alternate(&self) -> Option<WorkId> {
        self.alternate
    }

    pub fn child(&self) -> Option<WorkId> {
        self.child
    }

    pub fn sibling(&self) -> Option<WorkId> {
        self.sibling
    }

    pub fn parent(&self) -> Option<WorkId> {
        self.parent
    }

    pub fn deletions(&self) -> &[WorkId] {
        &self.deletions
    }

    pub fn state_node(&self) -> Option<&I> {
        self.state_node.as_ref()
    }

    pub fn hook_count(&self) -> usize {
        match &self.state {
            NodeState::Component { hooks, .. } => hooks.len(),
            _ => 0,
        }
    }

    /// Text of a host text node as last rendered.
    pub fn text(&self) -> Option<&str> {
        self.memoized_props
            .as_ref()
            .unwrap_or(&self.pending_props)
            .text()
            .map(|text| &**text)
    }
}

struct Slot<I> {
    generation: u32,
    node: Option<WorkNode<I>>,
}

pub struct WorkTree<I> {
    slots: Vec<Slot<I>>,
    free: Vec<u32>,
    live: usize,
    /// Nodes allocated since the last commit.
    allocated: Vec<WorkId>,
}

impl<I> Default for WorkTree<I> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            allocated: Vec::new(),
        }
    }
}

impl<I: Clone> WorkTree<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn create_work_node(
        &mut self,
        tag: WorkTag,
        key: Option<Key>,
        pending_props: PendingProps,
    ) -> WorkId {
        let node = WorkNode::new(tag, key, pending_props);
        self.live += 1;
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                WorkId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                WorkId {
                    index,
                    generation: 0,
                }
            }
        };
        self.allocated.push(id);
        id
    }

    /// Keeps every node allocated by the pass that just committed.
    pub(crate) fn clear_allocated(&mut self) {
        self.allocated.clear();
    }

    /// Frees every node allocated by an abandoned pass.
    pub(crate) fn free_allocated(&mut self) {
        for id in std::mem::take(&mut self.allocated) {
            self.free(id);
        }
    }

    /// Returns the work-in-progress twin of `current` ready to be rendered
    /// with `pending_props`. The existing alternate is reused when there is
    /// one; otherwise a node is allocated and cross-linked. `current` itself
    /// is only touched to record the new alternate link.
    pub(crate) fn clone_for_update(&mut self, current: WorkId, pending_props: PendingProps) -> WorkId {
        let existing = self[current]
            .alternate
            .filter(|alternate| self.contains(*alternate));
        let wip = match existing {
            Some(wip) => {
                let node = &mut self[wip];
                node.pending_props = pending_props;
                node.flags = Flags::empty();
                node.subtree_flags = Flags::empty();
                node.deletions.clear();
                wip
            }
            None => {
                let (tag, key) = {
                    let node = &self[current];
                    (node.tag, node.key.clone())
                };
                let wip = self.create_work_node(tag, key, pending_props);
                self[wip].alternate = Some(current);
                self[current].alternate = Some(wip);
                wip
            }
        };
        let (element_type, state_node, child, memoized_props, state, node_ref) = {
            let node = &self[current];
            (
                node.element_type.clone(),
                node.state_node.clone(),
                node.child,
                node.memoized_props.clone(),
                node.state.clone(),
                node.node_ref.clone(),
            )
        };
        let node = &mut self[wip];
        node.element_type = element_type;
        node.state_node = state_node;
        node.child = child;
        node.memoized_props = memoized_props;
        node.state = state;
        node.node_ref = node_ref;
        wip
    }

    pub fn contains(&self, id: WorkId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: WorkId) -> Option<&WorkNode<I>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: WorkId) -> Option<&mut WorkNode<I>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Number of allocated nodes across both generations.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Children of `id` in sibling order.
    pub fn children(&self, id: WorkId) -> Vec<WorkId> {
        let mut out = Vec::new();
        let mut cursor = self.get(id).and_then(|node| node.child);
        while let Some(child) = cursor {
            out.push(child);
            cursor = self.get(child).and_then(|node| node.sibling);
        }
        out
    }

    pub(crate) fn free(&mut self, id: WorkId) {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return;
        };
        if slot.generation != id.generation || slot.node.is_none() {
            return;
        }
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
    }

    /// Frees `root`, its alternate and every descendant reachable through
    /// `root`'s generation of the tree.
    pub(crate) fn free_subtree(&mut self, root: WorkId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            let mut cursor = node.child;
            while let Some(child) = cursor {
                stack.push(child);
                cursor = self.get(child).and_then(|node| node.sibling);
            }
            let alternate = node.alternate;
            self.free(id);
            if let Some(alternate) = alternate {
                if self.get(alternate).and_then(|node| node.alternate) == Some(id) {
                    self.free(alternate);
                }
            }
        }
    }
}

impl<I> Index<WorkId> for WorkTree<I> {
    type Output = WorkNode<I>;

    fn index(&self, id: WorkId) -> &Self::Output {
        match self
            .slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
        {
            Some(node) => node,
            None => panic!("work node {id:?} is not alive"),
        }
    }
}

impl<I> IndexMut<WorkId> for WorkTree<I> {
    fn index_mut(&mut self, id: WorkId) -> &mut Self::Output {
        match self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
        {
            Some(node) => node,
            None => panic!("work node {id:?} is not alive"),
        }
    }
}
