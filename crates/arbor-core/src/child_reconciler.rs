//! Child diffing.
//!
//! Turns a node's previous child chain plus the children produced by this
//! render into a new work-in-progress child chain. Matching old nodes are
//! cloned for update, everything else is created fresh; old nodes that find
//! no match are queued on the parent for deletion.
//!
//! The array path is a single greedy pass keyed by `last_placed_index`: a
//! reused node whose old position is left of the rightmost stable node seen so
//! far is marked for placement, everything else stays put. This is exact for
//! appends, prepends and removals but can over-mark moves for arbitrary
//! shuffles.

use std::rc::Rc;

use crate::collections::map::{self, HashMap};
use crate::element::{Child, Element, ElementType, Key, NodeRef, Props};
use crate::flags::Flags;
use crate::work::{PendingProps, WorkId, WorkTag, WorkTree};

/// Identity of an old child inside the array path lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ChildKey {
    Key(Key),
    Index(usize),
}

impl ChildKey {
    fn of(key: Option<&Key>, index: usize) -> Self {
        match key {
            Some(key) => ChildKey::Key(Rc::clone(key)),
            None => ChildKey::Index(index),
        }
    }
}

/// Reconciles `new_child` against the chain starting at `current_first` and
/// returns the first node of the new chain. With `track_effects` off (a
/// parent mounting for the first time) no placement or deletion is recorded:
/// the whole subtree is attached in one go by its placed ancestor.
pub(crate) fn reconcile_child_nodes<I: Clone>(
    tree: &mut WorkTree<I>,
    parent: WorkId,
    current_first: Option<WorkId>,
    new_child: Child,
    track_effects: bool,
) -> Option<WorkId> {
    ChildReconciler {
        tree,
        track_effects,
    }
    .reconcile(parent, current_first, new_child)
}

struct ChildReconciler<'a, I> {
    tree: &'a mut WorkTree<I>,
    track_effects: bool,
}

impl<I: Clone> ChildReconciler<'_, I> {
    fn reconcile(&mut self, parent: WorkId, current_first: Option<WorkId>, new_child: Child) -> Option<WorkId> {
        let new_child = match new_child {
            Child::Element(element) if element.is_fragment() && element.key_ref().is_none() => {
                let (_, _, props, _) = element.into_parts();
                props.children
            }
            other => other,
        };

        match new_child {
            Child::List(children) => self.reconcile_children_array(parent, current_first, children),
            Child::Element(element) => {
                let node = self.reconcile_single_element(parent, current_first, element);
                Some(self.place_single_child(node))
            }
            Child::Text(text) => {
                let node = self.reconcile_single_text(parent, current_first, text);
                Some(self.place_single_child(node))
            }
            Child::Empty => {
                self.delete_remaining_children(parent, current_first);
                None
            }
        }
    }

    fn delete_child(&mut self, parent: WorkId, child: WorkId) {
        if !self.track_effects {
            return;
        }
        let node = &mut self.tree[parent];
        node.deletions.push(child);
        node.flags |= Flags::CHILD_DELETION;
    }

    fn delete_remaining_children(&mut self, parent: WorkId, mut current: Option<WorkId>) {
        if !self.track_effects {
            return;
        }
        while let Some(child) = current {
            self.delete_child(parent, child);
            current = self.tree[child].sibling;
        }
    }

    fn place_single_child(&mut self, node: WorkId) -> WorkId {
        if self.track_effects && self.tree[node].alternate.is_none() {
            self.tree[node].flags |= Flags::PLACEMENT;
        }
        node
    }

    /// Clones `current` for this pass as a lone child at position zero.
    fn use_node(&mut self, current: WorkId, pending_props: PendingProps) -> WorkId {
        let wip = self.tree.clone_for_update(current, pending_props);
        let node = &mut self.tree[wip];
        node.index = 0;
        node.sibling = None;
        wip
    }

    fn attach(&mut self, parent: WorkId, node: WorkId) -> WorkId {
        self.tree[node].parent = Some(parent);
        node
    }

    fn create_from_element(&mut self, element: Element) -> WorkId {
        let (element_type, key, props, node_ref) = element.into_parts();
        let (tag, pending_props) = match &element_type {
            ElementType::Host(_) => (WorkTag::HostComponent, PendingProps::Props(props)),
            ElementType::Component(_) => (WorkTag::FunctionComponent, PendingProps::Props(props)),
            ElementType::Fragment => (WorkTag::Fragment, PendingProps::Children(props.children)),
        };
        let id = self.tree.create_work_node(tag, key, pending_props);
        let node = &mut self.tree[id];
        node.element_type = Some(element_type);
        node.node_ref = node_ref;
        id
    }

    fn create_fragment(&mut self, children: Child, key: Option<Key>) -> WorkId {
        let id = self
            .tree
            .create_work_node(WorkTag::Fragment, key, PendingProps::Children(children));
        self.tree[id].element_type = Some(ElementType::Fragment);
        id
    }

    fn create_text(&mut self, text: Rc<str>) -> WorkId {
        self.tree
            .create_work_node(WorkTag::HostText, None, PendingProps::Text(text))
    }

    fn reuse_with(&mut self, current: WorkId, element_type: &ElementType, props: Props, node_ref: Option<NodeRef>) -> WorkId {
        let pending_props = match element_type {
            ElementType::Fragment => PendingProps::Children(props.children),
            _ => PendingProps::Props(props),
        };
        let wip = self.use_node(current, pending_props);
        self.tree[wip].node_ref = node_ref;
        wip
    }

    fn reconcile_single_element(
        &mut self,
        parent: WorkId,
        mut current: Option<WorkId>,
        element: Element,
    ) -> WorkId {
        while let Some(existing) = current {
            let (same_key, same_type, sibling) = {
                let node = &self.tree[existing];
                (
                    node.key.as_ref() == element.key_ref(),
                    node.element_type.as_ref() == Some(element.element_type()),
                    node.sibling,
                )
            };
            if !same_key {
                self.delete_child(parent, existing);
                current = sibling;
                continue;
            }
            if same_type {
                let (element_type, _, props, node_ref) = element.into_parts();
                let wip = self.reuse_with(existing, &element_type, props, node_ref);
                self.delete_remaining_children(parent, sibling);
                return self.attach(parent, wip);
            }
            // Keys are unique among siblings, nothing further down can match.
            self.delete_remaining_children(parent, Some(existing));
            break;
        }

        let node = self.create_from_element(element);
        self.attach(parent, node)
    }

    fn reconcile_single_text(&mut self, parent: WorkId, mut current: Option<WorkId>, text: Rc<str>) -> WorkId {
        while let Some(existing) = current {
            let (tag, sibling) = {
                let node = &self.tree[existing];
                (node.tag, node.sibling)
            };
            if tag == WorkTag::HostText {
                let wip = self.use_node(existing, PendingProps::Text(text));
                self.delete_remaining_children(parent, sibling);
                return self.attach(parent, wip);
            }
            self.delete_child(parent, existing);
            current = sibling;
        }
        let node = self.create_text(text);
        self.attach(parent, node)
    }

    fn reconcile_children_array(
        &mut self,
        parent: WorkId,
        current_first: Option<WorkId>,
        children: Vec<Child>,
    ) -> Option<WorkId> {
        let mut existing: HashMap<ChildKey, WorkId> = map::with_capacity(children.len());
        let mut cursor = current_first;
        while let Some(id) = cursor {
            let node = &self.tree[id];
            let key = ChildKey::of(node.key.as_ref(), node.index);
            cursor = node.sibling;
            if let Some(displaced) = existing.insert(key.clone(), id) {
                log::warn!("duplicate child key {key:?} under {parent:?}");
                self.delete_child(parent, displaced);
            }
        }

        let mut first = None;
        let mut last: Option<WorkId> = None;
        let mut last_placed_index = 0;
        for (index, child) in children.into_iter().enumerate() {
            let Some(new_node) = self.update_from_map(&mut existing, index, child) else {
                continue;
            };
            {
                let node = &mut self.tree[new_node];
                node.index = index;
                node.parent = Some(parent);
            }
            match last {
                Some(previous) => self.tree[previous].sibling = Some(new_node),
                None => first = Some(new_node),
            }
            last = Some(new_node);

            if !self.track_effects {
                continue;
            }
            let old_index = self.tree[new_node]
                .alternate
                .and_then(|alternate| self.tree.get(alternate))
                .map(|current| current.index);
            match old_index {
                Some(old_index) if old_index < last_placed_index => {
                    self.tree[new_node].flags |= Flags::PLACEMENT;
                }
                Some(old_index) => last_placed_index = old_index,
                None => self.tree[new_node].flags |= Flags::PLACEMENT,
            }
        }

        let mut leftovers: Vec<WorkId> = existing.into_values().collect();
        leftovers.sort_by_key(|id| self.tree[*id].index);
        for child in leftovers {
            self.delete_child(parent, child);
        }
        first
    }

    /// Finds or creates the node for `child` at `index`. Reused nodes are
    /// removed from `existing`.
    fn update_from_map(
        &mut self,
        existing: &mut HashMap<ChildKey, WorkId>,
        index: usize,
        child: Child,
    ) -> Option<WorkId> {
        match child {
            Child::Empty => None,
            Child::List(children) => {
                let key = ChildKey::Index(index);
                Some(self.update_fragment(existing, key, None, Child::List(children)))
            }
            Child::Text(text) => {
                let key = ChildKey::Index(index);
                let before = existing
                    .get(&key)
                    .copied()
                    .filter(|id| self.tree[*id].tag == WorkTag::HostText);
                Some(match before {
                    Some(before) => {
                        existing.remove(&key);
                        self.use_node(before, PendingProps::Text(text))
                    }
                    None => self.create_text(text),
                })
            }
            Child::Element(element) => {
                let key = ChildKey::of(element.key_ref(), index);
                if element.is_fragment() {
                    let (_, explicit_key, props, _) = element.into_parts();
                    return Some(self.update_fragment(existing, key, explicit_key, props.children));
                }
                let before = existing.get(&key).copied().filter(|id| {
                    self.tree[*id].element_type.as_ref() == Some(element.element_type())
                });
                Some(match before {
                    Some(before) => {
                        existing.remove(&key);
                        let (element_type, _, props, node_ref) = element.into_parts();
                        self.reuse_with(before, &element_type, props, node_ref)
                    }
                    None => self.create_from_element(element),
                })
            }
        }
    }

    fn update_fragment(
        &mut self,
        existing: &mut HashMap<ChildKey, WorkId>,
        key: ChildKey,
        explicit_key: Option<Key>,
        children: Child,
    ) -> WorkId {
        let before = existing
            .get(&key)
            .copied()
            .filter(|id| self.tree[*id].tag == WorkTag::Fragment);
        match before {
            Some(before) => {
                existing.remove(&key);
                self.use_node(before, PendingProps::Children(children))
            }
            None => self.create_fragment(children, explicit_key),
        }
    }
}
