//! Commit: apply a finished pass to the host and flip the double buffer.
//!
//! Traversal is driven by flags alone. It descends while a node's subtree
//! flags carry commit work and processes nodes bottom-up while walking back
//! through siblings and parents. Each node handles placement, then its
//! pending deletions, then updates, then passive effect registration, then
//! its reference handle.

use smallvec::SmallVec;

use crate::element::ElementType;
use crate::flags::Flags;
use crate::host::HostConfig;
use crate::lanes::{Lane, NO_LANE};
use crate::root::{PendingPassive, RootInner};
use crate::work::{NodeState, PendingProps, WorkId, WorkTag, WorkTree};

impl<H: HostConfig + 'static> RootInner<H> {
    pub(crate) fn commit_root(&self, finished: WorkId, lane: Lane) {
        log::debug!("committing {finished:?} for lane {lane:?}");
        self.render.cursor.set(None);
        self.render.wip_root.set(None);
        self.render.lane.set(NO_LANE);
        self.mark_root_finished(lane);
        self.render.consumed.borrow_mut().retire_all();

        let deleted = {
            let mut tree = self.tree.borrow_mut();
            tree.clear_allocated();
            let node = &tree[finished];
            if (node.flags | node.subtree_flags).intersects(Flags::COMMIT_MASK) {
                let mut host = self.host.borrow_mut();
                let mut passive = self.passive.borrow_mut();
                let mut committer = Committer {
                    tree: &mut *tree,
                    host: &mut *host,
                    passive: &mut *passive,
                    deleted: Vec::new(),
                };
                committer.commit_mutation_effects(finished);
                committer.deleted
            } else {
                Vec::new()
            }
        };

        self.current.set(finished);

        if !deleted.is_empty() {
            let mut tree = self.tree.borrow_mut();
            for id in deleted {
                tree.free_subtree(id);
            }
        }
        self.schedule_passive_flush();
    }
}

struct Committer<'a, H: HostConfig> {
    tree: &'a mut WorkTree<H::Instance>,
    host: &'a mut H,
    passive: &'a mut PendingPassive,
    /// Roots of removed subtrees, freed once the commit is done.
    deleted: Vec<WorkId>,
}

impl<H: HostConfig> Committer<'_, H> {
    fn commit_mutation_effects(&mut self, finished: WorkId) {
        let mut next = Some(finished);
        while let Some(id) = next {
            let node = &self.tree[id];
            if node.subtree_flags.intersects(Flags::COMMIT_MASK) {
                if let Some(child) = node.child {
                    next = Some(child);
                    continue;
                }
            }

            let mut cursor = id;
            next = None;
            loop {
                self.commit_on_node(cursor);
                if cursor == finished {
                    break;
                }
                let node = &self.tree[cursor];
                if let Some(sibling) = node.sibling {
                    next = Some(sibling);
                    break;
                }
                match node.parent {
                    Some(parent) => cursor = parent,
                    None => break,
                }
            }
        }
    }

    fn commit_on_node(&mut self, id: WorkId) {
        let flags = self.tree[id].flags;

        if flags.contains(Flags::PLACEMENT) {
            self.commit_placement(id);
            self.tree[id].flags.remove(Flags::PLACEMENT);
        }
        if flags.contains(Flags::CHILD_DELETION) {
            let deletions = std::mem::take(&mut self.tree[id].deletions);
            for child in deletions {
                self.commit_deletion(id, child);
            }
            self.tree[id].flags.remove(Flags::CHILD_DELETION);
        }
        if flags.contains(Flags::UPDATE) {
            self.commit_update(id);
            self.tree[id].flags.remove(Flags::UPDATE);
        }
        if flags.contains(Flags::PASSIVE_EFFECT) {
            if let NodeState::Component {
                effects: Some(effects),
                ..
            } = &self.tree[id].state
            {
                self.passive.update.push(effects.clone());
            }
            self.tree[id].flags.remove(Flags::PASSIVE_EFFECT);
        }
        if flags.contains(Flags::REF) {
            self.commit_attach_ref(id);
            self.tree[id].flags.remove(Flags::REF);
        }
    }

    /// Nearest host element or container at or above `from`.
    fn host_parent(&self, from: Option<WorkId>) -> Option<H::Instance> {
        let mut cursor = from;
        while let Some(id) = cursor {
            let node = &self.tree[id];
            match node.tag {
                WorkTag::HostComponent | WorkTag::HostRoot => return node.state_node.clone(),
                _ => cursor = node.parent,
            }
        }
        None
    }

    /// First host node after `id` in document order that is already in
    /// place, used as the insertion anchor.
    fn host_sibling(&self, id: WorkId) -> Option<H::Instance> {
        let mut node = id;
        'siblings: loop {
            while self.tree[node].sibling.is_none() {
                match self.tree[node].parent {
                    Some(parent)
                        if !matches!(
                            self.tree[parent].tag,
                            WorkTag::HostComponent | WorkTag::HostRoot
                        ) =>
                    {
                        node = parent
                    }
                    _ => return None,
                }
            }
            node = self.tree[node].sibling?;

            while !self.tree[node].tag.is_host() {
                if self.tree[node].flags.contains(Flags::PLACEMENT) {
                    continue 'siblings;
                }
                match self.tree[node].child {
                    Some(child) => node = child,
                    None => continue 'siblings,
                }
            }

            let candidate = &self.tree[node];
            if !candidate.flags.contains(Flags::PLACEMENT) {
                if let Some(instance) = &candidate.state_node {
                    return Some(instance.clone());
                }
            }
        }
    }

    fn commit_placement(&mut self, id: WorkId) {
        let Some(parent) = self.host_parent(self.tree[id].parent) else {
            log::warn!("no host parent for {id:?}, placement skipped");
            return;
        };
        let before = self.host_sibling(id);
        self.insert_or_append(id, &parent, before.as_ref());
    }

    fn insert_or_append(&mut self, id: WorkId, parent: &H::Instance, before: Option<&H::Instance>) {
        let node = &self.tree[id];
        if node.tag.is_host() {
            let Some(instance) = node.state_node.clone() else {
                return;
            };
            let result = match before {
                Some(before) => self.host.insert_child_to_container(&instance, parent, before),
                None => self.host.append_child_to_container(parent, &instance),
            };
            if let Err(err) = result {
                log::warn!("placement of {id:?} skipped: {err}");
            }
            return;
        }
        let mut child = node.child;
        while let Some(id) = child {
            self.insert_or_append(id, parent, before);
            child = self.tree[id].sibling;
        }
    }

    /// Removes the subtree rooted at `child` (a node of the outgoing tree)
    /// from under `parent`: every top-level host node is detached from the
    /// host parent, references are cleared and effect lists are queued for
    /// teardown.
    fn commit_deletion(&mut self, parent: WorkId, child: WorkId) {
        let mut host_nodes: SmallVec<[H::Instance; 4]> = SmallVec::new();
        let mut stack = vec![(child, false)];
        while let Some((id, below_host)) = stack.pop() {
            let node = &self.tree[id];
            match node.tag {
                WorkTag::HostComponent | WorkTag::HostText => {
                    if let Some(instance) = &node.state_node {
                        if !below_host {
                            host_nodes.push(instance.clone());
                        }
                        if let Some(node_ref) = &node.node_ref {
                            if node_ref.get::<H::Instance>().as_ref() == Some(instance) {
                                node_ref.detach();
                            }
                        }
                    }
                }
                WorkTag::FunctionComponent => {
                    if let NodeState::Component {
                        effects: Some(effects),
                        ..
                    } = &node.state
                    {
                        self.passive.unmount.push(effects.clone());
                    }
                }
                WorkTag::HostRoot | WorkTag::Fragment => {}
            }
            let below_host = below_host || node.tag.is_host();
            let start = stack.len();
            stack.extend(self.tree.children(id).into_iter().map(|id| (id, below_host)));
            stack[start..].reverse();
        }

        self.deleted.push(child);
        if host_nodes.is_empty() {
            return;
        }
        let Some(container) = self.host_parent(Some(parent)) else {
            log::warn!("no host parent for deleted {child:?}, removal skipped");
            return;
        };
        for instance in host_nodes {
            if let Err(err) = self.host.remove_child(&instance, &container) {
                log::warn!("removal of {instance:?} skipped: {err}");
            }
        }
    }

    fn commit_update(&mut self, id: WorkId) {
        let node = &self.tree[id];
        let Some(instance) = &node.state_node else {
            return;
        };
        let result = match (node.tag, &node.pending_props, &node.element_type) {
            (WorkTag::HostText, PendingProps::Text(text), _) => self.host.commit_text_update(instance, text),
            (WorkTag::HostComponent, PendingProps::Props(props), Some(ElementType::Host(tag))) => {
                self.host.commit_update(instance, tag, &props.attrs)
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            log::warn!("update of {id:?} skipped: {err}");
        }
    }

    fn commit_attach_ref(&mut self, id: WorkId) {
        let node = &self.tree[id];
        let previous = node
            .alternate
            .and_then(|alternate| self.tree.get(alternate))
            .and_then(|current| current.node_ref.as_ref());
        if let (Some(previous), Some(instance)) = (previous, &node.state_node) {
            if Some(previous) != node.node_ref.as_ref()
                && previous.get::<H::Instance>().as_ref() == Some(instance)
            {
                previous.detach();
            }
        }
        if let (Some(node_ref), Some(instance)) = (&node.node_ref, &node.state_node) {
            node_ref.attach(Box::new(instance.clone()));
        }
    }
}
