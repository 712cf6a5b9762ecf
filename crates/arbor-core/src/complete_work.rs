//! Complete phase: build or diff host representations and bubble flags.

use crate::element::ElementType;
use crate::flags::Flags;
use crate::host::HostConfig;
use crate::root::RootInner;
use crate::work::{PendingProps, WorkId, WorkTag, WorkTree};

impl<H: HostConfig + 'static> RootInner<H> {
    pub(crate) fn complete_work(&self, wip: WorkId) {
        let mut tree = self.tree.borrow_mut();
        let tag = tree[wip].tag;
        let current = tree[wip].alternate.filter(|alternate| tree.contains(*alternate));

        match tag {
            WorkTag::HostComponent => {
                let update = current.filter(|_| tree[wip].state_node.is_some());
                match update {
                    Some(current) => {
                        let changed = {
                            let old = tree[current].memoized_props.as_ref().and_then(PendingProps::props);
                            let new = tree[wip].pending_props.props();
                            old.map(|props| &props.attrs) != new.map(|props| &props.attrs)
                        };
                        if changed {
                            tree[wip].flags |= Flags::UPDATE;
                        }
                    }
                    None => self.create_host_element(&mut tree, wip),
                }
                let current_ref = current.and_then(|current| tree[current].node_ref.clone());
                if tree[wip].node_ref != current_ref {
                    tree[wip].flags |= Flags::REF;
                }
            }
            WorkTag::HostText => {
                let update = current.filter(|_| tree[wip].state_node.is_some());
                match update {
                    Some(current) => {
                        let old = tree[current].memoized_props.as_ref().and_then(PendingProps::text);
                        if old != tree[wip].pending_props.text() {
                            tree[wip].flags |= Flags::UPDATE;
                        }
                    }
                    None => {
                        let text = tree[wip].pending_props.text().cloned().unwrap_or_default();
                        match self.host.borrow_mut().create_text_instance(&text) {
                            Ok(instance) => tree[wip].state_node = Some(instance),
                            Err(err) => log::warn!("text node {wip:?} not created: {err}"),
                        }
                    }
                }
            }
            WorkTag::HostRoot | WorkTag::FunctionComponent | WorkTag::Fragment => {}
        }

        bubble_properties(&mut tree, wip);
    }

    fn create_host_element(&self, tree: &mut WorkTree<H::Instance>, wip: WorkId) {
        let created = {
            let node = &tree[wip];
            let Some(ElementType::Host(tag)) = &node.element_type else {
                log::warn!("host node {wip:?} has no tag");
                return;
            };
            let attrs = node.pending_props.props().map(|props| &props.attrs);
            let empty = Default::default();
            self.host
                .borrow_mut()
                .create_instance(tag, attrs.unwrap_or(&empty))
        };
        match created {
            Ok(instance) => {
                self.append_all_children(tree, wip, &instance);
                tree[wip].state_node = Some(instance);
            }
            Err(err) => log::warn!("element {wip:?} not created: {err}"),
        }
    }

    /// Attaches the top-level host nodes below `wip` to its fresh instance,
    /// looking through components and fragments.
    fn append_all_children(&self, tree: &WorkTree<H::Instance>, wip: WorkId, parent: &H::Instance) {
        let mut host = self.host.borrow_mut();
        let mut node = match tree[wip].child {
            Some(child) => child,
            None => return,
        };
        loop {
            let current = &tree[node];
            if current.tag.is_host() {
                if let Some(instance) = &current.state_node {
                    if let Err(err) = host.append_initial_child(parent, instance) {
                        log::warn!("initial child {node:?} not attached: {err}");
                    }
                }
            } else if let Some(child) = current.child {
                node = child;
                continue;
            }

            loop {
                if let Some(sibling) = tree[node].sibling {
                    node = sibling;
                    break;
                }
                match tree[node].parent {
                    Some(parent) if parent != wip => node = parent,
                    _ => return,
                }
            }
        }
    }
}

fn bubble_properties<I: Clone>(tree: &mut WorkTree<I>, wip: WorkId) {
    let mut subtree_flags = Flags::empty();
    let mut cursor = tree[wip].child;
    while let Some(child) = cursor {
        let node = &mut tree[child];
        subtree_flags |= node.subtree_flags | node.flags;
        node.parent = Some(wip);
        cursor = node.sibling;
    }
    tree[wip].subtree_flags = subtree_flags;
}
