//! Begin phase: derive a node's children and reconcile them.

use crate::child_reconciler::reconcile_child_nodes;
use crate::element::{Child, ElementType};
use crate::error::RenderError;
use crate::hooks::{Hooks, UpdateSink};
use crate::host::HostConfig;
use crate::lanes::Lane;
use crate::root::RootInner;
use crate::work::{NodeState, PendingProps, WorkId, WorkTag};

impl<H: HostConfig + 'static> RootInner<H> {
    /// Returns the first child to work on next, if any.
    pub(crate) fn begin_work(&self, wip: WorkId, lane: Lane) -> Result<Option<WorkId>, RenderError> {
        let tag = self.tree.borrow()[wip].tag;
        match tag {
            WorkTag::HostRoot => Ok(self.update_host_root(wip, lane)),
            WorkTag::HostComponent => {
                let children = match &self.tree.borrow()[wip].pending_props {
                    PendingProps::Props(props) => props.children.clone(),
                    _ => Child::Empty,
                };
                Ok(self.reconcile_children(wip, children))
            }
            WorkTag::HostText => Ok(None),
            WorkTag::Fragment => {
                let children = match &self.tree.borrow()[wip].pending_props {
                    PendingProps::Children(children) => children.clone(),
                    _ => Child::Empty,
                };
                Ok(self.reconcile_children(wip, children))
            }
            WorkTag::FunctionComponent => self.update_function_component(wip, lane),
        }
    }

    fn update_host_root(&self, wip: WorkId, lane: Lane) -> Option<WorkId> {
        let base = match &self.tree.borrow()[wip].state {
            NodeState::Root { element } => element.clone(),
            _ => Child::Empty,
        };
        let processed = self.root_queue.process(&base, lane);
        self.render
            .consumed
            .borrow_mut()
            .record(self.root_queue.clone(), processed.consumed);
        self.tree.borrow_mut()[wip].state = NodeState::Root {
            element: processed.state.clone(),
        };
        self.reconcile_children(wip, processed.state)
    }

    fn update_function_component(&self, wip: WorkId, lane: Lane) -> Result<Option<WorkId>, RenderError> {
        let (component, props, previous) = {
            let tree = self.tree.borrow();
            let node = &tree[wip];
            let component = match &node.element_type {
                Some(ElementType::Component(component)) => component.clone(),
                other => {
                    log::warn!("function component {wip:?} has element type {other:?}");
                    return Ok(None);
                }
            };
            let props = node.pending_props.props().cloned().unwrap_or_default();
            let previous = match &node.state {
                NodeState::Component { hooks, .. } => Some(hooks.clone()),
                _ => None,
            };
            (component, props, previous)
        };

        let sink: std::rc::Weak<dyn UpdateSink> = self.this.clone();
        let children;
        let rendered;
        {
            let mut consumed = self.render.consumed.borrow_mut();
            let mut hooks = Hooks::new(
                component.name(),
                wip,
                lane,
                previous.as_deref(),
                sink,
                &mut consumed,
            );
            children = component.render(&props, &mut hooks)?;
            rendered = hooks.finish()?;
        }

        {
            let mut tree = self.tree.borrow_mut();
            let node = &mut tree[wip];
            node.state = NodeState::Component {
                hooks: rendered.hooks,
                effects: rendered.effects,
            };
            node.flags |= rendered.flags;
        }
        Ok(self.reconcile_children(wip, children))
    }

    fn reconcile_children(&self, wip: WorkId, children: Child) -> Option<WorkId> {
        let mut tree = self.tree.borrow_mut();
        let current_child = tree[wip]
            .alternate
            .and_then(|alternate| tree.get(alternate))
            .map(|current| current.child);
        let first = match current_child {
            Some(current_first) => reconcile_child_nodes(&mut *tree, wip, current_first, children, true),
            None => reconcile_child_nodes(&mut *tree, wip, None, children, false),
        };
        tree[wip].child = first;
        first
    }
}
