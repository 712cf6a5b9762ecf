use super::*;
use crate::child_reconciler::reconcile_child_nodes;
use crate::work::PendingProps;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

#[derive(Default)]
struct ManualScheduler {
    microtasks: RefCell<VecDeque<Task>>,
    tasks: RefCell<Vec<(Priority, u64, Task)>>,
    next_id: Cell<u64>,
}

impl ManualScheduler {
    fn run(&self) {
        loop {
            let microtask = self.microtasks.borrow_mut().pop_front();
            if let Some(task) = microtask {
                task();
                continue;
            }
            let next = {
                let mut tasks = self.tasks.borrow_mut();
                let position = tasks
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, (priority, id, _))| (*priority, *id))
                    .map(|(position, _)| position);
                position.map(|position| tasks.remove(position))
            };
            match next {
                Some((_, _, task)) => task(),
                None => break,
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.microtasks.borrow().is_empty() && self.tasks.borrow().is_empty()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_microtask(&self, task: Task) {
        self.microtasks.borrow_mut().push_back(task);
    }

    fn schedule_callback(&self, priority: Priority, task: Task) -> TaskHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.tasks.borrow_mut().push((priority, id, task));
        TaskHandle(id)
    }

    fn cancel_callback(&self, handle: TaskHandle) {
        self.tasks.borrow_mut().retain(|(_, id, _)| *id != handle.0);
    }

    fn should_yield(&self) -> bool {
        false
    }
}

/// Host keeping every parent's children as a vector of ids. Id 0 is the
/// container.
#[derive(Default)]
struct VecHost {
    next: u32,
    labels: HashMap<u32, String>,
    children: HashMap<u32, Vec<u32>>,
}

impl VecHost {
    fn detach(&mut self, child: u32) {
        for siblings in self.children.values_mut() {
            siblings.retain(|existing| *existing != child);
        }
    }

    fn render(&self, id: u32) -> String {
        let label = self.labels.get(&id).cloned().unwrap_or_default();
        let children: Vec<String> = self
            .children
            .get(&id)
            .map(|children| children.iter().map(|child| self.render(*child)).collect())
            .unwrap_or_default();
        if children.is_empty() {
            label
        } else {
            format!("{label}({})", children.join(","))
        }
    }

    fn fresh(&mut self, label: &str) -> u32 {
        self.next += 1;
        self.labels.insert(self.next, label.to_owned());
        self.next
    }
}

impl HostConfig for VecHost {
    type Instance = u32;

    fn create_instance(&mut self, tag: &str, _attrs: &Attributes) -> Result<u32, HostError> {
        Ok(self.fresh(tag))
    }

    fn create_text_instance(&mut self, text: &str) -> Result<u32, HostError> {
        Ok(self.fresh(text))
    }

    fn append_initial_child(&mut self, parent: &u32, child: &u32) -> Result<(), HostError> {
        self.children.entry(*parent).or_default().push(*child);
        Ok(())
    }

    fn append_child_to_container(&mut self, container: &u32, child: &u32) -> Result<(), HostError> {
        self.detach(*child);
        self.children.entry(*container).or_default().push(*child);
        Ok(())
    }

    fn insert_child_to_container(&mut self, child: &u32, container: &u32, before: &u32) -> Result<(), HostError> {
        self.detach(*child);
        let siblings = self.children.entry(*container).or_default();
        let position = siblings
            .iter()
            .position(|existing| existing == before)
            .ok_or_else(|| HostError::MissingAnchor {
                handle: before.to_string(),
            })?;
        siblings.insert(position, *child);
        Ok(())
    }

    fn remove_child(&mut self, child: &u32, container: &u32) -> Result<(), HostError> {
        let siblings = self.children.entry(*container).or_default();
        let before = siblings.len();
        siblings.retain(|existing| existing != child);
        if siblings.len() == before {
            return Err(HostError::Missing {
                handle: child.to_string(),
            });
        }
        Ok(())
    }

    fn commit_text_update(&mut self, instance: &u32, text: &str) -> Result<(), HostError> {
        self.labels.insert(*instance, text.to_owned());
        Ok(())
    }
}

fn new_root() -> (FiberRoot<VecHost>, Rc<ManualScheduler>) {
    let scheduler = Rc::new(ManualScheduler::default());
    let root = FiberRoot::create_container(0, VecHost::default(), scheduler.clone());
    (root, scheduler)
}

fn rendered(root: &FiberRoot<VecHost>) -> String {
    root.with_host(|host| host.render(0))
}

fn keyed(keys: &[&str]) -> Child {
    Child::list(keys.iter().map(|key| Element::host("li").key(key)))
}

/// Mounts `children` under a fresh parent and returns it as the current node.
fn mount(children: Child) -> (WorkTree<u32>, WorkId) {
    let mut tree = WorkTree::new();
    let parent = tree.create_work_node(WorkTag::HostRoot, None, PendingProps::Root);
    let first = reconcile_child_nodes(&mut tree, parent, None, children, false);
    tree[parent].child = first;
    (tree, parent)
}

fn update(tree: &mut WorkTree<u32>, current: WorkId, children: Child) -> WorkId {
    let wip = tree.clone_for_update(current, PendingProps::Root);
    let current_first = tree[current].child;
    let first = reconcile_child_nodes(tree, wip, current_first, children, true);
    tree[wip].child = first;
    wip
}

fn keys_of(tree: &WorkTree<u32>, ids: &[WorkId]) -> Vec<String> {
    ids.iter()
        .map(|id| tree[*id].key().map(|key| key.to_string()).unwrap_or_default())
        .collect()
}

#[test]
fn mount_records_no_effects_on_children() {
    let (tree, parent) = mount(keyed(&["a", "b"]));
    let children = tree.children(parent);
    assert_eq!(keys_of(&tree, &children), vec!["a", "b"]);
    for (index, id) in children.iter().enumerate() {
        assert!(tree[*id].flags().is_empty());
        assert_eq!(tree[*id].index(), index);
        assert_eq!(tree[*id].parent(), Some(parent));
    }
}

#[test]
fn moving_last_to_front_places_the_others() {
    let (mut tree, current) = mount(keyed(&["a", "b", "c"]));
    let old = tree.children(current);

    let wip = update(&mut tree, current, keyed(&["c", "a", "b"]));
    let new = tree.children(wip);

    assert_eq!(keys_of(&tree, &new), vec!["c", "a", "b"]);
    assert!(!tree[new[0]].flags().contains(Flags::PLACEMENT));
    assert!(tree[new[1]].flags().contains(Flags::PLACEMENT));
    assert!(tree[new[2]].flags().contains(Flags::PLACEMENT));
    assert_eq!(tree[new[0]].alternate(), Some(old[2]));
    assert_eq!(tree[new[1]].alternate(), Some(old[0]));
    assert!(tree[wip].deletions().is_empty());
}

#[test]
fn appended_child_is_the_only_placement() {
    let (mut tree, current) = mount(keyed(&["a", "b"]));
    let wip = update(&mut tree, current, keyed(&["a", "b", "c"]));
    let flags: Vec<bool> = tree
        .children(wip)
        .iter()
        .map(|id| tree[*id].flags().contains(Flags::PLACEMENT))
        .collect();
    assert_eq!(flags, vec![false, false, true]);
    assert_eq!(tree[tree.children(wip)[2]].alternate(), None);
}

#[test]
fn unmatched_old_children_are_queued_for_deletion() {
    let (mut tree, current) = mount(keyed(&["a", "b", "c", "d"]));
    let old = tree.children(current);

    let wip = update(&mut tree, current, keyed(&["d", "a"]));

    assert_eq!(tree[wip].deletions(), &[old[1], old[2]]);
    assert!(tree[wip].flags().contains(Flags::CHILD_DELETION));
}

#[test]
fn single_element_with_matching_key_but_other_type_replaces_the_chain() {
    let (mut tree, current) = mount(keyed(&["a", "b", "c"]));
    let old = tree.children(current);

    let wip = update(
        &mut tree,
        current,
        Element::host("p").key("b").into(),
    );

    assert_eq!(tree[wip].deletions(), &[old[0], old[1], old[2]]);
    let new = tree.children(wip);
    assert_eq!(new.len(), 1);
    assert!(tree[new[0]].flags().contains(Flags::PLACEMENT));
    assert_eq!(tree[new[0]].alternate(), None);
}

#[test]
fn single_element_reuses_its_keyed_match() {
    let (mut tree, current) = mount(keyed(&["a", "b", "c"]));
    let old = tree.children(current);

    let wip = update(&mut tree, current, Element::host("li").key("b").into());

    assert_eq!(tree[wip].deletions(), &[old[0], old[2]]);
    let new = tree.children(wip);
    assert_eq!(tree[new[0]].alternate(), Some(old[1]));
    assert_eq!(tree[new[0]].index(), 0);
    assert!(tree[new[0]].flags().is_empty());
}

#[test]
fn empty_children_delete_everything() {
    let (mut tree, current) = mount(keyed(&["a", "b"]));
    let old = tree.children(current);

    let wip = update(&mut tree, current, Child::Empty);

    assert_eq!(tree[wip].child(), None);
    assert_eq!(tree[wip].deletions(), &old[..]);
}

#[test]
fn unkeyed_text_children_match_by_position() {
    let (mut tree, current) = mount(Child::list(["x", "y"]));
    let old = tree.children(current);

    let wip = update(&mut tree, current, Child::list(["x", "z"]));
    let new = tree.children(wip);

    assert_eq!(tree[new[0]].alternate(), Some(old[0]));
    assert_eq!(tree[new[1]].alternate(), Some(old[1]));
    assert!(new.iter().all(|id| tree[*id].flags().is_empty()));
    assert!(tree[wip].deletions().is_empty());
}

#[test]
fn nested_list_becomes_a_fragment_matched_by_position() {
    let (mut tree, current) = mount(Child::list([keyed(&["a"]), Child::text("tail")]));
    let old = tree.children(current);
    assert_eq!(tree[old[0]].tag(), WorkTag::Fragment);

    let wip = update(
        &mut tree,
        current,
        Child::list([keyed(&["a", "b"]), Child::text("tail")]),
    );
    let new = tree.children(wip);
    assert_eq!(tree[new[0]].alternate(), Some(old[0]));
    assert_eq!(tree[new[1]].alternate(), Some(old[1]));
}

#[test]
fn freeing_a_slot_invalidates_old_ids() {
    let (mut tree, parent) = mount(keyed(&["a"]));
    let child = tree.children(parent)[0];
    let live = tree.live_count();

    tree.free_subtree(child);
    assert!(!tree.contains(child));
    assert_eq!(tree.live_count(), live - 1);

    let reused = tree.create_work_node(WorkTag::HostText, None, PendingProps::Text("t".into()));
    assert_ne!(reused, child);
    assert!(tree.get(child).is_none());
}

#[test]
fn sync_updates_in_one_turn_share_a_microtask() {
    let (root, scheduler) = new_root();
    root.update_container(Element::host("a")).unwrap();
    root.update_container(Element::host("b").child("text")).unwrap();
    assert_eq!(scheduler.microtasks.borrow().len(), 1);

    scheduler.run();
    assert_eq!(rendered(&root), "(b(text))");
    assert!(root.pending_lanes().is_empty());
}

#[test]
fn flushing_sync_work_from_a_render_is_rejected() {
    let (root, scheduler) = new_root();
    let slot: Rc<RefCell<Option<FiberRoot<VecHost>>>> = Rc::new(RefCell::new(Some(root.clone())));
    let seen: Rc<RefCell<Option<Result<(), ReconcileError>>>> = Rc::default();
    let nested = {
        let slot = Rc::clone(&slot);
        let seen = Rc::clone(&seen);
        Component::from_closure("Nested", move |_, _| {
            if let Some(root) = slot.borrow().as_ref() {
                *seen.borrow_mut() = Some(root.flush_sync_work());
            }
            Ok(Child::Empty)
        })
    };

    root.update_container(Element::component(&nested, Props::new()))
        .unwrap();
    scheduler.run();

    assert_eq!(*seen.borrow(), Some(Err(ReconcileError::Reentrant)));
    slot.borrow_mut().take();
}

#[test]
fn callbacks_outliving_their_root_do_nothing() {
    let (root, scheduler) = new_root();
    root.update_container(Element::host("div")).unwrap();
    drop(root);

    scheduler.run();
    assert!(scheduler.is_idle());
}

#[test]
fn default_lane_renders_from_a_prioritized_task() {
    let (root, scheduler) = new_root();
    root.update_container_with_lane(Element::host("div"), Lanes::DEFAULT)
        .unwrap();

    assert!(scheduler.microtasks.borrow().is_empty());
    assert_eq!(scheduler.tasks.borrow().len(), 1);
    assert_eq!(scheduler.tasks.borrow()[0].0, Priority::Normal);

    scheduler.run();
    assert_eq!(rendered(&root), "(div)");
}

#[test]
fn moved_children_land_in_their_new_order() {
    let (root, scheduler) = new_root();
    let list = |keys: &[&str]| {
        Element::host("ul").children(keys.iter().map(|key| Element::host("li").key(key).child(*key)))
    };

    root.update_container(list(&["a", "b", "c", "d"])).unwrap();
    scheduler.run();
    assert_eq!(rendered(&root), "(ul(li(a),li(b),li(c),li(d)))");

    root.update_container(list(&["d", "b", "a", "c"])).unwrap();
    scheduler.run();
    assert_eq!(rendered(&root), "(ul(li(d),li(b),li(a),li(c)))");

    root.update_container(list(&["b", "e", "d"])).unwrap();
    scheduler.run();
    assert_eq!(rendered(&root), "(ul(li(b),li(e),li(d)))");
}
