use std::cell::RefCell;
use std::rc::Rc;

use arbor_core::{deps, Component, Dispatch, EffectResult, Element, FiberRoot, Lanes, Props, ReconcileError, SetState};
use arbor_runtime_std::StdRuntime;
use arbor_testing::{NodeHandle, NoopHost};

enum TodoAction {
    Add(String),
    Remove(String),
    MoveToFront(String),
}

fn reduce_todos(todos: &Vec<String>, action: &TodoAction) -> Vec<String> {
    let mut next = todos.clone();
    match action {
        TodoAction::Add(title) => next.push(title.clone()),
        TodoAction::Remove(title) => next.retain(|existing| existing != title),
        TodoAction::MoveToFront(title) => {
            if let Some(position) = next.iter().position(|existing| existing == title) {
                let item = next.remove(position);
                next.insert(0, item);
            }
        }
    }
    next
}

/// Handles the scripted session uses to poke the app from outside.
#[derive(Default)]
struct Controls {
    set_count: Option<SetState<i64>>,
    todos: Option<Dispatch<Vec<String>, TodoAction>>,
}

fn app(controls: Rc<RefCell<Controls>>) -> Component {
    Component::from_closure("App", move |_, hooks| {
        let (count, set_count) = hooks.use_state(|| 0i64)?;
        let (todos, dispatch) = hooks.use_reducer(reduce_todos, Vec::new)?;
        {
            let mut controls = controls.borrow_mut();
            controls.set_count = Some(set_count);
            controls.todos = Some(dispatch);
        }

        hooks.use_effect(
            move || {
                log::info!("title is now \"count: {count}\"");
                EffectResult::teardown(move || log::info!("title \"count: {count}\" retired"))
            },
            Some(deps![count]),
        )?;

        let items = todos
            .iter()
            .map(|title| Element::host("li").key(title).child(title.as_str()));
        Ok(Element::host("div")
            .attr("class", "app")
            .child(Element::host("h1").child(format!("Count: {count}")))
            .child(Element::host("ul").children(items))
            .into())
    })
}

struct Session {
    runtime: StdRuntime,
    root: FiberRoot<NoopHost>,
    container: NodeHandle,
    controls: Rc<RefCell<Controls>>,
}

impl Session {
    fn new() -> Self {
        let runtime = StdRuntime::new();
        let mut host = NoopHost::new();
        let container = host.create_container();
        let root = FiberRoot::create_container(container, host, runtime.handle());
        Self {
            runtime,
            root,
            container,
            controls: Rc::default(),
        }
    }

    fn settle(&self, step: &str) -> Result<(), ReconcileError> {
        self.runtime.run_until_idle();
        if let Some(err) = self.root.take_error() {
            return Err(err);
        }
        let (snapshot, mutations) = self.root.with_host_mut(|host| {
            let mutations = host.take_ops().iter().filter(|op| op.is_mutation()).count();
            (host.snapshot(self.container), mutations)
        });
        println!("{step:<28} {mutations:>2} host mutations  {snapshot}");
        Ok(())
    }

    fn with_controls(&self, f: impl FnOnce(&Controls)) {
        f(&self.controls.borrow());
    }

    fn todo(&self, action: TodoAction) {
        self.with_controls(|controls| {
            if let Some(todos) = &controls.todos {
                todos.dispatch(action);
            }
        });
    }
}

fn main() -> Result<(), ReconcileError> {
    env_logger::init();

    println!("=== arbor counter demo ===");
    let session = Session::new();
    let app = app(Rc::clone(&session.controls));

    session
        .root
        .update_container(Element::component(&app, Props::new()))?;
    session.settle("mount")?;

    session.with_controls(|controls| {
        if let Some(set_count) = &controls.set_count {
            set_count.update(|count| count + 1);
            set_count.update(|count| count + 1);
        }
    });
    session.settle("two increments, one pass")?;

    for title in ["write", "test", "ship"] {
        session.todo(TodoAction::Add(title.to_owned()));
    }
    session.settle("add three todos")?;

    session.todo(TodoAction::MoveToFront("ship".to_owned()));
    session.settle("move ship to front")?;

    session.todo(TodoAction::Remove("test".to_owned()));
    session.settle("remove test")?;

    session.runtime.scheduler().set_yield_budget(Some(2));
    session.with_controls(|controls| {
        if let Some(set_count) = &controls.set_count {
            set_count.update_with_lane(|count| count * 10, Lanes::DEFAULT);
        }
    });
    session.runtime.scheduler().run_next_task();
    println!(
        "{:<28} pass in progress: {}",
        "default lane, first slice",
        session.root.has_pass_in_progress()
    );
    session.runtime.scheduler().set_yield_budget(None);
    session.settle("default lane, finished")?;

    session.root.unmount()?;
    session.settle("unmount")?;
    Ok(())
}
