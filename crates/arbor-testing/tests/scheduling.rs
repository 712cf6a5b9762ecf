use std::cell::{Cell, RefCell};
use std::rc::Rc;

use arbor_testing::prelude::*;

fn paragraph(text: &str) -> Element {
    Element::host("p").child(text)
}

fn three_items() -> Element {
    Element::host("ul").children(["a", "b", "c"].map(|text| Element::host("li").child(text)))
}

#[test]
fn yielding_pass_commits_only_once_finished() {
    let test = TestRoot::new();
    test.scheduler().set_yield_budget(Some(2));

    test.schedule(three_items(), Lanes::DEFAULT).unwrap();
    assert!(test.run_next_task());

    assert!(test.root().has_pass_in_progress());
    assert_eq!(test.snapshot(), "");
    assert_eq!(test.root().pending_lanes(), Lanes::DEFAULT);

    test.pump_until_idle().unwrap();
    assert!(!test.root().has_pass_in_progress());
    assert!(test.root().pending_lanes().is_empty());
    assert_eq!(
        test.snapshot(),
        "<ul><li>a</li><li>b</li><li>c</li></ul>"
    );
}

#[test]
fn resumed_pass_does_not_render_finished_components_again() {
    let test = TestRoot::new();
    let renders = Rc::new(Cell::new(0));
    let app = {
        let renders = Rc::clone(&renders);
        Component::from_closure("App", move |_, _| {
            renders.set(renders.get() + 1);
            Ok(three_items().into())
        })
    };
    test.scheduler().set_yield_budget(Some(1));

    test.schedule(Element::component(&app, Props::new()), Lanes::DEFAULT)
        .unwrap();
    let mut tasks = 0;
    while test.run_next_task() {
        tasks += 1;
    }

    assert!(tasks > 1);
    assert_eq!(renders.get(), 1);
    assert_eq!(
        test.snapshot(),
        "<ul><li>a</li><li>b</li><li>c</li></ul>"
    );
}

#[test]
fn sync_update_preempts_a_yielded_pass() {
    let test = TestRoot::new();
    test.scheduler().set_yield_budget(Some(1));

    test.schedule(paragraph("default"), Lanes::DEFAULT).unwrap();
    assert!(test.run_next_task());
    assert!(test.root().has_pass_in_progress());

    test.root().update_container(paragraph("sync")).unwrap();
    test.run_microtasks();

    assert_eq!(test.snapshot(), "<p>sync</p>");
    assert_eq!(test.root().pending_lanes(), Lanes::DEFAULT);
    assert!(!test.root().has_pass_in_progress());

    test.pump_until_idle().unwrap();
    assert_eq!(test.snapshot(), "<p>default</p>");

    // Nodes of the abandoned pass are gone.
    let reference = TestRoot::new();
    reference.render(paragraph("sync")).unwrap();
    reference.render(paragraph("default")).unwrap();
    assert_eq!(test.live_work_nodes(), reference.live_work_nodes());
}

#[test]
fn more_urgent_lane_restarts_the_pass() {
    let test = TestRoot::new();
    test.scheduler().set_yield_budget(Some(1));

    test.schedule(paragraph("transition"), Lanes::TRANSITION)
        .unwrap();
    assert!(test.run_next_task());
    assert!(test.root().has_pass_in_progress());

    test.schedule(paragraph("input"), Lanes::INPUT_CONTINUOUS)
        .unwrap();
    test.scheduler().set_yield_budget(None);
    assert!(test.run_next_task());

    assert_eq!(test.snapshot(), "<p>input</p>");
    assert_eq!(test.root().pending_lanes(), Lanes::TRANSITION);

    test.pump_until_idle().unwrap();
    assert_eq!(test.snapshot(), "<p>transition</p>");
    assert!(test.root().pending_lanes().is_empty());
}

#[test]
fn update_behind_the_cursor_gets_a_follow_up_pass() {
    let test = TestRoot::new();
    let setter: Rc<RefCell<Option<SetState<i64>>>> = Rc::default();
    let app = {
        let setter = Rc::clone(&setter);
        Component::from_closure("App", move |_, hooks| {
            let (count, set_count) = hooks.use_state(|| 0i64)?;
            *setter.borrow_mut() = Some(set_count);
            Ok(Element::host("div").child(count).into())
        })
    };
    test.render(Element::component(&app, Props::new())).unwrap();
    let set = |value: i64| {
        if let Some(set) = setter.borrow().as_ref() {
            set.set_with_lane(value, Lanes::DEFAULT);
        }
    };

    test.scheduler().set_yield_budget(Some(2));
    set(1);
    // Root and App render, then the pass yields.
    assert!(test.run_next_task());
    assert!(test.root().has_pass_in_progress());

    set(2);
    assert!(test.run_next_task());
    assert_eq!(test.snapshot(), "<div>1</div>");
    assert_eq!(test.root().pending_lanes(), Lanes::DEFAULT);

    test.pump_until_idle().unwrap();
    assert_eq!(test.snapshot(), "<div>2</div>");
    assert!(test.root().pending_lanes().is_empty());
}

#[test]
fn effects_of_an_abandoned_pass_never_run() {
    let test = TestRoot::new();
    let setups = Rc::new(Cell::new(0));
    let component = {
        let setups = Rc::clone(&setups);
        Component::from_closure("Effectful", move |_, hooks| {
            let setups = Rc::clone(&setups);
            hooks.use_effect(
                move || {
                    setups.set(setups.get() + 1);
                    EffectResult::none()
                },
                Some(deps![]),
            )?;
            Ok("mounted".into())
        })
    };
    test.scheduler().set_yield_budget(Some(2));

    test.schedule(Element::component(&component, Props::new()), Lanes::DEFAULT)
        .unwrap();
    assert!(test.run_next_task());
    assert!(test.root().has_pass_in_progress());

    test.root().update_container(paragraph("sync")).unwrap();
    test.run_microtasks();
    assert_eq!(test.snapshot(), "<p>sync</p>");
    assert_eq!(setups.get(), 0);

    test.pump_until_idle().unwrap();
    assert_eq!(test.snapshot(), "mounted");
    assert_eq!(setups.get(), 1);
}

#[test]
fn pending_passive_effects_flush_before_the_next_render() {
    let test = TestRoot::new();
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let component = {
        let log = Rc::clone(&log);
        Component::from_closure("Tracked", move |props, hooks| {
            let v = props.attr("v").and_then(|value| value.as_int()).unwrap_or(0);
            let log = Rc::clone(&log);
            hooks.use_effect(
                move || {
                    log.borrow_mut().push(format!("setup {v}"));
                    EffectResult::teardown(move || log.borrow_mut().push(format!("teardown {v}")))
                },
                Some(deps![v]),
            )?;
            Ok(Child::Empty)
        })
    };
    let element = |v: i64| Element::component(&component, Props::new().with_attr("v", v));

    test.root().update_container(element(1)).unwrap();
    test.run_microtasks();
    assert!(log.borrow().is_empty());

    test.root().update_container(element(2)).unwrap();
    test.run_microtasks();
    assert_eq!(*log.borrow(), vec!["setup 1"]);

    test.pump_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["setup 1", "teardown 1", "setup 2"]);
}

#[test]
fn flush_sync_work_renders_without_waiting_for_the_microtask() {
    let test = TestRoot::new();
    test.root().update_container(paragraph("now")).unwrap();
    assert_eq!(test.snapshot(), "");

    test.root().flush_sync_work().unwrap();
    assert_eq!(test.snapshot(), "<p>now</p>");

    // The microtask finds nothing left to do.
    test.take_ops();
    test.pump_until_idle().unwrap();
    assert!(test.take_ops().is_empty());
}

#[test]
fn flush_sync_work_reports_a_failed_pass() {
    fn broken(_: &Props, _: &mut Hooks<'_>) -> RenderResult {
        Err(RenderError::component("Broken", "no"))
    }
    let test = TestRoot::new();
    let broken = Component::new("Broken", broken);

    test.root()
        .update_container(Element::component(&broken, Props::new()))
        .unwrap();
    let err = test.root().flush_sync_work().unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Render(RenderError::Component { component: "Broken", .. })
    ));
    assert!(test.root().take_error().is_none());
}

#[test]
fn passive_flush_runs_as_a_normal_priority_task() {
    let test = TestRoot::new();
    let ran = Rc::new(Cell::new(false));
    let component = {
        let ran = Rc::clone(&ran);
        Component::from_closure("Passive", move |_, hooks| {
            let ran = Rc::clone(&ran);
            hooks.use_effect(
                move || {
                    ran.set(true);
                    EffectResult::none()
                },
                None,
            )?;
            Ok(Child::Empty)
        })
    };

    test.root()
        .update_container(Element::component(&component, Props::new()))
        .unwrap();
    test.run_microtasks();
    assert!(!ran.get());
    assert_eq!(test.scheduler().pending_tasks(), 1);

    assert!(test.run_next_task());
    assert!(ran.get());
    assert!(test.scheduler().is_idle());
}
