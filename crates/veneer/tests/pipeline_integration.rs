//! Integration tests for the full rendering pipeline.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use serde::Serialize;
use serde_json::json;
use veneer::{scope_from_data, Pipeline, Scope};
use veneer_dispatch::Details;

#[derive(Serialize)]
struct Page {
    title: String,
    items: Vec<String>,
}

fn collecting_pipeline() -> (Pipeline, Rc<RefCell<Vec<Details>>>) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let events_clone = events.clone();
    let pipeline = Pipeline::builder()
        .on_error(Rc::new(move |d: &Details| {
            events_clone.borrow_mut().push(d.clone())
        }))
        .build();
    (pipeline, events)
}

#[test]
fn test_conditional_rendering_with_typed_data() {
    let pipeline = Pipeline::builder().build();
    let page = Page {
        title: "Inbox".to_string(),
        items: vec!["a".into(), "b".into()],
    };

    let out = pipeline
        .render_str(
            "@if($items)<h1>{{ $title }}</h1>@foreach($items as $item)<li>{{ $item }}</li>@endforeach@endif",
            &page,
        )
        .unwrap();
    assert_eq!(out, "<h1>Inbox</h1><li>a</li><li>b</li>");
}

#[test]
fn test_loop_directives_end_to_end() {
    let pipeline = Pipeline::builder().build();

    let out = pipeline
        .render_str("@for($i = 1; $i <= 3; $i++){{ $i }}@endfor", &json!({}))
        .unwrap();
    assert_eq!(out, "123");

    let out = pipeline
        .render_str(
            "@switch($status)@case('open')OPEN@break@case('done')DONE@break@default ?@endswitch",
            &json!({"status": "done"}),
        )
        .unwrap();
    assert_eq!(out, "DONE");
}

#[test]
fn test_comments_leave_no_trace() {
    let pipeline = Pipeline::builder().build();
    let out = pipeline
        .render_str("before{{-- internal note --}}after", &json!({}))
        .unwrap();
    assert_eq!(out, "beforeafter");
}

#[test]
fn test_error_event_fires_once_with_payload() {
    let (pipeline, events) = collecting_pipeline();

    let out = pipeline
        .render_str("@if($var)never closed", &json!({"var": true}))
        .unwrap();
    assert_eq!(out, "");

    let events = events.borrow();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert!(event["code"].as_str().unwrap().contains("<% if("));
    assert_eq!(event["arguments"]["var"], json!(true));
    assert!(event.contains_key("error"));
    // The injected escape callable shows up as a placeholder, not data.
    assert_eq!(event["arguments"]["escape"], json!("<callable>"));
}

#[test]
fn test_successful_render_fires_no_events() {
    let (pipeline, events) = collecting_pipeline();
    pipeline.render_str("{{ $x }}", &json!({"x": 1})).unwrap();
    assert!(events.borrow().is_empty());
}

#[test]
fn test_ambient_details_empty_after_success_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("good.html"), "ok").unwrap();
    std::fs::write(dir.path().join("bad.html"), "@if($x)open").unwrap();

    let pipeline = Pipeline::builder()
        .templates_are_paths(true)
        .template_root(dir.path())
        .template_extension("html")
        .build();

    assert_eq!(
        pipeline
            .render_scope("good", Scope::new(), false)
            .unwrap(),
        "ok"
    );
    assert!(pipeline
        .dispatcher()
        .ambient_details("template_error")
        .is_empty());

    // The failing template reports through the dispatcher but still
    // detaches its details.
    assert_eq!(
        pipeline.render_scope("bad", Scope::new(), false).unwrap(),
        ""
    );
    assert!(pipeline
        .dispatcher()
        .ambient_details("template_error")
        .is_empty());
}

#[test]
fn test_error_event_carries_template_detail() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.html"), "{{ $f( }}").unwrap();

    let events = Rc::new(RefCell::new(Vec::new()));
    let events_clone = events.clone();
    let pipeline = Pipeline::builder()
        .templates_are_paths(true)
        .template_root(dir.path())
        .template_extension("html")
        .on_error(Rc::new(move |d: &Details| {
            events_clone.borrow_mut().push(d.clone())
        }))
        .build();

    pipeline.render_scope("broken", Scope::new(), false).unwrap();

    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["template"], json!("broken"));
}

#[test]
fn test_missing_template_file_renders_empty_without_event() {
    let dir = tempfile::tempdir().unwrap();
    let (events, pipeline) = {
        let events = Rc::new(RefCell::new(Vec::new()));
        let events_clone = events.clone();
        let pipeline = Pipeline::builder()
            .templates_are_paths(true)
            .template_root(dir.path())
            .on_error(Rc::new(move |d: &Details| {
                events_clone.borrow_mut().push(d.clone())
            }))
            .build();
        (events, pipeline)
    };

    let out = pipeline
        .render_scope("does-not-exist", Scope::new(), false)
        .unwrap();
    assert_eq!(out, "");
    assert!(events.borrow().is_empty());
}

#[test]
fn test_file_templates_see_globals() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("banner.html")).unwrap();
    write!(file, "{{{{ $site }}}} / {{{{ $page }}}}").unwrap();

    let pipeline = Pipeline::builder()
        .templates_are_paths(true)
        .template_root(dir.path())
        .template_extension("html")
        .globals(scope_from_data([("site", json!("Example"))]))
        .build();

    let out = pipeline
        .render_scope("banner", scope_from_data([("page", json!("Home"))]), false)
        .unwrap();
    assert_eq!(out, "Example / Home");
}

#[test]
fn test_shared_dispatcher_across_pipelines() {
    let dispatcher = Rc::new(veneer_dispatch::EventDispatcher::new());
    let count = Rc::new(RefCell::new(0));
    let count_clone = count.clone();
    dispatcher.add_listener(
        "template_error",
        Rc::new(move |_| *count_clone.borrow_mut() += 1),
    );

    let a = Pipeline::builder().dispatcher(dispatcher.clone()).build();
    let b = Pipeline::builder().dispatcher(dispatcher).build();

    a.render_str("@if($x)open", &json!({})).unwrap();
    b.render_str("@if($y)open", &json!({})).unwrap();
    assert_eq!(*count.borrow(), 2);
}
