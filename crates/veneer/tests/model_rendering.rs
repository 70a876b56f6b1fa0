//! Integration tests for model rendering through namespaces.

use std::rc::Rc;

use serde_json::json;
use veneer::{Argument, ArgumentMap, DefaultProvider, Model, Pipeline};

struct TodoItem {
    label: String,
    priority: Option<String>,
}

impl Model for TodoItem {
    fn model_name(&self) -> &str {
        "TodoItem"
    }

    fn arguments(&self) -> ArgumentMap {
        let mut args = ArgumentMap::new();
        args.insert("label".into(), json!(self.label).into());
        args.insert(
            "priority".into(),
            json!(self.priority.as_deref().unwrap_or("none")).into(),
        );
        args
    }

    fn apply_defaults(&mut self, provider: &DefaultProvider) {
        provider.fill(&mut self.priority, "Priority");
    }
}

struct TodoList {
    heading: String,
    first: Rc<TodoItem>,
}

impl Model for TodoList {
    fn model_name(&self) -> &str {
        "TodoList"
    }

    fn arguments(&self) -> ArgumentMap {
        let mut args = ArgumentMap::new();
        args.insert("heading".into(), json!(self.heading).into());
        args.insert("first".into(), Argument::Model(self.first.clone()));
        args
    }
}

fn write_template(dir: &std::path::Path, name: &str, body: &str) {
    std::fs::write(dir.join(format!("{}.html", name)), body).unwrap();
}

#[test]
fn test_model_renders_dash_cased_template() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "todo-item", "<li>{{ $label }} ({{ $priority }})</li>");

    let pipeline = Pipeline::builder()
        .namespace("todos", dir.path(), "html")
        .unwrap()
        .build();

    let item = TodoItem {
        label: "buy milk".into(),
        priority: Some("high".into()),
    };
    let out = pipeline.render_model("todos", &item).unwrap();
    assert_eq!(out, "<li>buy milk (high)</li>");
}

#[test]
fn test_nested_model_expands_before_parent() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "todo-item", "<li>{{ $label }} ({{ $priority }})</li>");
    write_template(dir.path(), "todo-list", "<h2>{{ $heading }}</h2>{!! $first !!}");

    let pipeline = Pipeline::builder()
        .namespace("todos", dir.path(), "html")
        .unwrap()
        .build();

    let list = TodoList {
        heading: "Today".into(),
        first: Rc::new(TodoItem {
            label: "water plants".into(),
            priority: Some("low".into()),
        }),
    };
    let out = pipeline.render_model("todos", &list).unwrap();
    assert_eq!(out, "<h2>Today</h2><li>water plants (low)</li>");
}

#[test]
fn test_factory_fills_unset_fields_once() {
    let mut defaults = DefaultProvider::new();
    defaults.set("Priority", json!("normal"));

    let pipeline = Pipeline::builder().defaults(defaults).build();
    let factory = pipeline.model_factory();

    let filled = factory.build(TodoItem {
        label: "x".into(),
        priority: None,
    });
    assert_eq!(filled.priority.as_deref(), Some("normal"));

    let kept = factory.build(TodoItem {
        label: "y".into(),
        priority: Some("urgent".into()),
    });
    assert_eq!(kept.priority.as_deref(), Some("urgent"));
}

#[test]
fn test_model_class_detail_attached_on_failure() {
    struct Broken;
    impl Model for Broken {
        fn model_name(&self) -> &str {
            "Broken"
        }
        fn arguments(&self) -> ArgumentMap {
            ArgumentMap::new()
        }
    }

    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "broken", "@while(true)no exit");

    let events = Rc::new(std::cell::RefCell::new(Vec::new()));
    let events_clone = events.clone();
    let pipeline = Pipeline::builder()
        .namespace("views", dir.path(), "html")
        .unwrap()
        .on_error(Rc::new(move |d: &veneer_dispatch::Details| {
            events_clone.borrow_mut().push(d.clone())
        }))
        .build();

    let out = pipeline.render_model("views", &Broken).unwrap();
    assert_eq!(out, "");

    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["modelClass"], json!("Broken"));
    // Detached once the render returns.
    assert!(pipeline
        .dispatcher()
        .ambient_details("template_error")
        .is_empty());
}
