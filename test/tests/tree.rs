//! Tests for tree structure, navigation and tree-changed notifications.

use std::{cell::RefCell, rc::Rc};

use arbor_test::prelude::*;

fn group(name: &str) -> NodeKey {
    let key = mount(Box::new(Group::new()));
    key.set_name(name);
    key
}

/// Test the A→B→C→D chain where only A and D are stats.
#[test]
fn test_find_parent_skips_other_kinds() {
    let a = mount(Box::new(Stat::new(1.0)));
    let b = group("b");
    let c = group("c");
    let d = mount(Box::new(Stat::new(2.0)));
    a.add_child(b);
    b.add_child(c);
    c.add_child(d);

    assert_eq!(d.find_parent::<Stat>(), Some(a));
    assert_eq!(d.find_parent::<Group>(), Some(c));
    assert_eq!(d.find_parent_where::<Stat>(|s| s.health.get() > 5.0), None);
    assert_eq!(LookupStrategy::parent::<Stat>().resolve(d), Some(a));
    assert_eq!(d.ancestors(), [c, b, a]);
}

/// Test typed child and sibling queries.
#[test]
fn test_typed_queries() {
    let root = group("root");
    let s1 = root.add_child_component(Box::new(Stat::new(10.0)));
    let g = root.add_child_component(Box::new(Group::new()));
    let s2 = root.add_child_component(Box::new(Stat::new(20.0)));

    assert_eq!(root.children_of::<Stat>(), [s1, s2]);
    assert_eq!(root.children_where::<Stat>(|s| s.health.get() > 15.0), [s2]);
    assert_eq!(s1.siblings(), [g, s2]);
    assert_eq!(s1.siblings_of::<Stat>(), [s2]);
    assert!(!s1.siblings_of::<Stat>().contains(&s1));
    assert_eq!(g.siblings_where::<Stat>(|s| s.health.get() < 15.0), [s1]);
}

/// Test that named lookup searches every branch from the root.
#[test]
fn test_find_named_anywhere() {
    let root = group("root");
    let left = group("left");
    let right = group("right");
    let deep = group("X");
    root.add_child(left);
    root.add_child(right);
    right.add_child(group("r1"));
    right.children()[0].add_child(deep);

    assert_eq!(left.find_named("X"), Some(deep));
    assert_eq!(deep.find_named("left"), Some(left));
    assert_eq!(left.find_named("nope"), None);
}

/// Test that unnamed children are named after their kind.
#[test]
fn test_default_child_names() {
    let root = group("root");
    let stat = root.add_child_component(Box::new(Stat::default()));
    let named = mount(Box::new(Label::new()));
    named.set_name("title");
    root.add_child(named);

    assert_eq!(stat.name(), "Stat");
    assert_eq!(named.name(), "title");
}

/// Test that structural changes are announced with the added and removed sets.
#[test]
fn test_tree_changed_events() {
    let root = group("root");
    let changes: Rc<RefCell<Vec<(usize, usize)>>> = Default::default();
    let seen = changes.clone();
    let listener = root.on_event(EventKind::TreeChanged, move |_, event| {
        if let LifecycleEvent::TreeChanged { added, removed } = event {
            seen.borrow_mut().push((added.len(), removed.len()));
        }
    });

    let child = group("child");
    root.add_child(child);
    root.add_child(child);
    root.remove_child(child);
    root.remove_child(child);
    assert_eq!(*changes.borrow(), [(1, 0), (0, 1)]);

    assert!(root.remove_listener(listener));
    assert!(!root.remove_listener(listener));
    root.add_child(child);
    assert_eq!(changes.borrow().len(), 2);
}

/// Test that removing a child neither deactivates nor disposes it.
#[test]
fn test_remove_child_keeps_state() {
    let root = group("root");
    let child = group("child");
    root.add_child(child);
    root.activate();

    root.remove_child(child);
    assert!(child.is_active());
    assert!(child.is_valid());
    assert_eq!(child.parent(), None);
    assert_eq!(child.root(), child);
}

/// Test that a disposed node's key goes stale instead of aliasing a new node.
#[test]
fn test_stale_keys() {
    let first = group("first");
    first.dispose();
    let second = group("second");

    assert_ne!(first, second);
    assert!(!first.is_valid());
    assert_eq!(first.name(), "");
    assert!(first.children().is_empty());
    assert!(!first.add_child(second));
    assert!(!second.add_child(first));
    first.activate();
    assert!(!first.is_active());
}

/// Test typed component access.
#[test]
fn test_component_access() {
    let key = mount(Box::new(Label::new()));
    assert!(key.is::<Label>());
    assert!(!key.is::<Stat>());
    assert_eq!(key.kind_name(), std::any::type_name::<Label>());
    assert_eq!(key.with_component(|s: &Stat| s.health.get()), None);

    key.with_component_mut(|l: &mut Label| l.set_text("hello"));
    assert_eq!(Label::text_of(key), "hello");

    // the component is in use: nested access is refused
    let nested = key.with_component_mut(|_: &mut Label| key.with_component(|l: &Label| l.writes));
    assert_eq!(nested, Some(None));
}
