//! Tests for lifecycle ordering across a tree.
//!
//! These tests verify that:
//! - Configure, activate and update run parent before child
//! - Deactivate clears the active flag before recursing and runs the parent hook last
//! - Dispose runs leaf to root and frees the arena
//! - Validation is cached, replaced on each pass, and gates only the failing subtree

use std::time::Duration;

use arbor_test::prelude::*;

/// root
/// ├── a
/// │   └── a1
/// └── b
fn recorder_tree(log: &HookLog) -> NodeKey {
    let a = RecorderTemplate::new("a", log)
        .child(RecorderTemplate::new("a1", log));
    let template = RecorderTemplate::new("root", log)
        .child(a)
        .child(RecorderTemplate::new("b", log));
    arbor::instantiate(&template)
}

// ============================================================================
// Ordering
// ============================================================================

/// Test that configure builds the tree from the template, root to leaf.
#[test]
fn test_configure_order() {
    init_logging();
    let log = HookLog::new();
    let root = recorder_tree(&log);

    assert_eq!(log.calls("configure"), ["root", "a", "a1", "b"]);
    let names: Vec<String> = root.descendants().iter().map(|k| k.name()).collect();
    assert_eq!(names, ["root", "a", "a1", "b"]);
    assert!(root.descendants().iter().all(|k| k.is_configured()));
}

/// Test that activate and update run parent before child.
#[test]
fn test_activate_and_update_order() {
    let log = HookLog::new();
    let root = recorder_tree(&log);

    root.activate();
    assert_eq!(log.calls("activate"), ["root", "a", "a1", "b"]);
    assert!(root.descendants().iter().all(|k| k.is_active()));

    step_frame(root, Duration::from_millis(16));
    assert_eq!(log.calls("update"), ["root", "a", "a1", "b"]);
    assert!(root.descendants().iter().all(|k| !k.is_updating()));
}

/// Test that `activated` fires only after the whole subtree is active.
#[test]
fn test_activated_fires_after_children() {
    let log = HookLog::new();
    let root = recorder_tree(&log);
    let tracker = EventTracker::new();
    for key in root.descendants() {
        tracker.track(
            &key.name(),
            key,
            &[EventKind::Activating, EventKind::Activated],
        );
    }

    root.activate();
    assert_eq!(
        tracker.emitted(EventKind::Activating),
        ["root", "a", "a1", "b"]
    );
    assert_eq!(
        tracker.emitted(EventKind::Activated),
        ["a1", "a", "b", "root"]
    );
}

/// Test that deactivate clears the flag before recursing and runs the parent hook last.
#[test]
fn test_deactivate_order() {
    let log = HookLog::new();
    let root = recorder_tree(&log);
    root.activate();

    let a = root.find_named("a").unwrap();
    a.on_event(EventKind::Deactivating, |key, _| {
        assert!(!key.parent().unwrap().is_active());
    });

    root.deactivate();
    assert_eq!(log.calls("deactivate"), ["a1", "a", "b", "root"]);
    assert!(root.descendants().iter().all(|k| !k.is_active() && k.is_unloaded()));

    // unloaded guards a second pass
    root.deactivate();
    assert_eq!(log.count("deactivate"), 4);
}

/// Test that dispose tears down leaves first and frees every slot.
#[test]
fn test_dispose_order() {
    let log = HookLog::new();
    let root = recorder_tree(&log);
    let nodes = root.descendants();
    let live = NodeKey::live_count();

    root.dispose();
    assert_eq!(log.calls("dispose"), ["a1", "a", "b", "root"]);
    assert!(nodes.iter().all(|k| !k.is_valid()));
    assert_eq!(NodeKey::live_count(), live - 4);
}

/// Test that a deactivated node can be activated again.
#[test]
fn test_reactivation() {
    let log = HookLog::new();
    let root = recorder_tree(&log);

    root.activate();
    root.deactivate();
    root.activate();
    assert!(root.is_active());
    assert!(!root.is_unloaded());
    assert_eq!(log.count("activate"), 8);
}

/// Test that updates skip inactive nodes.
#[test]
fn test_update_skips_inactive() {
    let log = HookLog::new();
    let root = recorder_tree(&log);

    root.update(Duration::from_millis(16));
    assert_eq!(log.count("update"), 0);

    root.activate();
    root.find_named("a").unwrap().set_enabled(false);
    root.update(Duration::from_millis(16));
    assert_eq!(log.calls("update"), ["root", "b"]);
}

/// Test that enabling and disabling emits `EnabledChanged` once per change,
/// whether through the setter or through a re-configure.
#[test]
fn test_enabled_changed_events() {
    use std::{cell::RefCell, rc::Rc};

    let key = mount(Box::new(Group::new()));
    let seen = Rc::new(RefCell::new(Vec::new()));
    key.on_event(EventKind::EnabledChanged, {
        let seen = seen.clone();
        move |_, event| {
            if let LifecycleEvent::EnabledChanged(enabled) = event {
                seen.borrow_mut().push(*enabled);
            }
        }
    });

    key.set_enabled(false);
    key.set_enabled(false);
    key.set_enabled(true);
    assert_eq!(*seen.borrow(), [false, true]);

    key.configure(&GroupTemplate::from_base(
        TemplateBase::new("off").enabled(false),
    ));
    assert!(!key.is_enabled());
    key.configure(&GroupTemplate::new("on"));
    key.configure(&GroupTemplate::new("on again"));
    assert!(key.is_enabled());
    assert_eq!(*seen.borrow(), [false, true, false, true]);
}

// ============================================================================
// Validation
// ============================================================================

/// Test that validating twice runs the hook once and returns the same verdict.
#[test]
fn test_validate_idempotence() {
    let log = HookLog::new();
    let key = mount(Box::new(Recorder::new("p", &log)));

    let first = key.validate(false);
    let second = key.validate(false);
    assert_eq!(first, second);
    assert_eq!(log.count("validate"), 1);

    let invalid = mount(Box::new(Recorder::invalid("q", &log)));
    assert!(!invalid.validate(false));
    assert!(!invalid.validate(false));
    assert_eq!(log.calls("validate"), ["p", "q"]);
}

/// Test that an invalid node keeps only its own subtree inactive.
#[test]
fn test_invalid_subtree_is_skipped() {
    let log = HookLog::new();
    let bad = RecorderTemplate::new("bad", &log)
        .invalid()
        .child(RecorderTemplate::new("below", &log));
    let template = RecorderTemplate::new("root", &log)
        .child(bad)
        .child(RecorderTemplate::new("good", &log));
    let root = arbor::instantiate(&template);

    root.activate();
    assert_eq!(log.calls("activate"), ["root", "good"]);
    let bad = root.find_named("bad").unwrap();
    assert_eq!(bad.validation_state(), ValidationState::Invalid);
    assert_eq!(bad.validation_errors()[0].message, "bad is not valid");
    assert!(!root.find_named("below").unwrap().is_active());
    assert!(root.is_active());
}

/// Test that fixing a node and invalidating the cache lets it activate.
#[test]
fn test_setter_invalidates_cache() {
    let log = HookLog::new();
    let key = mount(Box::new(Recorder::invalid("p", &log)));
    key.activate();
    assert!(!key.is_active());

    key.with_component_mut(|p: &mut Recorder| p.set_valid(true));
    assert_eq!(key.validation_state(), ValidationState::Unknown);
    key.activate();
    assert!(key.is_active());
}

/// Test that each validation pass replaces the previous error list.
#[test]
fn test_errors_are_replaced() {
    let log = HookLog::new();
    let key = mount(Box::new(Recorder::invalid("p", &log)));
    key.validate(true);
    key.validate(true);
    assert_eq!(key.validation_errors().len(), 1);

    key.with_component_mut(|p: &mut Recorder| p.set_valid(true));
    assert!(key.validate(false));
    assert!(key.validation_errors().is_empty());
}

/// Test that a failed validation deactivates an active node.
#[test]
fn test_failed_validation_deactivates() {
    let log = HookLog::new();
    let key = mount(Box::new(Recorder::new("p", &log)));
    key.activate();

    key.with_component_mut(|p: &mut Recorder| p.set_valid(false));
    let tracker = EventTracker::new();
    tracker.track(
        "p",
        key,
        &[EventKind::ValidationFailed, EventKind::Deactivated],
    );
    assert!(!key.validate(false));
    assert!(!key.is_active());
    assert_eq!(
        tracker.events(),
        [
            ("p".to_string(), EventKind::ValidationFailed),
            ("p".to_string(), EventKind::Deactivated)
        ]
    );
}

// ============================================================================
// Deferred updates and re-entrancy
// ============================================================================

/// Test that deferred updates land before the update phase and trigger revalidation.
#[test]
fn test_deferred_updates_land_before_update() {
    let log = HookLog::new();
    let root = recorder_tree(&log);
    root.activate();

    let b = root.find_named("b").unwrap();
    b.defer_with::<Recorder>(|p| {
        p.set_valid(false);
        Ok(())
    });
    let a1 = root.find_named("a1").unwrap();
    a1.defer(|| Err(UpdateError::failed("broken")));

    step_frame(root, Duration::from_millis(16));
    assert_eq!(log.calls("update"), ["root", "a", "a1"]);
    assert!(!b.is_active());
    assert_eq!(b.pending_update_count(), 0);
    assert!(a1.is_active());
}

/// Test that a deferred update for the wrong component type is reported, not applied.
#[test]
fn test_deferred_update_type_mismatch() {
    let key = mount(Box::new(Group::new()));
    key.defer_with::<Recorder>(|_| panic!("must not run"));
    assert_eq!(key.apply_updates(), 1);
}

struct SelfValidating {
    key: NodeKey,
    nested: Option<bool>,
}

impl Component for SelfValidating {
    fn key(&self) -> NodeKey {
        self.key
    }

    fn update(&mut self, _cx: &mut UpdateCx) {
        self.nested = Some(self.key.validate(true));
    }
}

/// Test that a hook calling back into its own node's lifecycle is refused, not a panic.
#[test]
fn test_reentrant_lifecycle_call_is_refused() {
    init_logging();
    let key = mount(Box::new(SelfValidating {
        key: NodeKey::new(),
        nested: None,
    }));
    key.activate();
    key.update(Duration::from_millis(16));

    let nested = key.with_component(|c: &SelfValidating| c.nested).unwrap();
    assert_eq!(nested, Some(true));
    assert!(key.is_active());
}
