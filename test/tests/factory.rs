//! Tests for building trees from JSON template documents.

use std::{sync::Arc, time::Duration};

use arbor::FactoryError;
use arbor_test::prelude::*;

fn factory() -> Factory {
    let mut factory = Factory::new();
    factory
        .register("Stat", |parts| {
            let health = parts.property::<f64>("health")?.unwrap_or(100.0);
            Ok(Arc::new(StatTemplate {
                base: parts.base,
                health,
                children: parts.children,
            }))
        })
        .register("Label", |parts| {
            parts.no_children()?;
            let health_format = parts.property::<String>("health_format")?;
            let mut template = LabelTemplate { base: parts.base };
            if let Some(pattern) = health_format {
                template.base.bindings.push(
                    PropertyBindingDefinition::builder::<Label>()
                        .source(|stat: &Stat| stat.health)
                        .format(&pattern)
                        .to(|label: &mut Label, text: String| label.set_text(text))
                        .build(),
                );
            }
            Ok(Arc::new(template))
        });
    factory
}

const HUD: &str = r#"{
    "kind": "Group",
    "name": "hud",
    "children": [
        { "kind": "Stat", "name": "player", "properties": { "health": 80 }, "children": [
            { "kind": "Label", "name": "hp", "properties": { "health_format": "HP {0:F1}" } }
        ] },
        { "kind": "Label", "name": "title", "enabled": false }
    ]
}"#;

/// Test that a document builds, configures and binds a whole tree.
#[test]
fn test_document_builds_a_bound_tree() {
    init_logging();
    let hud = factory().instantiate_json(HUD).unwrap();
    hud.activate();

    let hp = hud.find_named("hp").unwrap();
    assert_eq!(Label::text_of(hp), "HP 80.0");
    assert_eq!(hp.parent(), hud.find_named("player"));
    assert!(!hud.find_named("title").unwrap().is_active());

    let player = hud.find_named("player").unwrap();
    player.with_component(|s: &Stat| s.set_health(12.25));
    assert_eq!(Label::text_of(hp), "HP 12.2");
}

/// Test that documents are rejected with a typed error.
#[test]
fn test_bad_documents() {
    let factory = factory();
    assert!(matches!(
        factory.instantiate_json(r#"{ "kind": "Sprite" }"#),
        Err(FactoryError::UnknownKind(_))
    ));
    assert!(matches!(
        factory.instantiate_json(r#"{ "kind": "Label", "children": [{ "kind": "Group" }] }"#),
        Err(FactoryError::ChildrenNotSupported { .. })
    ));
    assert!(matches!(
        factory.instantiate_json(r#"{ "kind": "Stat", "properties": { "health": "lots" } }"#),
        Err(FactoryError::InvalidProperty { .. })
    ));
    assert!(matches!(
        factory.instantiate_json("[]"),
        Err(FactoryError::Json(_))
    ));
}

/// Test the factory entry points that take a concrete component type.
#[test]
fn test_typed_creation() {
    let factory = factory();
    let bare = factory.create::<Stat>();
    assert!(bare.is::<Stat>());
    assert!(!bare.is_configured());

    let configured = factory.create_and_configure::<Stat>(&StatTemplate::new("s", 3.0));
    assert_eq!(configured.name(), "s");
    assert_eq!(configured.with_component(|s: &Stat| s.health.get()), Some(3.0));
}

/// Test a few frames of a built tree with deferred edits in between.
#[test]
fn test_frames_apply_deferred_edits() {
    let hud = factory().instantiate_json(HUD).unwrap();
    hud.activate();
    let player = hud.find_named("player").unwrap();
    let hp = hud.find_named("hp").unwrap();

    player.defer_with::<Stat>(|s| {
        s.set_health(-1.0);
        Ok(())
    });
    // the edit waits for the frame boundary
    assert_eq!(Label::text_of(hp), "HP 80.0");

    step_frame(hud, Duration::from_millis(16));
    assert_eq!(Label::text_of(hp), "HP -1.0");
    // negative health fails validation once the edit lands
    assert!(!player.is_active());
    assert!(!hp.is_active());
    assert!(hud.is_active());
}
