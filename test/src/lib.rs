//! Fixture components and helpers for testing Arbor trees.
//!
//! # Example
//!
//! ```rust
//! use arbor_test::prelude::*;
//!
//! let log = HookLog::new();
//! let root = mount(Box::new(Recorder::new("root", &log)));
//! root.add_child_component(Box::new(Recorder::new("child", &log)));
//!
//! root.activate();
//! assert_eq!(
//!     log.calls("activate"),
//!     vec!["root", "child"],
//! );
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use arbor::{
    AnyComponent, Component, EventKind, NodeKey, Template, TemplateBase, UpdateCx, ValidateCx,
    reactive::{Notifier, Property},
};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports in tests.
pub mod prelude {
    pub use super::{
        EventTracker, HookLog, Label, LabelTemplate, Recorder, RecorderTemplate, Stat, StatTemplate,
        init_logging,
    };
    pub use arbor::prelude::*;
    pub use arbor::reactive::Runtime;
    pub use arbor::{
        BindingError, Converter, Factory, LifecycleEvent, Liveness, RegistryConfig,
        ValidationState,
    };
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`; defaults to `arbor=debug`. Safe to call from every test.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("arbor=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Hook log
// ============================================================================

/// Records which lifecycle hooks ran, on which recorder, in order.
#[derive(Clone, Default)]
pub struct HookLog {
    calls: Arc<Mutex<Vec<(String, &'static str)>>>,
}

impl HookLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, name: &str, hook: &'static str) {
        self.calls.lock().push((name.to_string(), hook));
    }

    /// Every recorded call as `"name.hook"`.
    pub fn all(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|(name, hook)| format!("{name}.{hook}"))
            .collect()
    }

    /// Names of the recorders that ran `hook`, in order.
    pub fn calls(&self, hook: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(_, h)| *h == hook)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn count(&self, hook: &str) -> usize {
        self.calls.lock().iter().filter(|(_, h)| *h == hook).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

// ============================================================================
// Recorder
// ============================================================================

/// A component that logs every hook it runs and can be told to fail validation.
pub struct Recorder {
    key: NodeKey,
    name: String,
    log: HookLog,
    valid: Arc<AtomicBool>,
}

impl Recorder {
    pub fn new(name: &str, log: &HookLog) -> Self {
        Recorder {
            key: NodeKey::new(),
            name: name.to_string(),
            log: log.clone(),
            valid: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn invalid(name: &str, log: &HookLog) -> Self {
        let recorder = Self::new(name, log);
        recorder.valid.store(false, Ordering::Relaxed);
        recorder
    }

    /// Change the validation outcome. Invalidates the cached verdict.
    pub fn set_valid(&mut self, valid: bool) {
        self.valid.store(valid, Ordering::Relaxed);
        self.key.invalidate_validation();
    }
}

impl Component for Recorder {
    fn key(&self) -> NodeKey {
        self.key
    }

    fn configure(&mut self, template: &dyn Template) {
        if let Some(template) = template.downcast_ref::<RecorderTemplate>() {
            self.name = template.base.name.clone();
            self.valid.store(template.valid, Ordering::Relaxed);
        }
        self.log.push(&self.name, "configure");
    }

    fn validate(&self, cx: &mut ValidateCx) {
        self.log.push(&self.name, "validate");
        if !self.valid.load(Ordering::Relaxed) {
            cx.error(format!("{} is not valid", self.name));
        }
    }

    fn activate(&mut self) {
        self.log.push(&self.name, "activate");
    }

    fn update(&mut self, _cx: &mut UpdateCx) {
        assert!(self.key.is_updating());
        self.log.push(&self.name, "update");
    }

    fn deactivate(&mut self) {
        assert!(!self.key.is_active());
        self.log.push(&self.name, "deactivate");
    }

    fn dispose(&mut self) {
        self.log.push(&self.name, "dispose");
    }

    fn reset(&mut self) {
        self.log.push(&self.name, "reset");
    }
}

/// Template for a [`Recorder`] and its declared children.
#[derive(Clone)]
pub struct RecorderTemplate {
    pub base: TemplateBase,
    pub valid: bool,
    pub log: HookLog,
    pub children: Vec<Arc<dyn Template>>,
}

impl RecorderTemplate {
    pub fn new(name: &str, log: &HookLog) -> Self {
        RecorderTemplate {
            base: TemplateBase::new(name),
            valid: true,
            log: log.clone(),
            children: Vec::new(),
        }
    }

    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn child(mut self, child: impl Template) -> Self {
        self.children.push(Arc::new(child));
        self
    }
}

impl Template for RecorderTemplate {
    fn base(&self) -> &TemplateBase {
        &self.base
    }

    fn subcomponents(&self) -> Option<&[Arc<dyn Template>]> {
        Some(&self.children)
    }

    fn instantiate(&self) -> AnyComponent {
        Box::new(Recorder::new(&self.base.name, &self.log))
    }
}

// ============================================================================
// Stat and Label
// ============================================================================

/// A bindable source: health and level properties plus a `leveled` notifier.
pub struct Stat {
    key: NodeKey,
    pub health: Property<f64>,
    pub level: Property<i64>,
    pub leveled: Notifier,
}

impl Stat {
    pub fn new(health: f64) -> Self {
        let key = NodeKey::new();
        Stat {
            key,
            health: key.property(health),
            level: key.property(1),
            leveled: key.scope().create_notifier(),
        }
    }

    pub fn set_health(&self, health: f64) {
        self.health.set(health);
        self.key.invalidate_validation();
    }

    pub fn level_up(&self) {
        self.level.update(|level| *level += 1);
        self.leveled.notify();
    }
}

impl Default for Stat {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl Component for Stat {
    fn key(&self) -> NodeKey {
        self.key
    }

    fn configure(&mut self, template: &dyn Template) {
        if let Some(template) = template.downcast_ref::<StatTemplate>() {
            self.health.set_untracked(template.health);
        }
    }

    fn validate(&self, cx: &mut ValidateCx) {
        if self.health.try_get().is_some_and(|h| h < 0.0) {
            cx.error("health must not be negative");
        }
    }

    fn notifier(&self, name: &str) -> Option<Notifier> {
        match name {
            "leveled" => Some(self.leveled),
            "health" => Some(self.health.notifier()),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct StatTemplate {
    pub base: TemplateBase,
    pub health: f64,
    pub children: Vec<Arc<dyn Template>>,
}

impl StatTemplate {
    pub fn new(name: &str, health: f64) -> Self {
        StatTemplate {
            base: TemplateBase::new(name),
            health,
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Template) -> Self {
        self.children.push(Arc::new(child));
        self
    }
}

impl Template for StatTemplate {
    fn base(&self) -> &TemplateBase {
        &self.base
    }

    fn subcomponents(&self) -> Option<&[Arc<dyn Template>]> {
        Some(&self.children)
    }

    fn instantiate(&self) -> AnyComponent {
        Box::new(Stat::new(self.health))
    }
}

/// A bindable target holding a line of text.
pub struct Label {
    key: NodeKey,
    pub text: String,
    /// Number of times `text` was written.
    pub writes: usize,
}

impl Label {
    pub fn new() -> Self {
        Label {
            key: NodeKey::new(),
            text: String::new(),
            writes: 0,
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.writes += 1;
        self.key.invalidate_validation();
    }

    /// Read the text of the label mounted at `key`.
    pub fn text_of(key: NodeKey) -> String {
        key.with_component(|label: &Label| label.text.clone())
            .unwrap_or_default()
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Label {
    fn key(&self) -> NodeKey {
        self.key
    }
}

#[derive(Clone)]
pub struct LabelTemplate {
    pub base: TemplateBase,
}

impl LabelTemplate {
    pub fn new(name: &str) -> Self {
        LabelTemplate {
            base: TemplateBase::new(name),
        }
    }

    pub fn binding(mut self, binding: arbor::PropertyBindingDefinition) -> Self {
        self.base.bindings.push(binding);
        self
    }
}

impl Template for LabelTemplate {
    fn base(&self) -> &TemplateBase {
        &self.base
    }

    fn instantiate(&self) -> AnyComponent {
        Box::new(Label::new())
    }
}

// ============================================================================
// Event tracking
// ============================================================================

/// Records lifecycle events emitted by tracked nodes.
#[derive(Clone, Default)]
pub struct EventTracker {
    events: Arc<Mutex<Vec<(String, EventKind)>>>,
}

impl EventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every event `kinds` emitted by `key`, tagged with `name`.
    pub fn track(&self, name: &str, key: NodeKey, kinds: &[EventKind]) {
        for kind in kinds {
            let events = self.events.clone();
            let name = name.to_string();
            key.on_event(*kind, move |_, event| {
                events.lock().push((name.clone(), event.kind()));
            });
        }
    }

    pub fn events(&self) -> Vec<(String, EventKind)> {
        self.events.lock().clone()
    }

    /// Names of the nodes that emitted `kind`, in order.
    pub fn emitted(&self, kind: EventKind) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(_, k)| *k == kind)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn reset(&self) {
        self.events.lock().clear();
    }
}
