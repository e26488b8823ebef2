use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::json;

use crate::dom::{Document, NodeId};
use crate::error::{ShellError, ShellResult};
use crate::logging::{LogLevel, Logger, event_with_fields, json_str};
use crate::metrics::ShellMetrics;

/// Deactivation hook stored for the active view; runs against the document
/// when the view is torn down.
pub type Cleanup = Box<dyn FnMut(&mut Document) -> ShellResult<()> + Send>;
pub type RenderFn = Box<dyn FnMut(&mut SlotContext<'_>) -> ShellResult<RenderResult> + Send>;
pub type ActivateFn = Box<dyn FnMut(&mut SlotContext<'_>) -> ShellResult<Option<Cleanup>> + Send>;
pub type DeactivateFn = Box<dyn FnMut(&mut SlotContext<'_>) -> ShellResult<()> + Send>;

/// What a view's `render` hands back for mounting.
pub enum RenderResult {
    Node(NodeId),
    Nodes(Vec<NodeId>),
    NodesWithCleanup { nodes: Vec<NodeId>, cleanup: Cleanup },
}

impl RenderResult {
    fn into_parts(self) -> (Vec<NodeId>, Option<Cleanup>) {
        match self {
            RenderResult::Node(node) => (vec![node], None),
            RenderResult::Nodes(nodes) => (nodes, None),
            RenderResult::NodesWithCleanup { nodes, cleanup } => (nodes, Some(cleanup)),
        }
    }
}

/// Context passed to view callbacks. Carries no I/O capability beyond the
/// document itself.
pub struct SlotContext<'a> {
    pub document: &'a mut Document,
    pub host: NodeId,
    pub active_id: &'a str,
    /// Set during deactivation when another view is about to take over, so
    /// transition-aware consumers can branch on the successor.
    pub next_id: Option<&'a str>,
    pub is_mobile: bool,
}

/// Declarative registration for one view of a slot.
pub struct ViewSpec {
    id: String,
    render: RenderFn,
    on_activate: Option<ActivateFn>,
    on_deactivate: Option<DeactivateFn>,
    auto_activate: bool,
}

impl ViewSpec {
    pub fn new(
        id: impl Into<String>,
        render: impl FnMut(&mut SlotContext<'_>) -> ShellResult<RenderResult> + Send + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            render: Box::new(render),
            on_activate: None,
            on_deactivate: None,
            auto_activate: false,
        }
    }

    pub fn on_activate(
        mut self,
        hook: impl FnMut(&mut SlotContext<'_>) -> ShellResult<Option<Cleanup>> + Send + 'static,
    ) -> Self {
        self.on_activate = Some(Box::new(hook));
        self
    }

    pub fn on_deactivate(
        mut self,
        hook: impl FnMut(&mut SlotContext<'_>) -> ShellResult<()> + Send + 'static,
    ) -> Self {
        self.on_deactivate = Some(Box::new(hook));
        self
    }

    pub fn auto_activate(mut self, auto_activate: bool) -> Self {
        self.auto_activate = auto_activate;
        self
    }
}

struct Registration {
    generation: u64,
    render: RenderFn,
    on_activate: Option<ActivateFn>,
    on_deactivate: Option<DeactivateFn>,
}

struct ActiveView {
    id: String,
    cleanups: Vec<Cleanup>,
}

struct RegistryInner {
    slot: String,
    host: NodeId,
    is_mobile: bool,
    registrations: HashMap<String, Registration>,
    active: Option<ActiveView>,
    next_generation: u64,
    logger: Option<Logger>,
    metrics: Option<Arc<Mutex<ShellMetrics>>>,
}

/// One instance per UI slot. Cheap to clone; clones share the slot state.
#[derive(Clone)]
pub struct SlotRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SlotRegistry {
    pub fn new(slot: impl Into<String>, host: NodeId) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                slot: slot.into(),
                host,
                is_mobile: false,
                registrations: HashMap::new(),
                active: None,
                next_generation: 1,
                logger: None,
                metrics: None,
            })),
        }
    }

    pub fn with_logger(self, logger: Logger) -> Self {
        self.lock().logger = Some(logger);
        self
    }

    pub fn with_metrics(self, metrics: Arc<Mutex<ShellMetrics>>) -> Self {
        self.lock().metrics = Some(metrics);
        self
    }

    /// Registers a view for this slot. An empty id fails soft: a warning is
    /// logged and an inert handle returned. Re-registering an existing id
    /// first unregisters the old one, deactivating it if active; the last
    /// registration for an id always wins.
    pub fn register_view(&self, doc: &mut Document, spec: ViewSpec) -> ViewHandle {
        if spec.id.is_empty() {
            self.lock().warn("rejected registration with empty view id");
            return ViewHandle::inert();
        }
        let mut inner = self.lock();
        if inner.registrations.contains_key(&spec.id) {
            inner.unregister(doc, &spec.id);
        }
        let generation = inner.next_generation;
        inner.next_generation += 1;
        let id = spec.id.clone();
        inner.registrations.insert(
            id.clone(),
            Registration {
                generation,
                render: spec.render,
                on_activate: spec.on_activate,
                on_deactivate: spec.on_deactivate,
            },
        );
        inner.log(
            LogLevel::Debug,
            "view_registered",
            [json_str("view", id.clone())],
        );
        if spec.auto_activate {
            inner.activate(doc, &id);
        }
        ViewHandle {
            id,
            generation,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Activates `id`, deactivating whatever was previously active. Returns
    /// `false` when the id is unknown; callers may treat that as ignorable.
    /// Activating the already-active id is a refresh, never a no-op.
    pub fn activate_view(&self, doc: &mut Document, id: &str) -> bool {
        self.lock().activate(doc, id)
    }

    /// Removes a registration; if it was active, deactivates it first and
    /// clears the host's children.
    pub fn unregister_view(&self, doc: &mut Document, id: &str) {
        self.lock().unregister(doc, id);
    }

    /// No-op when unchanged; otherwise re-mounts the active view so it can
    /// branch its rendering on the new mode.
    pub fn set_mobile_state(&self, doc: &mut Document, is_mobile: bool) {
        let mut inner = self.lock();
        if inner.is_mobile == is_mobile {
            return;
        }
        inner.is_mobile = is_mobile;
        if let Some(id) = inner.active.as_ref().map(|a| a.id.clone()) {
            inner.run_cleanups(doc);
            inner.mount(doc, &id);
        }
    }

    pub fn active_view_id(&self) -> Option<String> {
        self.lock().active.as_ref().map(|a| a.id.clone())
    }

    pub fn is_mobile(&self) -> bool {
        self.lock().is_mobile
    }

    pub fn slot(&self) -> String {
        self.lock().slot.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RegistryInner {
    fn activate(&mut self, doc: &mut Document, id: &str) -> bool {
        if !self.registrations.contains_key(id) {
            self.log(
                LogLevel::Warn,
                "activation_ignored_unknown_view",
                [json_str("view", id)],
            );
            return false;
        }
        let refresh = self.active.as_ref().map(|a| a.id.as_str()) == Some(id);
        if refresh {
            self.run_cleanups(doc);
        } else {
            self.deactivate(doc, Some(id));
        }
        self.mount(doc, id);
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_view_activation();
            }
        }
        self.log(
            LogLevel::Debug,
            "view_activated",
            [json_str("view", id), ("refresh".to_string(), json!(refresh))],
        );
        true
    }

    /// Mount pipeline: render, normalize, swap host children atomically,
    /// store the cleanup, then run `on_activate` composing any returned
    /// cleanup so both run on deactivation.
    fn mount(&mut self, doc: &mut Document, id: &str) {
        let slot = self.slot.clone();
        let is_mobile = self.is_mobile;
        let host = self.host;

        let rendered = {
            let Some(registration) = self.registrations.get_mut(id) else {
                return;
            };
            let mut ctx = SlotContext {
                document: doc,
                host,
                active_id: id,
                next_id: None,
                is_mobile,
            };
            (registration.render)(&mut ctx)
        };
        let (nodes, cleanup) = match rendered {
            Ok(result) => result.into_parts(),
            Err(err) => {
                self.absorb(&slot, id, "render", err);
                (Vec::new(), None)
            }
        };
        let nodes: Vec<NodeId> = nodes.into_iter().filter(|n| doc.exists(*n)).collect();

        let previous = doc.replace_children(host, nodes).unwrap_or_default();
        for node in previous {
            // A refresh may hand back nodes it mounted last time; only the
            // ones left detached by the swap are gone for good.
            if doc.exists(node) && doc.parent(node).is_none() {
                let _ = doc.destroy_subtree(node);
            }
        }

        let mut cleanups = Vec::new();
        if let Some(cleanup) = cleanup {
            cleanups.push(cleanup);
        }

        let activation = {
            let Some(registration) = self.registrations.get_mut(id) else {
                return;
            };
            registration.on_activate.as_mut().map(|hook| {
                let mut ctx = SlotContext {
                    document: doc,
                    host,
                    active_id: id,
                    next_id: None,
                    is_mobile,
                };
                hook(&mut ctx)
            })
        };
        match activation {
            Some(Ok(Some(cleanup))) => cleanups.push(cleanup),
            Some(Ok(None)) | None => {}
            Some(Err(err)) => self.absorb(&slot, id, "on_activate", err),
        }

        self.active = Some(ActiveView {
            id: id.to_string(),
            cleanups,
        });
    }

    /// Runs stored cleanups and `on_deactivate`, each absorbed individually
    /// so one failing hook never suppresses another, then clears the active
    /// id. Bookkeeping stays consistent regardless of callback failures.
    fn deactivate(&mut self, doc: &mut Document, next_id: Option<&str>) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        let slot = self.slot.clone();
        for cleanup in active.cleanups.iter_mut() {
            if let Err(err) = cleanup(doc) {
                self.absorb(&slot, &active.id, "cleanup", err);
            }
        }
        let is_mobile = self.is_mobile;
        let host = self.host;
        let outcome = self.registrations.get_mut(&active.id).and_then(|reg| {
            reg.on_deactivate.as_mut().map(|hook| {
                let mut ctx = SlotContext {
                    document: doc,
                    host,
                    active_id: &active.id,
                    next_id,
                    is_mobile,
                };
                hook(&mut ctx)
            })
        });
        if let Some(Err(err)) = outcome {
            self.absorb(&slot, &active.id, "on_deactivate", err);
        }
    }

    /// Cleanup-only teardown used by refresh and mobile-state re-mounts;
    /// `on_deactivate` is reserved for real handoffs.
    fn run_cleanups(&mut self, doc: &mut Document) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let slot = self.slot.clone();
        let id = active.id.clone();
        let mut cleanups = std::mem::take(&mut active.cleanups);
        for cleanup in cleanups.iter_mut() {
            if let Err(err) = cleanup(doc) {
                self.absorb(&slot, &id, "cleanup", err);
            }
        }
    }

    fn unregister(&mut self, doc: &mut Document, id: &str) {
        if self.active.as_ref().map(|a| a.id.as_str()) == Some(id) {
            self.deactivate(doc, None);
            let host = self.host;
            let previous = doc.replace_children(host, Vec::new()).unwrap_or_default();
            for node in previous {
                let _ = doc.destroy_subtree(node);
            }
        }
        if self.registrations.remove(id).is_some() {
            self.log(
                LogLevel::Debug,
                "view_unregistered",
                [json_str("view", id)],
            );
        }
    }

    fn absorb(&self, slot: &str, view: &str, hook: &str, err: ShellError) {
        self.log(
            LogLevel::Warn,
            "view_callback_failed",
            [
                json_str("slot", slot),
                json_str("view", view),
                json_str("hook", hook),
                json_str("error", err.to_string()),
            ],
        );
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, [json_str("slot", self.slot.clone())]);
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            let event = event_with_fields(level, "astra::slots", message, fields);
            let _ = logger.log_event(event);
        }
    }
}

/// Handle returned by [`SlotRegistry::register_view`]. A handle superseded
/// by a later registration for the same id, or outliving its registry, goes
/// inert: `activate` returns `false` and `is_active` returns `false`.
pub struct ViewHandle {
    id: String,
    generation: u64,
    inner: Weak<Mutex<RegistryInner>>,
}

impl ViewHandle {
    fn inert() -> Self {
        Self {
            id: String::new(),
            generation: 0,
            inner: Weak::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn activate(&self, doc: &mut Document) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let mut guard = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !self.is_current(&guard) {
            return false;
        }
        guard.activate(doc, &self.id)
    }

    pub fn is_active(&self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let guard = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.is_current(&guard) && guard.active.as_ref().map(|a| a.id.as_str()) == Some(&self.id)
    }

    pub fn unregister(&self, doc: &mut Document) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut guard = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.is_current(&guard) {
            guard.unregister(doc, &self.id);
        }
    }

    fn is_current(&self, inner: &RegistryInner) -> bool {
        self.generation != 0
            && inner
                .registrations
                .get(&self.id)
                .map(|r| r.generation == self.generation)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn slot_doc() -> (Document, NodeId) {
        let mut doc = Document::new();
        let host = doc.create_element("div");
        doc.append_child(doc.body(), host).unwrap();
        (doc, host)
    }

    fn div_view(id: &str, dom_id: &'static str) -> ViewSpec {
        ViewSpec::new(id, move |ctx| {
            let node = ctx.document.build_element("div").dom_id(dom_id).finish();
            Ok(RenderResult::Node(node))
        })
    }

    #[test]
    fn register_activate_unregister_home() {
        let (mut doc, host) = slot_doc();
        let registry = SlotRegistry::new("main", host);
        registry.register_view(&mut doc, div_view("home", "home-content"));

        assert!(registry.activate_view(&mut doc, "home"));
        let children = doc.children(host);
        assert_eq!(children.len(), 1);
        assert_eq!(doc.dom_id(children[0]), Some("home-content"));

        registry.unregister_view(&mut doc, "home");
        assert!(doc.children(host).is_empty());
        assert_eq!(registry.active_view_id(), None);
    }

    #[test]
    fn auto_activation_hands_over_with_next_id() {
        let (mut doc, host) = slot_doc();
        let registry = SlotRegistry::new("main", host);
        let deactivations = Arc::new(Mutex::new(Vec::<Option<String>>::new()));
        let seen = deactivations.clone();

        registry.register_view(
            &mut doc,
            div_view("a", "panel-a").auto_activate(true).on_deactivate(move |ctx| {
                seen.lock().unwrap().push(ctx.next_id.map(String::from));
                Ok(())
            }),
        );
        registry.register_view(&mut doc, div_view("b", "panel-b").auto_activate(true));

        assert_eq!(registry.active_view_id().as_deref(), Some("b"));
        let calls = deactivations.lock().unwrap();
        assert_eq!(*calls, vec![Some("b".to_string())]);
    }

    #[test]
    fn host_children_always_match_active_view() {
        let (mut doc, host) = slot_doc();
        let registry = SlotRegistry::new("main", host);
        registry.register_view(&mut doc, div_view("a", "panel-a"));
        registry.register_view(&mut doc, div_view("b", "panel-b"));

        for id in ["a", "b", "a", "a", "b"] {
            assert!(registry.activate_view(&mut doc, id));
            let children = doc.children(host);
            assert_eq!(children.len(), 1);
            let expected = format!("panel-{id}");
            assert_eq!(doc.dom_id(children[0]), Some(expected.as_str()));
            assert_eq!(registry.active_view_id().as_deref(), Some(id));
        }
    }

    #[test]
    fn both_cleanups_run_even_when_deactivate_fails() {
        let (mut doc, host) = slot_doc();
        let registry = SlotRegistry::new("main", host);
        let render_cleanups = Arc::new(AtomicUsize::new(0));
        let activate_cleanups = Arc::new(AtomicUsize::new(0));
        let from_render = render_cleanups.clone();
        let from_activate = activate_cleanups.clone();

        registry.register_view(
            &mut doc,
            ViewSpec::new("fragile", move |ctx| {
                let node = ctx.document.create_element("div");
                let counter = from_render.clone();
                Ok(RenderResult::NodesWithCleanup {
                    nodes: vec![node],
                    cleanup: Box::new(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                })
            })
            .on_activate(move |_| {
                let counter = from_activate.clone();
                Ok(Some(Box::new(move |_: &mut Document| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }) as Cleanup))
            })
            .on_deactivate(|_| Err(ShellError::view_callback("fragile", "deactivate exploded"))),
        );
        registry.register_view(&mut doc, div_view("other", "panel-other"));

        assert!(registry.activate_view(&mut doc, "fragile"));
        assert!(registry.activate_view(&mut doc, "other"));
        assert_eq!(render_cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(activate_cleanups.load(Ordering::SeqCst), 1);
        assert_eq!(registry.active_view_id().as_deref(), Some("other"));
    }

    #[test]
    fn reactivation_renders_again() {
        let (mut doc, host) = slot_doc();
        let registry = SlotRegistry::new("main", host);
        let renders = Arc::new(AtomicUsize::new(0));
        let counter = renders.clone();

        registry.register_view(
            &mut doc,
            ViewSpec::new("refresh", move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                let node = ctx.document.create_element("div");
                Ok(RenderResult::Node(node))
            }),
        );

        assert!(registry.activate_view(&mut doc, "refresh"));
        let first = doc.children(host);
        assert!(registry.activate_view(&mut doc, "refresh"));
        let second = doc.children(host);
        assert_eq!(renders.load(Ordering::SeqCst), 2);
        assert_ne!(first, second);
    }

    #[test]
    fn replacement_makes_previous_handle_stale() {
        let (mut doc, host) = slot_doc();
        let registry = SlotRegistry::new("main", host);
        let old = registry.register_view(&mut doc, div_view("panel", "panel-v1").auto_activate(true));
        assert!(old.is_active());

        let new = registry.register_view(&mut doc, div_view("panel", "panel-v2"));
        assert!(!old.is_active());
        assert!(!old.activate(&mut doc));
        assert_eq!(registry.active_view_id(), None);

        assert!(new.activate(&mut doc));
        let children = doc.children(host);
        assert_eq!(doc.dom_id(children[0]), Some("panel-v2"));
    }

    #[test]
    fn empty_id_yields_inert_handle() {
        let (mut doc, host) = slot_doc();
        let registry = SlotRegistry::new("main", host);
        let handle = registry.register_view(&mut doc, div_view("", "nothing"));
        assert!(!handle.activate(&mut doc));
        assert!(!handle.is_active());
        handle.unregister(&mut doc);
        assert_eq!(registry.active_view_id(), None);
    }

    #[test]
    fn unknown_id_activation_returns_false() {
        let (mut doc, host) = slot_doc();
        let registry = SlotRegistry::new("main", host);
        assert!(!registry.activate_view(&mut doc, "ghost"));
    }

    #[test]
    fn failing_render_leaves_slot_empty() {
        let (mut doc, host) = slot_doc();
        let registry = SlotRegistry::new("main", host);
        registry.register_view(&mut doc, div_view("ok", "panel-ok").auto_activate(true));
        registry.register_view(
            &mut doc,
            ViewSpec::new("broken", |_| {
                Err(ShellError::view_callback("broken", "render exploded"))
            }),
        );

        assert!(registry.activate_view(&mut doc, "broken"));
        assert!(doc.children(host).is_empty());
        // Bookkeeping survives the failure: the broken view is active and a
        // healthy activation still works.
        assert_eq!(registry.active_view_id().as_deref(), Some("broken"));
        assert!(registry.activate_view(&mut doc, "ok"));
        assert_eq!(doc.children(host).len(), 1);
    }

    #[test]
    fn mobile_state_change_remounts_active_view() {
        let (mut doc, host) = slot_doc();
        let registry = SlotRegistry::new("main", host);
        registry.register_view(
            &mut doc,
            ViewSpec::new("responsive", |ctx| {
                let tag = if ctx.is_mobile { "section" } else { "article" };
                let node = ctx.document.create_element(tag);
                Ok(RenderResult::Node(node))
            })
            .auto_activate(true),
        );
        assert_eq!(doc.tag(doc.children(host)[0]), Some("article"));

        registry.set_mobile_state(&mut doc, true);
        assert_eq!(doc.tag(doc.children(host)[0]), Some("section"));

        // Unchanged state is a no-op.
        let mounted = doc.children(host);
        registry.set_mobile_state(&mut doc, true);
        assert_eq!(doc.children(host), mounted);
    }

    #[test]
    fn activations_are_counted_when_metrics_attached() {
        let (mut doc, host) = slot_doc();
        let metrics = Arc::new(Mutex::new(ShellMetrics::new()));
        let registry = SlotRegistry::new("main", host).with_metrics(Arc::clone(&metrics));
        registry.register_view(&mut doc, div_view("a", "panel-a"));
        registry.register_view(&mut doc, div_view("b", "panel-b"));

        assert!(registry.activate_view(&mut doc, "a"));
        assert!(registry.activate_view(&mut doc, "b"));
        assert!(!registry.activate_view(&mut doc, "missing"));

        let snapshot = metrics
            .lock()
            .unwrap()
            .snapshot(std::time::Duration::from_secs(1));
        assert_eq!(snapshot.view_activations, 2);
    }
}
