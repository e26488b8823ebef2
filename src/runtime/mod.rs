//! The responsive shell runtime.
//!
//! One `ShellRuntime` is created at startup with the real scaffold nodes
//! (wrapper, sidebar column, content column, desktop nav rail) and the
//! external navigation and home-route stores. Viewport observations drive
//! the desktop/mobile state machine; clicks are routed through document
//! dispatch; every handled event ends with a store pump so nav changes
//! re-project the rail and route changes feed the visibility sync.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::dom::{Display, Document, ListenerId, NodeId, SharedDocument};
use crate::error::{ShellError, ShellResult};
use crate::layout::{LayoutState, ShellColumns};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv, json_str};
use crate::metrics::ShellMetrics;
use crate::navrail::{AvatarWatcher, NavRailOptions, NavRailProjector, NullAvatarWatcher};
use crate::slots::SlotRegistry;
use crate::stores::{EntityOpenDetail, HomeRouteStore, NavSnapshot, NavStore, Subscription};

pub mod audit;
pub mod driver;
pub mod hosts;
pub mod route_sync;
pub mod transition;

use audit::{NullShellAudit, ShellAudit, ShellAuditEventBuilder, ShellAuditStage};
use hosts::OverlayHosts;
use route_sync::HomeRouteVisibilitySync;
use transition::{ShellEffect, ShellInput, ShellState, transition};

/// Stable dom id of the mobile close button.
pub const CLOSE_BUTTON_DOM_ID: &str = "astra-mobile-close";
/// Comment text of the placeholder left where the desktop rail stood.
pub const DESKTOP_NAV_ANCHOR: &str = "astra-desktop-nav-anchor";
/// Inbound document event revealing the main pane for deep links.
pub const ENTITY_OPEN_EVENT: &str = "astra:home-route:entity-open";
/// Outbound diagnostic dispatched when desktop nav restoration completes.
pub const DESKTOP_NAV_RESTORED_EVENT: &str = "astra:desktop-nav-restored";

/// Desktop/Mobile classification of a viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportClass {
    Desktop,
    Mobile,
}

/// Owns the injected width threshold. The breakpoint value is a
/// collaborator constant, not part of this crate's contract.
#[derive(Debug)]
pub struct ViewportWatcher {
    breakpoint: u32,
    last: Option<ViewportClass>,
}

impl ViewportWatcher {
    pub fn new(breakpoint: u32) -> Self {
        Self {
            breakpoint,
            last: None,
        }
    }

    pub fn classify(&self, width: u32) -> ViewportClass {
        if width < self.breakpoint {
            ViewportClass::Mobile
        } else {
            ViewportClass::Desktop
        }
    }

    /// `Some` only on the first observation and on boundary crossings.
    pub fn observe(&mut self, width: u32) -> Option<ViewportClass> {
        let class = self.classify(width);
        if self.last == Some(class) {
            None
        } else {
            self.last = Some(class);
            Some(class)
        }
    }

    pub fn last(&self) -> Option<ViewportClass> {
        self.last
    }
}

/// The scaffold nodes the host page hands over. All four must be live
/// document nodes; the desktop rail sits inside the sidebar column.
#[derive(Debug, Clone, Copy)]
pub struct ShellAnchors {
    pub wrapper: NodeId,
    pub sidebar: NodeId,
    pub content: NodeId,
    pub desktop_rail: NodeId,
}

/// Configuration knobs for the shell runtime.
#[derive(Clone)]
pub struct ShellConfig {
    /// Width threshold separating desktop from mobile.
    pub breakpoint: u32,
    /// Entity-browsing tab id (the "home" tab).
    pub home_tab: String,
    /// The one tab that hides the main pane instead of showing it.
    pub chat_tab: String,
    pub rail: NavRailOptions,
    /// Optional structured logger used by the runtime.
    pub logger: Option<Logger>,
    /// Metrics accumulator used for periodic snapshots.
    pub metrics: Option<Arc<Mutex<ShellMetrics>>>,
    /// Interval between metrics snapshot emissions. Zero disables snapshots.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            breakpoint: 1000,
            home_tab: "home".to_string(),
            chat_tab: "chat".to_string(),
            rail: NavRailOptions::default(),
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(5),
            metrics_target: "astra::shell.metrics".to_string(),
        }
    }
}

impl ShellConfig {
    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(ShellMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<ShellMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// Everything the shell needs, injected at construction. The host supplies
/// one canonical document and one canonical pair of stores; nothing is
/// resolved from ambient scope.
pub struct ShellSeams {
    pub document: SharedDocument,
    pub anchors: ShellAnchors,
    pub nav: NavStore,
    pub route: HomeRouteStore,
    pub avatar_watcher: Arc<dyn AvatarWatcher>,
    pub audit: Arc<dyn ShellAudit>,
    pub config: ShellConfig,
}

impl ShellSeams {
    pub fn new(
        document: SharedDocument,
        anchors: ShellAnchors,
        nav: NavStore,
        route: HomeRouteStore,
    ) -> Self {
        Self {
            document,
            anchors,
            nav,
            route,
            avatar_watcher: Arc::new(NullAvatarWatcher),
            audit: Arc::new(NullShellAudit),
            config: ShellConfig::default(),
        }
    }
}

/// High-level events delivered to the shell.
#[derive(Debug, Clone)]
pub enum ShellEvent {
    /// A viewport width sample; only boundary crossings cause transitions.
    Viewport { width: u32 },
    /// A click on a document node, routed through bubbling dispatch.
    Click { target: NodeId },
    /// Deep-link navigation that bypasses the tab click handler.
    EntityOpen(EntityOpenDetail),
    ShowMain,
    HideMain,
    Tick,
}

pub struct ShellRuntime {
    document: SharedDocument,
    anchors: ShellAnchors,
    config: ShellConfig,
    audit: Arc<dyn ShellAudit>,
    nav: NavStore,
    nav_subscription: Subscription,
    route_sync: HomeRouteVisibilitySync,
    rail: NavRailProjector,
    state: ShellState,
    layout: LayoutState,
    watcher: ViewportWatcher,
    hosts: Option<OverlayHosts>,
    mounted: bool,
    close_button: Option<NodeId>,
    close_listener: Option<ListenerId>,
    entity_open_listener: ListenerId,
    rail_placeholder: Option<NodeId>,
    column_restore: Vec<(NodeId, Option<NodeId>)>,
    slot_registries: Vec<SlotRegistry>,
    start_instant: Instant,
    last_metrics_emit: Instant,
    torn_down: bool,
}

impl ShellRuntime {
    pub fn new(seams: ShellSeams) -> ShellResult<Self> {
        let ShellSeams {
            document,
            anchors,
            nav,
            route,
            avatar_watcher,
            audit,
            config,
        } = seams;
        let entity_open_listener = {
            let mut doc = lock(&document);
            for (name, node) in [
                ("wrapper", anchors.wrapper),
                ("sidebar", anchors.sidebar),
                ("content", anchors.content),
                ("desktop_rail", anchors.desktop_rail),
            ] {
                if !doc.exists(node) {
                    return Err(ShellError::AnchorMissing(name));
                }
            }
            // Deep-link events bubble to body; pumped, not called back.
            let body = doc.body();
            doc.add_queuing_listener(body, ENTITY_OPEN_EVENT)
        };

        let mut rail = NavRailProjector::new(config.rail.clone(), avatar_watcher);
        if let Some(logger) = config.logger.as_ref() {
            rail = rail.with_logger(logger.clone());
        }
        let nav_subscription = nav.subscribe();
        let route_sync = HomeRouteVisibilitySync::new(route, config.home_tab.clone());
        let watcher = ViewportWatcher::new(config.breakpoint);
        let now = Instant::now();

        let runtime = Self {
            document,
            anchors,
            audit,
            nav,
            nav_subscription,
            route_sync,
            rail,
            state: ShellState::Desktop,
            layout: LayoutState::new(),
            watcher,
            hosts: None,
            mounted: false,
            close_button: None,
            close_listener: None,
            entity_open_listener,
            rail_placeholder: None,
            column_restore: Vec::new(),
            slot_registries: Vec::new(),
            start_instant: now,
            last_metrics_emit: now,
            torn_down: false,
            config,
        };
        runtime.record_audit(ShellAuditStage::ShellConstructed, |builder| {
            builder.detail("breakpoint", json!(runtime.config.breakpoint));
        });
        runtime.log(
            LogLevel::Info,
            "shell_constructed",
            [json_kv("breakpoint", json!(runtime.config.breakpoint))],
        );
        Ok(runtime)
    }

    pub fn state(&self) -> ShellState {
        self.state
    }

    pub fn is_mobile(&self) -> bool {
        self.state.is_mobile()
    }

    pub fn main_visible(&self) -> bool {
        self.state.main_visible()
    }

    pub fn document(&self) -> SharedDocument {
        Arc::clone(&self.document)
    }

    pub fn close_button(&self) -> Option<NodeId> {
        self.close_button
    }

    /// Target node of the nth rail button, for drivers and tests.
    pub fn rail_button(&self, index: usize) -> Option<NodeId> {
        self.rail.bindings().get(index).map(|b| b.button)
    }

    /// Registries attached here receive `set_mobile_state` on every
    /// desktop/mobile crossing so their active views re-render responsively.
    pub fn attach_slot_registry(&mut self, registry: SlotRegistry) {
        let registry = match self.config.metrics_handle() {
            Some(handle) => registry.with_metrics(handle),
            None => registry,
        };
        let document = Arc::clone(&self.document);
        let mut doc = lock(&document);
        registry.set_mobile_state(&mut doc, self.state.is_mobile());
        drop(doc);
        self.slot_registries.push(registry);
    }

    /// Classifies the startup width and runs the corresponding transition.
    pub fn initialize_layout(&mut self, width: u32) {
        if let Some(class) = self.watcher.observe(width) {
            let input = match class {
                ViewportClass::Mobile => ShellInput::EnterMobile,
                ViewportClass::Desktop => ShellInput::LeaveMobile,
            };
            self.apply_input(input);
        }
        self.record_audit(ShellAuditStage::LayoutInitialized, |builder| {
            builder.detail("width", json!(width));
        });
        self.log(
            LogLevel::Info,
            "layout_initialized",
            [
                json_kv("width", json!(width)),
                json_kv("mobile", json!(self.state.is_mobile())),
            ],
        );
    }

    pub fn handle_event(&mut self, event: ShellEvent) {
        if self.torn_down {
            return;
        }
        self.with_metrics(|metrics| metrics.record_event());
        self.log(
            LogLevel::Debug,
            "event_dispatched",
            [json_kv("event", json!(Self::describe_event(&event)))],
        );
        match event {
            ShellEvent::Viewport { width } => {
                if let Some(class) = self.watcher.observe(width) {
                    self.record_audit(ShellAuditStage::ViewportObserved, |builder| {
                        builder.detail("width", json!(width));
                        builder.detail("mobile", json!(class == ViewportClass::Mobile));
                    });
                    let input = match class {
                        ViewportClass::Mobile => ShellInput::EnterMobile,
                        ViewportClass::Desktop => ShellInput::LeaveMobile,
                    };
                    self.apply_input(input);
                }
            }
            ShellEvent::Click { target } => self.handle_click(target),
            ShellEvent::EntityOpen(detail) => self.handle_entity_open(detail),
            ShellEvent::ShowMain => self.apply_input(ShellInput::ShowMain),
            ShellEvent::HideMain => self.apply_input(ShellInput::HideMain),
            ShellEvent::Tick => {}
        }
        self.pump_document_events();
        self.pump_stores();
        self.maybe_emit_metrics();
    }

    /// Folds a script of events; the test and bench surface.
    pub fn run_scripted<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = ShellEvent>,
    {
        for event in events {
            self.handle_event(event);
        }
    }

    /// Touch-gesture swipe-to-close is deliberately disabled; the hook
    /// exists so embedders wiring gesture recognizers have a stable no-op
    /// to call.
    pub fn on_swipe_close(&mut self) {}

    /// Leaves mobile if mounted, destroys the overlay scaffold, and resets
    /// the layout flags. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        if self.state.is_mobile() {
            self.apply_input(ShellInput::LeaveMobile);
        }
        let document = Arc::clone(&self.document);
        {
            let mut doc = lock(&document);
            doc.remove_listener(self.entity_open_listener);
            if let Some(hosts) = self.hosts.take() {
                hosts.destroy(&mut doc);
            }
        }
        self.layout.reset_flags();
        self.torn_down = true;
        self.record_audit(ShellAuditStage::TeardownCompleted, |_| {});
        self.log(
            LogLevel::Info,
            "teardown_completed",
            [json_kv(
                "uptime_ms",
                json!(self.start_instant.elapsed().as_millis() as u64),
            )],
        );
    }

    // ---- event handling ----------------------------------------------------

    fn handle_click(&mut self, target: NodeId) {
        let record = {
            let mut doc = lock(&self.document);
            doc.dispatch(target, "click", Value::Null)
        };
        for delivery in &record.deliveries {
            if Some(delivery.listener) == self.close_listener {
                self.apply_input(ShellInput::HideMain);
                continue;
            }
            let tab = self
                .rail
                .bindings()
                .iter()
                .find(|b| b.listener == delivery.listener)
                .map(|b| b.tab_id.clone());
            if let Some(tab) = tab {
                self.select_tab(&tab);
            }
        }
    }

    /// Selecting a tab that actually changes the active tab shows the main
    /// pane for main-area tabs (all but the chat tab) and hides it for the
    /// chat tab. Reselecting the same tab leaves visibility alone.
    fn select_tab(&mut self, tab_id: &str) {
        if self.nav.snapshot().active_tab == tab_id {
            return;
        }
        let tab = tab_id.to_string();
        self.nav.update(|snapshot| snapshot.active_tab = tab);
        if self.state.is_mobile() {
            if tab_id == self.config.chat_tab {
                self.apply_input(ShellInput::HideMain);
            } else {
                self.apply_input(ShellInput::ShowMain);
            }
        }
        self.log(
            LogLevel::Debug,
            "tab_selected",
            [json_str("tab", tab_id)],
        );
    }

    /// Deep links force the main pane visible while mobile even when the
    /// active tab did not change; on desktop only the tab switches.
    fn handle_entity_open(&mut self, detail: EntityOpenDetail) {
        if self.nav.snapshot().active_tab != detail.tab_id {
            let tab = detail.tab_id.clone();
            self.nav.update(|snapshot| snapshot.active_tab = tab);
        }
        if self.state.is_mobile() {
            self.apply_input(ShellInput::ShowMain);
        }
        self.log(
            LogLevel::Info,
            "entity_opened",
            [
                json_str("tab", detail.tab_id.clone()),
                json_kv("entity_key", json!(detail.entity_key)),
                json_kv("source", json!(detail.source)),
            ],
        );
    }

    /// Events dispatched on the document since the last pump; decode
    /// failures are logged and skipped.
    fn pump_document_events(&mut self) {
        let details = {
            let mut doc = lock(&self.document);
            doc.drain_deliveries(self.entity_open_listener)
        };
        for detail in details {
            match serde_json::from_value::<EntityOpenDetail>(detail) {
                Ok(detail) => self.handle_entity_open(detail),
                Err(err) => self.log(
                    LogLevel::Warn,
                    "entity_open_detail_rejected",
                    [json_str("error", err.to_string())],
                ),
            }
        }
    }

    fn pump_stores(&mut self) {
        if let Some(snapshot) = self.nav.poll(&mut self.nav_subscription) {
            if self.mounted {
                let document = Arc::clone(&self.document);
                let rebuilt = {
                    let mut doc = lock(&document);
                    self.project_rail(&mut doc, &snapshot)
                };
                if rebuilt {
                    self.with_metrics(|metrics| metrics.record_rail_projection());
                    self.record_audit(ShellAuditStage::RailProjected, |_| {});
                }
            }
        }
        let active_tab = self.nav.snapshot().active_tab;
        if self.route_sync.pump(self.state.is_mobile(), &active_tab) {
            self.apply_input(ShellInput::ShowMain);
        }
    }

    // ---- state machine execution -------------------------------------------

    fn apply_input(&mut self, input: ShellInput) {
        let (next, effects) = transition(self.state, input);
        self.state = next;
        if effects.is_empty() {
            return;
        }
        let was_mounted = self.mounted;
        let document = Arc::clone(&self.document);
        {
            let mut doc = lock(&document);
            for effect in &effects {
                self.execute_effect(&mut doc, *effect);
            }
        }
        if !was_mounted && self.mounted {
            self.with_metrics(|metrics| metrics.record_mobile_transition());
            self.record_audit(ShellAuditStage::MobileMounted, |_| {});
            self.sync_slot_registries(true);
        } else if was_mounted && !self.mounted {
            self.with_metrics(|metrics| metrics.record_desktop_transition());
            self.record_audit(ShellAuditStage::DesktopRestored, |_| {});
            self.sync_slot_registries(false);
        }
    }

    fn execute_effect(&mut self, doc: &mut Document, effect: ShellEffect) {
        match effect {
            ShellEffect::MountOverlay => self.mount_overlay(doc),
            ShellEffect::ApplyMobileChrome => {
                doc.set_display(self.anchors.wrapper, Display::None);
                self.layout.apply_mobile_layout(doc);
            }
            ShellEffect::ConcealMain => {
                if let Some(released) = self.layout.hide_main_area(doc, self.columns()) {
                    self.with_metrics(|metrics| {
                        metrics.record_main_hidden();
                        if released {
                            metrics.record_focus_release();
                        }
                    });
                    self.record_audit(ShellAuditStage::MainHidden, |_| {});
                }
            }
            ShellEffect::RevealMain => {
                if let Some(released) = self.layout.show_main_area(doc, self.columns()) {
                    self.with_metrics(|metrics| {
                        metrics.record_main_shown();
                        if released {
                            metrics.record_focus_release();
                        }
                    });
                    self.record_audit(ShellAuditStage::MainShown, |_| {});
                }
            }
            ShellEffect::ResetColumns => {
                self.layout.reset_main_area(doc, self.columns());
            }
            ShellEffect::UnmountOverlay => self.unmount_overlay(doc),
            ShellEffect::ClearMobileChrome => {
                doc.set_display(self.anchors.wrapper, Display::Default);
                self.layout.apply_desktop_layout(doc);
            }
        }
    }

    /// Moves the columns into the overlay hosts, swaps the desktop rail for
    /// its placeholder, projects the mobile rail, and attaches the close
    /// button. The detached-flag guard runs before any document write.
    fn mount_overlay(&mut self, doc: &mut Document) {
        if self.mounted {
            return;
        }
        let hosts = match OverlayHosts::ensure(doc, self.hosts) {
            Ok(hosts) => hosts,
            Err(err) => {
                self.absorb("mount_overlay", err);
                return;
            }
        };
        self.hosts = Some(hosts);
        hosts.reveal(doc);

        self.column_restore = vec![
            (self.anchors.sidebar, doc.next_sibling(self.anchors.sidebar)),
            (self.anchors.content, doc.next_sibling(self.anchors.content)),
        ];
        if let Err(err) = doc.append_child(hosts.sidebar_host, self.anchors.sidebar) {
            self.absorb("reparent_sidebar", err);
        }
        if let Err(err) = doc.append_child(hosts.main_host, self.anchors.content) {
            self.absorb("reparent_content", err);
        }
        self.with_metrics(|metrics| metrics.record_reparented_nodes(2));

        let placeholder = doc.create_comment(DESKTOP_NAV_ANCHOR);
        match doc.swap_node(self.anchors.desktop_rail, placeholder) {
            Ok(()) => self.rail_placeholder = Some(placeholder),
            Err(err) => self.absorb("detach_desktop_rail", err),
        }

        let snapshot = self.nav.snapshot();
        if self.project_rail(doc, &snapshot) {
            self.with_metrics(|metrics| metrics.record_rail_projection());
            self.record_audit(ShellAuditStage::RailProjected, |_| {});
        }

        let close = doc
            .build_element("button")
            .dom_id(CLOSE_BUTTON_DOM_ID)
            .text("×")
            .child_of(hosts.overlay);
        match close {
            Ok(close) => {
                self.close_listener = Some(doc.add_listener(close, "click"));
                self.close_button = Some(close);
            }
            Err(err) => self.absorb("close_button", err),
        }

        self.mounted = true;
        self.log(LogLevel::Info, "mobile_mounted", std::iter::empty());
    }

    /// Builds or refreshes the mobile rail where the desktop rail stood: in
    /// the placeholder's parent, directly after the placeholder. Falls back
    /// to the overlay sidebar host when the rail swap did not happen.
    fn project_rail(&mut self, doc: &mut Document, snapshot: &NavSnapshot) -> bool {
        let Some(hosts) = self.hosts else {
            return false;
        };
        let parent = self
            .rail_placeholder
            .filter(|placeholder| doc.exists(*placeholder))
            .and_then(|placeholder| doc.parent(placeholder))
            .unwrap_or(hosts.sidebar_host);
        let rebuilt = self.rail.project(doc, parent, snapshot);
        if rebuilt {
            if let (Some(rail), Some(placeholder)) = (self.rail.rail(), self.rail_placeholder) {
                if doc.parent(placeholder) == Some(parent) {
                    let after = doc.next_sibling(placeholder);
                    if after != Some(rail) {
                        if let Err(err) = doc.insert_before(parent, rail, after) {
                            self.absorb("position_rail", err);
                        }
                    }
                }
            }
        }
        rebuilt
    }

    /// Exact reverse of [`Self::mount_overlay`]: rail down, close button
    /// gone, desktop rail back at its placeholder, columns back under the
    /// wrapper at their recorded positions, overlay hidden.
    fn unmount_overlay(&mut self, doc: &mut Document) {
        if !self.mounted {
            return;
        }
        self.rail.teardown(doc);
        if let Some(listener) = self.close_listener.take() {
            doc.remove_listener(listener);
        }
        if let Some(close) = self.close_button.take() {
            if doc.exists(close) {
                let _ = doc.destroy_subtree(close);
            }
        }
        if let Some(placeholder) = self.rail_placeholder.take() {
            if let Err(err) = doc.swap_node(placeholder, self.anchors.desktop_rail) {
                self.absorb("restore_desktop_rail", err);
            }
            let _ = doc.destroy_subtree(placeholder);
        }
        // Reverse capture order so earlier siblings find their successors
        // already in place.
        let restores: Vec<_> = self.column_restore.drain(..).rev().collect();
        for (column, next) in restores {
            if let Err(err) = doc.insert_before(self.anchors.wrapper, column, next) {
                self.absorb("restore_column", err);
            }
        }
        self.with_metrics(|metrics| metrics.record_reparented_nodes(2));
        if let Some(hosts) = self.hosts {
            hosts.conceal(doc);
        }
        self.mounted = false;

        let record = doc.dispatch(self.anchors.desktop_rail, DESKTOP_NAV_RESTORED_EVENT, Value::Null);
        self.record_audit(ShellAuditStage::DesktopNavRestored, |builder| {
            builder.detail("deliveries", json!(record.deliveries.len()));
        });
        self.log(LogLevel::Info, "desktop_nav_restored", std::iter::empty());
    }

    fn sync_slot_registries(&mut self, is_mobile: bool) {
        if self.slot_registries.is_empty() {
            return;
        }
        let document = Arc::clone(&self.document);
        let mut doc = lock(&document);
        for registry in &self.slot_registries {
            registry.set_mobile_state(&mut doc, is_mobile);
        }
    }

    fn columns(&self) -> ShellColumns {
        ShellColumns {
            sidebar: self.anchors.sidebar,
            content: self.anchors.content,
        }
    }

    // ---- instrumentation ---------------------------------------------------

    fn absorb(&self, op: &str, err: ShellError) {
        self.log(
            LogLevel::Warn,
            "shell_operation_degraded",
            [json_str("op", op), json_str("error", err.to_string())],
        );
    }

    fn record_audit(
        &self,
        stage: ShellAuditStage,
        details: impl FnOnce(&mut ShellAuditEventBuilder),
    ) {
        let mut builder = ShellAuditEventBuilder::new(stage);
        details(&mut builder);
        self.audit.record(builder.finish());
    }

    fn with_metrics(&self, f: impl FnOnce(&mut ShellMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                f(&mut guard);
            }
        }
    }

    fn maybe_emit_metrics(&mut self) {
        if self.config.metrics.is_none() {
            return;
        }
        if self.config.metrics_interval == Duration::from_millis(0) {
            return;
        }
        let now = Instant::now();
        if now.duration_since(self.last_metrics_emit) < self.config.metrics_interval {
            return;
        }
        self.last_metrics_emit = now;
        let uptime = now.duration_since(self.start_instant);
        if let (Some(logger), Some(metrics)) =
            (self.config.logger.as_ref(), self.config.metrics.as_ref())
        {
            if let Ok(guard) = metrics.lock() {
                let target = self.config.metrics_target.as_str();
                let event = guard.snapshot(uptime).to_log_event(target);
                let _ = logger.log_event(event);
            }
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, "astra::shell", message, fields);
            let _ = logger.log_event(event);
        }
    }

    fn describe_event(event: &ShellEvent) -> &'static str {
        match event {
            ShellEvent::Viewport { .. } => "viewport",
            ShellEvent::Click { .. } => "click",
            ShellEvent::EntityOpen(_) => "entity_open",
            ShellEvent::ShowMain => "show_main",
            ShellEvent::HideMain => "hide_main",
            ShellEvent::Tick => "tick",
        }
    }
}

fn lock(document: &SharedDocument) -> MutexGuard<'_, Document> {
    document
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::shared_document;
    use crate::slots::{RenderResult, ViewSpec};
    use crate::stores::{HomeRoute, NavItem, NavSections, NavSnapshot, Store};

    fn nav_snapshot() -> NavSnapshot {
        NavSnapshot {
            active_tab: "home".to_string(),
            sections: NavSections {
                top: vec![NavItem::titled("home", "Home")],
                middle: vec![
                    NavItem::titled("user-settings", "Settings"),
                    NavItem::titled("persona", "Persona"),
                ],
                bottom: vec![NavItem::titled("chat", "Chat")],
            },
        }
    }

    struct Shell {
        runtime: ShellRuntime,
        document: SharedDocument,
        anchors: ShellAnchors,
        nav: NavStore,
        route: HomeRouteStore,
    }

    fn build_shell() -> Shell {
        let mut doc = Document::new();
        let body = doc.body();
        let wrapper = doc.build_element("div").dom_id("app-wrapper").finish();
        doc.append_child(body, wrapper).unwrap();
        let sidebar = doc.build_element("div").dom_id("app-sidebar").finish();
        doc.append_child(wrapper, sidebar).unwrap();
        let desktop_rail = doc.build_element("nav").dom_id("app-desktop-rail").finish();
        doc.append_child(sidebar, desktop_rail).unwrap();
        let content = doc.build_element("div").dom_id("app-content").finish();
        doc.append_child(wrapper, content).unwrap();

        let document = shared_document(doc);
        let anchors = ShellAnchors {
            wrapper,
            sidebar,
            content,
            desktop_rail,
        };
        let nav = Store::new(nav_snapshot());
        let route = Store::new(HomeRoute::default());
        let runtime = ShellRuntime::new(ShellSeams::new(
            Arc::clone(&document),
            anchors,
            nav.clone(),
            route.clone(),
        ))
        .unwrap();
        Shell {
            runtime,
            document,
            anchors,
            nav,
            route,
        }
    }

    #[test]
    fn watcher_reports_first_observation_and_crossings() {
        let mut watcher = ViewportWatcher::new(1000);
        assert_eq!(watcher.observe(1200), Some(ViewportClass::Desktop));
        assert_eq!(watcher.observe(1100), None);
        assert_eq!(watcher.observe(480), Some(ViewportClass::Mobile));
        assert_eq!(watcher.observe(320), None);
        assert_eq!(watcher.observe(1000), Some(ViewportClass::Desktop));
    }

    #[test]
    fn missing_anchor_fails_construction() {
        let mut doc = Document::new();
        let wrapper = doc.create_element("div");
        doc.append_child(doc.body(), wrapper).unwrap();
        let ghost = doc.create_element("div");
        doc.destroy_subtree(ghost).unwrap();
        let document = shared_document(doc);
        let result = ShellRuntime::new(ShellSeams::new(
            document,
            ShellAnchors {
                wrapper,
                sidebar: ghost,
                content: ghost,
                desktop_rail: ghost,
            },
            Store::new(nav_snapshot()),
            Store::new(HomeRoute::default()),
        ));
        assert!(matches!(result, Err(ShellError::AnchorMissing("sidebar"))));
    }

    #[test]
    fn responsive_round_trip_restores_everything() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(1200);
        assert!(!shell.runtime.is_mobile());
        let rail_prev = {
            let doc = lock(&shell.document);
            doc.previous_sibling(shell.anchors.desktop_rail)
        };

        shell.runtime.handle_event(ShellEvent::Viewport { width: 480 });
        assert!(shell.runtime.is_mobile());
        assert!(!shell.runtime.main_visible());
        {
            let doc = lock(&shell.document);
            assert!(doc.has_class(doc.body(), "astra-mobile-layout"));
            let overlay = doc.element_by_dom_id(hosts::OVERLAY_DOM_ID).unwrap();
            assert_eq!(doc.display(overlay), Display::Default);
            let sidebar_host = doc.element_by_dom_id(hosts::SIDEBAR_HOST_DOM_ID).unwrap();
            let main_host = doc.element_by_dom_id(hosts::MAIN_HOST_DOM_ID).unwrap();
            assert_eq!(doc.parent(shell.anchors.sidebar), Some(sidebar_host));
            assert_eq!(doc.parent(shell.anchors.content), Some(main_host));
            assert_eq!(doc.display(shell.anchors.wrapper), Display::None);
            // Mobile default view is the sidebar; content starts inert.
            assert_eq!(doc.attr(shell.anchors.content, "aria-hidden"), Some("true"));
            assert_eq!(doc.attr(shell.anchors.sidebar, "aria-hidden"), None);
            assert!(doc.element_by_dom_id(crate::navrail::NAV_RAIL_DOM_ID).is_some());
            assert!(doc.element_by_dom_id(CLOSE_BUTTON_DOM_ID).is_some());
        }

        shell.runtime.handle_event(ShellEvent::ShowMain);
        assert!(shell.runtime.main_visible());
        {
            let doc = lock(&shell.document);
            assert!(doc.has_class(doc.body(), "astra-main-visible"));
            assert_eq!(doc.attr(shell.anchors.content, "aria-hidden"), None);
            assert_eq!(doc.attr(shell.anchors.sidebar, "aria-hidden"), Some("true"));
            assert_eq!(doc.attr(shell.anchors.sidebar, "inert"), Some(""));
        }

        shell.runtime.handle_event(ShellEvent::Viewport { width: 1400 });
        assert!(!shell.runtime.is_mobile());
        {
            let doc = lock(&shell.document);
            assert!(!doc.has_class(doc.body(), "astra-mobile-layout"));
            assert!(!doc.has_class(doc.body(), "astra-main-visible"));
            for column in [shell.anchors.sidebar, shell.anchors.content] {
                assert_eq!(doc.attr(column, "aria-hidden"), None);
                assert_eq!(doc.attr(column, "inert"), None);
            }
            assert_eq!(doc.parent(shell.anchors.sidebar), Some(shell.anchors.wrapper));
            assert_eq!(doc.parent(shell.anchors.content), Some(shell.anchors.wrapper));
            assert_eq!(doc.display(shell.anchors.wrapper), Display::Default);
            // Exact restoration: the desktop rail kept its old position.
            assert_eq!(doc.previous_sibling(shell.anchors.desktop_rail), rail_prev);
            assert_eq!(doc.parent(shell.anchors.desktop_rail), Some(shell.anchors.sidebar));
            assert_eq!(doc.element_by_dom_id(CLOSE_BUTTON_DOM_ID), None);
            assert_eq!(doc.element_by_dom_id(crate::navrail::NAV_RAIL_DOM_ID), None);
        }
    }

    #[test]
    fn second_mount_is_a_no_op() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);
        let (sidebar_parent, content_parent) = {
            let doc = lock(&shell.document);
            (
                doc.parent(shell.anchors.sidebar),
                doc.parent(shell.anchors.content),
            )
        };

        shell.runtime.apply_input(ShellInput::EnterMobile);
        let doc = lock(&shell.document);
        assert_eq!(doc.parent(shell.anchors.sidebar), sidebar_parent);
        assert_eq!(doc.parent(shell.anchors.content), content_parent);
    }

    #[test]
    fn hiding_main_releases_trapped_focus() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);
        shell.runtime.handle_event(ShellEvent::ShowMain);
        {
            let mut doc = lock(&shell.document);
            let input = doc.create_element("input");
            doc.append_child(shell.anchors.content, input).unwrap();
            doc.focus(input);
        }

        shell.runtime.handle_event(ShellEvent::HideMain);
        let doc = lock(&shell.document);
        let active = doc.active_element().unwrap();
        assert_eq!(active, doc.body());
        assert!(!doc.contains(shell.anchors.content, active));
        assert_eq!(doc.attr(shell.anchors.content, "aria-hidden"), Some("true"));
    }

    #[test]
    fn rail_clicks_drive_tab_and_visibility() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);
        let find_button = |runtime: &ShellRuntime, tab: &str| {
            runtime
                .rail
                .bindings()
                .iter()
                .find(|b| b.tab_id == tab)
                .map(|b| b.button)
                .unwrap()
        };

        let chat = find_button(&shell.runtime, "chat");
        shell.runtime.handle_event(ShellEvent::Click { target: chat });
        assert_eq!(shell.nav.snapshot().active_tab, "chat");
        assert!(!shell.runtime.main_visible());

        let persona = find_button(&shell.runtime, "persona");
        shell.runtime.handle_event(ShellEvent::Click { target: persona });
        assert_eq!(shell.nav.snapshot().active_tab, "persona");
        assert!(shell.runtime.main_visible());

        // Reselecting the active tab leaves visibility alone.
        shell.runtime.handle_event(ShellEvent::HideMain);
        shell.runtime.handle_event(ShellEvent::Click { target: persona });
        assert!(!shell.runtime.main_visible());
    }

    #[test]
    fn close_button_hides_the_main_pane() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);
        shell.runtime.handle_event(ShellEvent::ShowMain);
        assert!(shell.runtime.main_visible());

        let close = shell.runtime.close_button().unwrap();
        shell.runtime.handle_event(ShellEvent::Click { target: close });
        assert!(!shell.runtime.main_visible());
    }

    #[test]
    fn entity_open_forces_main_visible_while_mobile() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);
        assert!(!shell.runtime.main_visible());

        let detail = EntityOpenDetail {
            tab_id: "home".to_string(),
            entity_key: Some("aria-7".to_string()),
            ..EntityOpenDetail::default()
        };
        shell.runtime.handle_event(ShellEvent::EntityOpen(detail));
        assert!(shell.runtime.main_visible());
        assert_eq!(shell.nav.snapshot().active_tab, "home");
    }

    #[test]
    fn entity_open_on_desktop_only_switches_tabs() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(1400);
        let detail = EntityOpenDetail {
            tab_id: "persona".to_string(),
            ..EntityOpenDetail::default()
        };
        shell.runtime.handle_event(ShellEvent::EntityOpen(detail));
        assert!(!shell.runtime.is_mobile());
        assert_eq!(shell.nav.snapshot().active_tab, "persona");
    }

    #[test]
    fn document_dispatched_entity_open_reveals_main() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);
        assert!(!shell.runtime.main_visible());

        let detail = serde_json::to_value(EntityOpenDetail {
            tab_id: "home".to_string(),
            entity_key: Some("aria-7".to_string()),
            ..EntityOpenDetail::default()
        })
        .unwrap();
        let deliveries = {
            let mut doc = lock(&shell.document);
            let body = doc.body();
            doc.dispatch(body, ENTITY_OPEN_EVENT, detail).deliveries.len()
        };
        assert_eq!(deliveries, 1);

        shell.runtime.handle_event(ShellEvent::Tick);
        assert!(shell.runtime.main_visible());
        assert_eq!(shell.nav.snapshot().active_tab, "home");
    }

    #[test]
    fn entity_open_dispatch_bubbles_and_rejects_bad_details() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);
        {
            let mut doc = lock(&shell.document);
            // Dispatched below body; the binding catches it on the bubble.
            let record = doc.dispatch(
                shell.anchors.content,
                ENTITY_OPEN_EVENT,
                json!(["not", "a", "detail"]),
            );
            assert_eq!(record.deliveries.len(), 1);
        }
        shell.runtime.handle_event(ShellEvent::Tick);
        assert!(!shell.runtime.main_visible());
    }

    #[test]
    fn route_store_reveals_main_for_deep_links() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);
        assert!(!shell.runtime.main_visible());

        shell.route.set(HomeRoute::entity("character", "muse-2"));
        shell.runtime.handle_event(ShellEvent::Tick);
        assert!(shell.runtime.main_visible());
    }

    #[test]
    fn nav_store_changes_reproject_the_rail() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);
        let before = shell.runtime.rail.bindings().len();

        shell.nav.update(|snapshot| {
            snapshot
                .sections
                .middle
                .push(NavItem::titled("world-info", "World Info"));
        });
        shell.runtime.handle_event(ShellEvent::Tick);
        assert_eq!(shell.runtime.rail.bindings().len(), before + 1);
    }

    #[test]
    fn mobile_rail_stands_where_the_desktop_rail_stood() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);

        let placeholder = {
            let doc = lock(&shell.document);
            let rail = doc.element_by_dom_id(crate::navrail::NAV_RAIL_DOM_ID).unwrap();
            assert_eq!(doc.parent(rail), Some(shell.anchors.sidebar));
            let placeholder = doc.previous_sibling(rail).unwrap();
            assert!(matches!(
                doc.kind(placeholder),
                Some(crate::dom::NodeKind::Comment { text }) if text == DESKTOP_NAV_ANCHOR
            ));
            placeholder
        };

        // A rebuild keeps the position.
        shell.nav.update(|snapshot| {
            snapshot
                .sections
                .middle
                .push(NavItem::titled("world-info", "World Info"));
        });
        shell.runtime.handle_event(ShellEvent::Tick);
        let doc = lock(&shell.document);
        let rail = doc.element_by_dom_id(crate::navrail::NAV_RAIL_DOM_ID).unwrap();
        assert_eq!(doc.parent(rail), Some(shell.anchors.sidebar));
        assert_eq!(doc.previous_sibling(rail), Some(placeholder));
    }

    #[test]
    fn attached_registries_follow_mobile_crossings() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(1400);
        let host = {
            let mut doc = lock(&shell.document);
            let host = doc.create_element("div");
            doc.append_child(shell.anchors.content, host).unwrap();
            host
        };
        let registry = SlotRegistry::new("main", host);
        {
            let mut doc = lock(&shell.document);
            registry.register_view(
                &mut doc,
                ViewSpec::new("panel", |ctx| {
                    let tag = if ctx.is_mobile { "section" } else { "article" };
                    let node = ctx.document.create_element(tag);
                    Ok(RenderResult::Node(node))
                })
                .auto_activate(true),
            );
        }
        shell.runtime.attach_slot_registry(registry.clone());

        shell.runtime.handle_event(ShellEvent::Viewport { width: 480 });
        {
            let doc = lock(&shell.document);
            assert_eq!(doc.tag(doc.children(host)[0]), Some("section"));
        }
        shell.runtime.handle_event(ShellEvent::Viewport { width: 1400 });
        {
            let doc = lock(&shell.document);
            assert_eq!(doc.tag(doc.children(host)[0]), Some("article"));
        }
    }

    #[test]
    fn teardown_is_idempotent_and_leaves_desktop_layout() {
        let mut shell = build_shell();
        shell.runtime.initialize_layout(480);
        shell.runtime.teardown();
        shell.runtime.teardown();

        let doc = lock(&shell.document);
        assert!(!doc.has_class(doc.body(), "astra-mobile-layout"));
        assert_eq!(doc.parent(shell.anchors.sidebar), Some(shell.anchors.wrapper));
        assert_eq!(doc.element_by_dom_id(hosts::OVERLAY_DOM_ID), None);
        drop(doc);
        // Events after teardown are ignored.
        shell.runtime.handle_event(ShellEvent::Viewport { width: 480 });
        assert!(!shell.runtime.is_mobile());
    }

    #[test]
    fn scripted_run_counts_events_in_metrics() {
        let mut shell = build_shell();
        shell.runtime.config.enable_metrics();
        let handle = shell.runtime.config.metrics_handle().unwrap();
        shell.runtime.initialize_layout(1200);
        shell.runtime.run_scripted(vec![
            ShellEvent::Viewport { width: 480 },
            ShellEvent::ShowMain,
            ShellEvent::HideMain,
            ShellEvent::Viewport { width: 1400 },
            ShellEvent::Tick,
        ]);

        let snapshot = handle.lock().unwrap().snapshot(Duration::from_secs(1));
        assert_eq!(snapshot.events, 5);
        assert_eq!(snapshot.mobile_transitions, 1);
        assert_eq!(snapshot.desktop_transitions, 1);
        assert!(snapshot.reparented_nodes >= 4);
    }
}
