use std::sync::Arc;

use blake3::Hash;
use serde_json::json;

use crate::dom::{Document, ListenerId, NodeId};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::stores::{NavItem, NavSections, NavSnapshot};
use crate::width::truncate_display;

/// Stable dom id styling and tests target.
pub const NAV_RAIL_DOM_ID: &str = "astra-mobile-nav-rail";

/// External consumer interested in the persona avatar node embedded in the
/// rail. Registered on every rebuild and unregistered before the next one so
/// watcher targets never leak.
pub trait AvatarWatcher: Send + Sync {
    fn watch(&self, node: NodeId);
    fn unwatch(&self, node: NodeId);
}

/// Default watcher used when the host does not care about avatars.
#[derive(Debug, Default)]
pub struct NullAvatarWatcher;

impl AvatarWatcher for NullAvatarWatcher {
    fn watch(&self, _node: NodeId) {}
    fn unwatch(&self, _node: NodeId) {}
}

/// Host-injected rail identifiers. The distilled navigation model leaves the
/// concrete ids to the application, so they are options, not constants.
#[derive(Debug, Clone)]
pub struct NavRailOptions {
    pub home_id: String,
    pub chat_id: String,
    pub persona_id: String,
    /// Middle-section items the re-inserted home/chat pair follows.
    pub anchors: Vec<String>,
    pub max_title_width: usize,
}

impl Default for NavRailOptions {
    fn default() -> Self {
        Self {
            home_id: "home".to_string(),
            chat_id: "chat".to_string(),
            persona_id: "persona".to_string(),
            anchors: vec!["user-settings".to_string(), "persona".to_string()],
            max_title_width: 24,
        }
    }
}

/// A live click binding on one rail button.
#[derive(Debug, Clone)]
pub struct RailBinding {
    pub listener: ListenerId,
    pub button: NodeId,
    pub tab_id: String,
}

/// Builds and maintains the mobile rail from nav-store snapshots.
///
/// A full rebuild destroys and recreates buttons, losing any attached
/// avatar-watcher target, so rebuilds are gated on a `blake3` signature of
/// the normalized ordered id list. The active/pressed state is re-applied on
/// every projection regardless.
pub struct NavRailProjector {
    options: NavRailOptions,
    watcher: Arc<dyn AvatarWatcher>,
    logger: Option<Logger>,
    rail: Option<NodeId>,
    signature: Option<Hash>,
    bindings: Vec<RailBinding>,
    avatar: Option<NodeId>,
}

impl NavRailProjector {
    pub fn new(options: NavRailOptions, watcher: Arc<dyn AvatarWatcher>) -> Self {
        Self {
            options,
            watcher,
            logger: None,
            rail: None,
            signature: None,
            bindings: Vec::new(),
            avatar: None,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn rail(&self) -> Option<NodeId> {
        self.rail
    }

    pub fn bindings(&self) -> &[RailBinding] {
        &self.bindings
    }

    /// Projects `snapshot` into a rail under `parent`. Returns whether a
    /// full rebuild happened.
    pub fn project(&mut self, doc: &mut Document, parent: NodeId, snapshot: &NavSnapshot) -> bool {
        let sections = normalize_sections(&snapshot.sections, &self.options);
        let signature = section_signature(&sections);
        let stale = match self.rail {
            Some(rail) => !doc.exists(rail) || self.signature != Some(signature),
            None => true,
        };
        if stale {
            self.teardown(doc);
            self.build(doc, parent, &sections);
            self.signature = Some(signature);
            self.log(
                LogLevel::Debug,
                "rail_rebuilt",
                [json_kv("buttons", json!(self.bindings.len()))],
            );
        }
        self.apply_active_state(doc, &snapshot.active_tab);
        stale
    }

    fn build(&mut self, doc: &mut Document, parent: NodeId, sections: &NavSections) {
        let Ok(rail) = doc
            .build_element("nav")
            .dom_id(NAV_RAIL_DOM_ID)
            .child_of(parent)
        else {
            return;
        };
        self.rail = Some(rail);
        for (class, items) in [
            ("rail-top", &sections.top),
            ("rail-middle", &sections.middle),
            ("rail-bottom", &sections.bottom),
        ] {
            let Ok(section) = doc.build_element("div").class(class).child_of(rail) else {
                continue;
            };
            for item in items {
                self.build_button(doc, section, item);
            }
        }
    }

    fn build_button(&mut self, doc: &mut Document, section: NodeId, item: &NavItem) {
        let Ok(button) = doc
            .build_element("button")
            .class("astra-rail-button")
            .attr("data-tab-id", item.id.clone())
            .attr("aria-pressed", "false")
            .child_of(section)
        else {
            return;
        };
        if let Some(icon) = item.icon_markup.as_deref() {
            // Icon markup is opaque host text, not interpreted here.
            let _ = doc
                .build_element("span")
                .class("rail-icon")
                .text(icon)
                .child_of(button);
        }
        if let Some(title) = item.title.as_deref() {
            let _ = doc
                .build_element("span")
                .class("rail-title")
                .text(truncate_display(title, self.options.max_title_width))
                .child_of(button);
        }
        if item.id == self.options.persona_id {
            if let Ok(avatar) = doc
                .build_element("img")
                .class("astra-rail-avatar")
                .child_of(button)
            {
                self.watcher.watch(avatar);
                self.avatar = Some(avatar);
            }
        }
        let listener = doc.add_listener(button, "click");
        self.bindings.push(RailBinding {
            listener,
            button,
            tab_id: item.id.clone(),
        });
    }

    fn apply_active_state(&self, doc: &mut Document, active_tab: &str) {
        for binding in &self.bindings {
            if binding.tab_id == active_tab {
                doc.add_class(binding.button, "is-active");
                doc.set_attr(binding.button, "aria-pressed", "true");
            } else {
                doc.remove_class(binding.button, "is-active");
                doc.set_attr(binding.button, "aria-pressed", "false");
            }
        }
    }

    /// Unwatches the avatar, drops the click bindings, and destroys the
    /// rail subtree. Safe to call repeatedly.
    pub fn teardown(&mut self, doc: &mut Document) {
        if let Some(avatar) = self.avatar.take() {
            self.watcher.unwatch(avatar);
        }
        for binding in self.bindings.drain(..) {
            doc.remove_listener(binding.listener);
        }
        if let Some(rail) = self.rail.take() {
            if doc.exists(rail) {
                let _ = doc.destroy_subtree(rail);
            }
        }
        self.signature = None;
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            let event = event_with_fields(level, "astra::navrail", message, fields);
            let _ = logger.log_event(event);
        }
    }
}

/// Mobile information architecture differs from desktop ordering: home and
/// chat leave their original positions and land in the middle section right
/// after the last present anchor item, home first, falling back to the front
/// of the middle section when no anchor is present.
fn normalize_sections(sections: &NavSections, options: &NavRailOptions) -> NavSections {
    let relocated = [options.home_id.as_str(), options.chat_id.as_str()];
    let strip = |items: &[NavItem]| -> Vec<NavItem> {
        items
            .iter()
            .filter(|item| !relocated.contains(&item.id.as_str()))
            .cloned()
            .collect()
    };
    let find = |id: &str| -> Option<NavItem> {
        [&sections.top, &sections.middle, &sections.bottom]
            .into_iter()
            .flatten()
            .find(|item| item.id == id)
            .cloned()
    };

    let mut middle = strip(&sections.middle);
    let insert_at = middle
        .iter()
        .rposition(|item| options.anchors.contains(&item.id))
        .map(|index| index + 1)
        .unwrap_or(0);
    let mut offset = 0;
    for id in [&options.home_id, &options.chat_id] {
        if let Some(item) = find(id) {
            middle.insert(insert_at + offset, item);
            offset += 1;
        }
    }

    NavSections {
        top: strip(&sections.top),
        middle,
        bottom: strip(&sections.bottom),
    }
}

fn section_signature(sections: &NavSections) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for items in [&sections.top, &sections.middle, &sections.bottom] {
        for item in items {
            hasher.update(item.id.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update(b"\x1f");
    }
    hasher.finalize()
}
