use crate::dom::{Document, NodeId};

use super::focus::release_focus_within;

/// Body class signalling the mobile presentation.
pub const BODY_MOBILE_CLASS: &str = "astra-mobile-layout";
/// Body class signalling that the main pane is the visible mobile pane.
pub const BODY_MAIN_VISIBLE_CLASS: &str = "astra-main-visible";

/// The two columns the shell shuttles between desktop and mobile hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellColumns {
    pub sidebar: NodeId,
    pub content: NodeId,
}

/// Per-shell presentation flags mirrored onto body classes.
///
/// Mutated only by the apply/show/hide/reset routines below; the runtime's
/// state enum stays the source of truth for transitions.
#[derive(Debug, Default)]
pub struct LayoutState {
    layout_active: bool,
    main_visible: bool,
}

impl LayoutState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout_active(&self) -> bool {
        self.layout_active
    }

    pub fn main_visible(&self) -> bool {
        self.main_visible
    }

    pub fn apply_mobile_layout(&mut self, doc: &mut Document) {
        let body = doc.body();
        doc.add_class(body, BODY_MOBILE_CLASS);
        self.layout_active = true;
    }

    pub fn apply_desktop_layout(&mut self, doc: &mut Document) {
        let body = doc.body();
        doc.remove_class(body, BODY_MOBILE_CLASS);
        doc.remove_class(body, BODY_MAIN_VISIBLE_CLASS);
        self.layout_active = false;
        self.main_visible = false;
    }

    /// Reveals the content column and hides the sidebar. Only effective
    /// while the mobile layout is active; returns whether a focus release
    /// happened, `None` when ignored.
    pub fn show_main_area(&mut self, doc: &mut Document, columns: ShellColumns) -> Option<bool> {
        if !self.layout_active {
            return None;
        }
        self.main_visible = true;
        let body = doc.body();
        doc.add_class(body, BODY_MAIN_VISIBLE_CLASS);
        enable_column(doc, columns.content);
        Some(disable_column(doc, columns.sidebar))
    }

    /// Symmetric to [`Self::show_main_area`]: sidebar back in front.
    pub fn hide_main_area(&mut self, doc: &mut Document, columns: ShellColumns) -> Option<bool> {
        if !self.layout_active {
            return None;
        }
        self.main_visible = false;
        let body = doc.body();
        doc.remove_class(body, BODY_MAIN_VISIBLE_CLASS);
        enable_column(doc, columns.sidebar);
        Some(disable_column(doc, columns.content))
    }

    /// Clears accessibility attributes on both columns unconditionally.
    /// Used when leaving mobile mode and during teardown, without checking
    /// whether mobile is active.
    pub fn reset_main_area(&mut self, doc: &mut Document, columns: ShellColumns) {
        enable_column(doc, columns.sidebar);
        enable_column(doc, columns.content);
        let body = doc.body();
        doc.remove_class(body, BODY_MAIN_VISIBLE_CLASS);
        self.main_visible = false;
    }

    pub fn reset_flags(&mut self) {
        self.layout_active = false;
        self.main_visible = false;
    }
}

/// Makes a column reachable again for assistive technology.
pub fn enable_column(doc: &mut Document, column: NodeId) {
    doc.remove_attr(column, "aria-hidden");
    doc.remove_attr(column, "inert");
}

/// Hides a column from assistive technology, releasing any focus inside or
/// logically linked to it first so focus never sits in a hidden subtree.
/// Returns whether a release happened.
pub fn disable_column(doc: &mut Document, column: NodeId) -> bool {
    let released = release_focus_within(doc, column);
    doc.set_attr(column, "aria-hidden", "true");
    doc.set_attr(column, "inert", "");
    released
}
