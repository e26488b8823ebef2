//! Overlay host lifecycle.
//!
//! An explicitly constructed store object with ensure/conceal/destroy
//! lifecycle, owned by the runtime and passed by reference, rather than an
//! ambient "active portal host" global. Hosts are created once on the first
//! mobile mount and toggled hidden on desktop, so they survive repeated
//! rotation cycles.

use crate::dom::{Display, Document, NodeId};
use crate::error::ShellResult;

pub const OVERLAY_DOM_ID: &str = "astra-mobile-overlay";
pub const SIDEBAR_HOST_DOM_ID: &str = "astra-mobile-sidebar-host";
pub const MAIN_HOST_DOM_ID: &str = "astra-mobile-main-host";

/// The dedicated mobile containment: one overlay under body with a sidebar
/// host and a main host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayHosts {
    pub overlay: NodeId,
    pub sidebar_host: NodeId,
    pub main_host: NodeId,
}

impl OverlayHosts {
    /// Creates the overlay scaffold under body, hidden until revealed.
    pub fn create(doc: &mut Document) -> ShellResult<Self> {
        let body = doc.body();
        let overlay = doc
            .build_element("div")
            .dom_id(OVERLAY_DOM_ID)
            .display(Display::None)
            .child_of(body)?;
        let sidebar_host = doc
            .build_element("div")
            .dom_id(SIDEBAR_HOST_DOM_ID)
            .child_of(overlay)?;
        let main_host = doc
            .build_element("div")
            .dom_id(MAIN_HOST_DOM_ID)
            .child_of(overlay)?;
        Ok(Self {
            overlay,
            sidebar_host,
            main_host,
        })
    }

    /// Returns `existing` when its nodes are still alive, otherwise builds
    /// a fresh scaffold.
    pub fn ensure(doc: &mut Document, existing: Option<Self>) -> ShellResult<Self> {
        if let Some(hosts) = existing {
            if doc.exists(hosts.overlay) {
                return Ok(hosts);
            }
        }
        Self::create(doc)
    }

    pub fn reveal(&self, doc: &mut Document) {
        doc.set_display(self.overlay, Display::Default);
    }

    pub fn conceal(&self, doc: &mut Document) {
        doc.set_display(self.overlay, Display::None);
    }

    /// Full teardown; only used when the shell itself goes away.
    pub fn destroy(self, doc: &mut Document) {
        if doc.exists(self.overlay) {
            let _ = doc.destroy_subtree(self.overlay);
        }
    }
}
