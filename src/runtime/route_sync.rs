//! Home-route visibility sync.
//!
//! Deep links and quick-list navigation update the home route without going
//! through a rail tab click. While mobile, an entity route landing while the
//! entity-browsing tab is active must still reveal the main pane; this
//! companion watches the route store and asks the runtime for `ShowMain`
//! when that situation arises.

use crate::stores::{HomeRouteStore, Subscription};

pub struct HomeRouteVisibilitySync {
    store: HomeRouteStore,
    subscription: Subscription,
    home_tab: String,
}

impl HomeRouteVisibilitySync {
    pub fn new(store: HomeRouteStore, home_tab: impl Into<String>) -> Self {
        let subscription = store.subscribe();
        Self {
            store,
            subscription,
            home_tab: home_tab.into(),
        }
    }

    /// Polls the route store once. Returns `true` when the runtime should
    /// force the main pane visible.
    pub fn pump(&mut self, is_mobile: bool, active_tab: &str) -> bool {
        let Some(route) = self.store.poll(&mut self.subscription) else {
            return false;
        };
        route.is_entity() && is_mobile && active_tab == self.home_tab
    }
}
