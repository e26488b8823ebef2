//! Versioned observable stores shared between the shell and its host.
//!
//! The host application owns the navigation and home-route models; the shell
//! only reads them. Instead of ambient callback buses, every observer holds a
//! [`Subscription`] and the runtime pumps subscriptions after each handled
//! event. On a single thread that gives the same observable ordering as
//! subscription callbacks, and dropping the subscription is unsubscription.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

struct StoreInner<T> {
    value: T,
    version: u64,
}

/// A shared value with a monotonically increasing version.
pub struct Store<T: Clone> {
    inner: Arc<RwLock<StoreInner<T>>>,
}

impl<T: Clone> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner { value, version: 1 })),
        }
    }

    pub fn snapshot(&self) -> T {
        self.read(|inner| inner.value.clone())
    }

    pub fn version(&self) -> u64 {
        self.read(|inner| inner.version)
    }

    pub fn set(&self, value: T) {
        self.write(|inner| {
            inner.value = value;
            inner.version += 1;
        });
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.write(|inner| {
            f(&mut inner.value);
            inner.version += 1;
        });
    }

    /// A fresh subscription observes the current value on its first poll.
    pub fn subscribe(&self) -> Subscription {
        Subscription { last_seen: 0 }
    }

    /// Returns the current snapshot when the version advanced past what the
    /// subscription last saw, `None` otherwise.
    pub fn poll(&self, subscription: &mut Subscription) -> Option<T> {
        self.read(|inner| {
            if inner.version > subscription.last_seen {
                subscription.last_seen = inner.version;
                Some(inner.value.clone())
            } else {
                None
            }
        })
    }

    fn read<R>(&self, f: impl FnOnce(&StoreInner<T>) -> R) -> R {
        let guard = self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut StoreInner<T>)) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard);
    }
}

impl<T: Clone + Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Poll cursor handed out by [`Store::subscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    last_seen: u64,
}

/// One navigation entry as published by the host's navigation model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_markup: Option<String>,
}

impl NavItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn titled(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            icon_markup: None,
        }
    }
}

/// The three ordered rail sections of the navigation model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavSections {
    #[serde(default)]
    pub top: Vec<NavItem>,
    #[serde(default)]
    pub middle: Vec<NavItem>,
    #[serde(default)]
    pub bottom: Vec<NavItem>,
}

/// Read-only view of the host's navigation state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavSnapshot {
    pub active_tab: String,
    #[serde(default)]
    pub sections: NavSections,
}

/// Which kind of view the home route currently shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteView {
    Entity,
    #[default]
    Other,
}

/// Externally owned navigation state naming the entity the main content
/// area is displaying. The shell reads it only to decide visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeRoute {
    pub view: RouteView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl HomeRoute {
    pub fn entity(entity_type: impl Into<String>, entity_key: impl Into<String>) -> Self {
        Self {
            view: RouteView::Entity,
            entity_type: Some(entity_type.into()),
            entity_key: Some(entity_key.into()),
            ..Self::default()
        }
    }

    pub fn is_entity(&self) -> bool {
        self.view == RouteView::Entity
    }
}

/// Payload of the `astra:home-route:entity-open` document event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityOpenDetail {
    pub tab_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

pub type NavStore = Store<NavSnapshot>;
pub type HomeRouteStore = Store<HomeRoute>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_reports_only_new_versions() {
        let store = Store::new(1u32);
        let mut sub = store.subscribe();
        assert_eq!(store.poll(&mut sub), Some(1));
        assert_eq!(store.poll(&mut sub), None);

        store.set(2);
        store.set(3);
        assert_eq!(store.poll(&mut sub), Some(3));
        assert_eq!(store.poll(&mut sub), None);
    }

    #[test]
    fn update_bumps_version() {
        let store = NavStore::default();
        let before = store.version();
        store.update(|snapshot| snapshot.active_tab = "chat".to_string());
        assert!(store.version() > before);
        assert_eq!(store.snapshot().active_tab, "chat");
    }

    #[test]
    fn independent_subscriptions_track_separately() {
        let store = Store::new("a".to_string());
        let mut first = store.subscribe();
        let mut second = store.subscribe();
        assert!(store.poll(&mut first).is_some());

        store.set("b".to_string());
        assert_eq!(store.poll(&mut first), Some("b".to_string()));
        // The second subscription never polled, so it sees the latest value.
        assert_eq!(store.poll(&mut second), Some("b".to_string()));
    }

    #[test]
    fn home_route_round_trips_through_json() {
        let route = HomeRoute::entity("character", "aria-7");
        let json = serde_json::to_string(&route).unwrap();
        let back: HomeRoute = serde_json::from_str(&json).unwrap();
        assert!(back.is_entity());
        assert_eq!(back.entity_key.as_deref(), Some("aria-7"));
    }
}
