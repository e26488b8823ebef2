//! Mobile navigation rail projection.
//!
//! Downstream code imports rail types from here while the implementation
//! details live in the private `core` module.

mod core;

pub use core::{
    AvatarWatcher, NAV_RAIL_DOM_ID, NavRailOptions, NavRailProjector, NullAvatarWatcher,
    RailBinding,
};
