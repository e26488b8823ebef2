//! Headless orchestration engine for a two-column responsive app shell.
//!
//! The crate keeps one retained element tree (`dom::Document`) and two
//! cooperating subsystems on top of it: a slot registry that mounts
//! mutually-exclusive views into host elements, and a responsive runtime
//! that reparents the sidebar/content columns into a mobile overlay when
//! the viewport crosses the breakpoint and restores them exactly on the
//! way back.

pub mod dom;
pub mod error;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod navrail;
pub mod runtime;
pub mod slots;
pub mod stores;
pub mod width;

pub use dom::{
    Delivery, DispatchRecord, Display, Document, ElementBuilder, ListenerId, NodeId,
    SharedDocument, SnapshotSettings, SnapshotWriter, shared_document,
};
pub use error::{ShellError, ShellResult};
pub use layout::{
    BODY_MAIN_VISIBLE_CLASS, BODY_MOBILE_CLASS, LayoutState, ShellColumns, disable_column,
    enable_column, release_focus_within,
};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{MetricSnapshot, ShellMetrics};
pub use navrail::{
    AvatarWatcher, NAV_RAIL_DOM_ID, NavRailOptions, NavRailProjector, NullAvatarWatcher,
    RailBinding,
};
pub use runtime::audit::{
    NullShellAudit, ShellAudit, ShellAuditEvent, ShellAuditEventBuilder, ShellAuditStage,
};
pub use runtime::driver::{CliDriver, CliDriverError, DriverResult};
pub use runtime::hosts::{MAIN_HOST_DOM_ID, OVERLAY_DOM_ID, OverlayHosts, SIDEBAR_HOST_DOM_ID};
pub use runtime::transition::{ShellEffect, ShellInput, ShellState, transition};
pub use runtime::{
    CLOSE_BUTTON_DOM_ID, DESKTOP_NAV_ANCHOR, DESKTOP_NAV_RESTORED_EVENT, ENTITY_OPEN_EVENT,
    ShellAnchors, ShellConfig, ShellEvent, ShellRuntime, ShellSeams, ViewportClass,
    ViewportWatcher,
};
pub use slots::{
    Cleanup, RenderResult, SlotContext, SlotRegistry, ViewHandle, ViewSpec,
};
pub use stores::{
    EntityOpenDetail, HomeRoute, HomeRouteStore, NavItem, NavSections, NavSnapshot, NavStore,
    RouteView, Store, Subscription,
};
pub use width::display_width;
