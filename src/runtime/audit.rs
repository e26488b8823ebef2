//! Shell lifecycle audit hooks.
//!
//! Lightweight instrumentation so hosts can observe the major transitions of
//! `ShellRuntime`. Records capture a stage identifier plus structured
//! metadata so downstream code can log, buffer, or visualize the shell's
//! progression without contorting the event loop.

use std::time::SystemTime;

use serde_json::Value;

/// Distinct lifecycle checkpoints emitted by `ShellRuntime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellAuditStage {
    /// A new shell instance was constructed.
    ShellConstructed,
    /// `initialize_layout` classified the startup width.
    LayoutInitialized,
    /// The mobile overlay finished mounting.
    MobileMounted,
    /// Desktop containment was restored.
    DesktopRestored,
    /// The desktop nav rail is back at its original position. Accompanies
    /// the `astra:desktop-nav-restored` document event.
    DesktopNavRestored,
    /// The main pane became the visible mobile pane.
    MainShown,
    /// The sidebar became the visible mobile pane.
    MainHidden,
    /// The mobile rail was (re)projected.
    RailProjected,
    /// A viewport observation crossed the breakpoint.
    ViewportObserved,
    /// Teardown finished; the shell is inert.
    TeardownCompleted,
}

/// Structured audit entry.
#[derive(Debug, Clone)]
pub struct ShellAuditEvent {
    pub timestamp: SystemTime,
    pub stage: ShellAuditStage,
    pub details: Vec<(String, Value)>,
}

impl ShellAuditEvent {
    fn new(stage: ShellAuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }
}

/// Builder helper to append fields ergonomically.
pub struct ShellAuditEventBuilder {
    event: ShellAuditEvent,
}

impl ShellAuditEventBuilder {
    pub fn new(stage: ShellAuditStage) -> Self {
        Self {
            event: ShellAuditEvent::new(stage),
        }
    }

    pub fn detail(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.event.details.push((key.into(), value));
        self
    }

    pub fn finish(self) -> ShellAuditEvent {
        self.event
    }
}

/// Trait implemented by any audit sink.
pub trait ShellAudit: Send + Sync {
    fn record(&self, event: ShellAuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullShellAudit;

impl ShellAudit for NullShellAudit {
    fn record(&self, _event: ShellAuditEvent) {}
}
