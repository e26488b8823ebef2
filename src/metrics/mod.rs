use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct ShellMetrics {
    events: u64,
    mobile_transitions: u64,
    desktop_transitions: u64,
    view_activations: u64,
    rail_projections: u64,
    reparented_nodes: u64,
    focus_releases: u64,
    main_shown: u64,
    main_hidden: u64,
}

impl ShellMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&mut self) {
        self.events = self.events.saturating_add(1);
    }

    pub fn record_mobile_transition(&mut self) {
        self.mobile_transitions = self.mobile_transitions.saturating_add(1);
    }

    pub fn record_desktop_transition(&mut self) {
        self.desktop_transitions = self.desktop_transitions.saturating_add(1);
    }

    pub fn record_view_activation(&mut self) {
        self.view_activations = self.view_activations.saturating_add(1);
    }

    pub fn record_rail_projection(&mut self) {
        self.rail_projections = self.rail_projections.saturating_add(1);
    }

    pub fn record_reparented_nodes(&mut self, count: usize) {
        if count > 0 {
            self.reparented_nodes = self.reparented_nodes.saturating_add(count as u64);
        }
    }

    pub fn record_focus_release(&mut self) {
        self.focus_releases = self.focus_releases.saturating_add(1);
    }

    pub fn record_main_shown(&mut self) {
        self.main_shown = self.main_shown.saturating_add(1);
    }

    pub fn record_main_hidden(&mut self) {
        self.main_hidden = self.main_hidden.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            events: self.events,
            mobile_transitions: self.mobile_transitions,
            desktop_transitions: self.desktop_transitions,
            view_activations: self.view_activations,
            rail_projections: self.rail_projections,
            reparented_nodes: self.reparented_nodes,
            focus_releases: self.focus_releases,
            main_shown: self.main_shown,
            main_hidden: self.main_hidden,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub events: u64,
    pub mobile_transitions: u64,
    pub desktop_transitions: u64,
    pub view_activations: u64,
    pub rail_projections: u64,
    pub reparented_nodes: u64,
    pub focus_releases: u64,
    pub main_shown: u64,
    pub main_hidden: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(
            LogLevel::Info,
            target.to_string(),
            "shell_metrics".to_string(),
            self.as_fields(),
        )
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("events".to_string(), json!(self.events));
        map.insert(
            "mobile_transitions".to_string(),
            json!(self.mobile_transitions),
        );
        map.insert(
            "desktop_transitions".to_string(),
            json!(self.desktop_transitions),
        );
        map.insert("view_activations".to_string(), json!(self.view_activations));
        map.insert("rail_projections".to_string(), json!(self.rail_projections));
        map.insert("reparented_nodes".to_string(), json!(self.reparented_nodes));
        map.insert("focus_releases".to_string(), json!(self.focus_releases));
        map.insert("main_shown".to_string(), json!(self.main_shown));
        map.insert("main_hidden".to_string(), json!(self.main_hidden));
        map
    }
}

pub fn snapshot_event(snapshot: &MetricSnapshot, target: &str) -> LogEvent {
    snapshot.to_log_event(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_snapshot() {
        let mut metrics = ShellMetrics::new();
        metrics.record_event();
        metrics.record_event();
        metrics.record_mobile_transition();
        metrics.record_reparented_nodes(2);
        metrics.record_reparented_nodes(0);
        metrics.record_main_shown();

        let snapshot = metrics.snapshot(Duration::from_millis(1500));
        assert_eq!(snapshot.uptime_ms, 1500);
        assert_eq!(snapshot.events, 2);
        assert_eq!(snapshot.mobile_transitions, 1);
        assert_eq!(snapshot.desktop_transitions, 0);
        assert_eq!(snapshot.reparented_nodes, 2);
        assert_eq!(snapshot.main_shown, 1);
    }

    #[test]
    fn snapshot_event_carries_fields() {
        let mut metrics = ShellMetrics::new();
        metrics.record_rail_projection();
        let event = snapshot_event(
            &metrics.snapshot(Duration::from_secs(1)),
            "astra::shell.metrics",
        );
        assert_eq!(event.target, "astra::shell.metrics");
        assert_eq!(event.fields["rail_projections"], json!(1));
        assert_eq!(event.fields["events"], json!(0));
    }
}
