use tracing::warn;

use crate::config::SamplerConfig;
use crate::header::SnapshotHeader;

/// Which memory area crossed its threshold.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AlertKind {
  JavaHeap,
  Metaspace,
}

/// A threshold crossing observed after a snapshot committed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AlertEvent {
  pub kind: AlertKind,
  /// Bytes in use when the alert fired.
  pub usage: i64,
  /// The configured threshold that was exceeded.
  pub threshold: i64,
}

/// Consumer of alert events (SNMP trap sender, log, test probe).
pub trait AlertSink {
  fn raise(&mut self, event: &AlertEvent);
}

/// Default sink that logs alerts.
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
  fn raise(&mut self, event: &AlertEvent) {
    let area = match event.kind {
      AlertKind::JavaHeap => "Java heap",
      AlertKind::Metaspace => "Metaspace",
    };
    warn!(
      area,
      usage_bytes = event.usage,
      threshold_bytes = event.threshold,
      "memory usage exceeded threshold"
    );
  }
}

/// Evaluates post-snapshot totals against the configured thresholds.
///
/// Each alert kind fires at most once per sampling round; `begin_round`
/// re-arms both.
#[derive(Debug)]
pub struct AlertHook {
  heap_threshold: i64,
  metaspace_threshold: i64,
  heap_alerted: bool,
  metaspace_alerted: bool,
}

impl AlertHook {
  #[must_use]
  pub fn new(config: &SamplerConfig) -> Self {
    Self {
      heap_threshold: config.heap_alert_threshold,
      metaspace_threshold: config.metaspace_alert_threshold,
      heap_alerted: false,
      metaspace_alerted: false,
    }
  }

  /// Re-arm the per-round deduplication.
  pub fn begin_round(&mut self) {
    self.heap_alerted = false;
    self.metaspace_alerted = false;
  }

  /// Compare the committed header against the thresholds and emit at most
  /// one event per kind. A threshold of zero disables its check.
  pub fn evaluate(&mut self, header: &SnapshotHeader, sink: &mut dyn AlertSink) {
    let heap_usage = header.new_area_size + header.old_area_size;
    if self.heap_threshold > 0 && !self.heap_alerted && heap_usage > self.heap_threshold {
      self.heap_alerted = true;
      sink.raise(&AlertEvent {
        kind: AlertKind::JavaHeap,
        usage: heap_usage,
        threshold: self.heap_threshold,
      });
    }

    if self.metaspace_threshold > 0
      && !self.metaspace_alerted
      && header.metaspace_usage > self.metaspace_threshold
    {
      self.metaspace_alerted = true;
      sink.raise(&AlertEvent {
        kind: AlertKind::Metaspace,
        usage: header.metaspace_usage,
        threshold: self.metaspace_threshold,
      });
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Default)]
  struct CollectingSink {
    events: Vec<AlertEvent>,
  }

  impl AlertSink for CollectingSink {
    fn raise(&mut self, event: &AlertEvent) {
      self.events.push(*event);
    }
  }

  fn header(new_area: i64, old_area: i64, metaspace: i64) -> SnapshotHeader {
    let mut header = SnapshotHeader::new(false);
    header.new_area_size = new_area;
    header.old_area_size = old_area;
    header.metaspace_usage = metaspace;
    header
  }

  #[test]
  fn fires_heap_alert_above_threshold() {
    let config = SamplerConfig::default().with_heap_alert_threshold(1000);
    let mut hook = AlertHook::new(&config);
    let mut sink = CollectingSink::default();

    hook.evaluate(&header(600, 500, 0), &mut sink);

    assert_eq!(sink.events.len(), 1);
    assert_eq!(sink.events[0].kind, AlertKind::JavaHeap);
    assert_eq!(sink.events[0].usage, 1100);
    assert_eq!(sink.events[0].threshold, 1000);
  }

  #[test]
  fn usage_at_threshold_does_not_fire() {
    let config = SamplerConfig::default().with_heap_alert_threshold(1000);
    let mut hook = AlertHook::new(&config);
    let mut sink = CollectingSink::default();

    hook.evaluate(&header(500, 500, 0), &mut sink);
    assert!(sink.events.is_empty());
  }

  #[test]
  fn zero_threshold_disables_check() {
    let mut hook = AlertHook::new(&SamplerConfig::default());
    let mut sink = CollectingSink::default();

    hook.evaluate(&header(i64::MAX / 2, 0, i64::MAX / 2), &mut sink);
    assert!(sink.events.is_empty());
  }

  #[test]
  fn both_alerts_can_fire_in_one_round() {
    let config = SamplerConfig::default()
      .with_heap_alert_threshold(100)
      .with_metaspace_alert_threshold(50);
    let mut hook = AlertHook::new(&config);
    let mut sink = CollectingSink::default();

    hook.evaluate(&header(200, 0, 80), &mut sink);

    let kinds: Vec<_> = sink.events.iter().map(|event| event.kind).collect();
    assert_eq!(kinds, vec![AlertKind::JavaHeap, AlertKind::Metaspace]);
  }

  #[test]
  fn deduplicates_within_a_round_and_rearms_across_rounds() {
    let config = SamplerConfig::default().with_heap_alert_threshold(100);
    let mut hook = AlertHook::new(&config);
    let mut sink = CollectingSink::default();

    let high = header(200, 0, 0);
    hook.evaluate(&high, &mut sink);
    hook.evaluate(&high, &mut sink);
    assert_eq!(sink.events.len(), 1);

    hook.begin_round();
    hook.evaluate(&high, &mut sink);
    assert_eq!(sink.events.len(), 2);
  }
}
