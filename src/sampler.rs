use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::warn;

use crate::alert::{AlertHook, AlertSink};
use crate::config::SamplerConfig;
use crate::container::{CounterStore, SnapshotContainer};
use crate::header::SnapshotCause;
use crate::jvm_info::JvmInfo;
use crate::pool::SnapshotPool;
use crate::ranking::HeapDelta;
use crate::registry::{ClassHandle, ClassRegistry};
use crate::writer::{ExportError, SnapshotSink};

/// Entry point tying the registry, the container pool, and the alert hook
/// into one sampling pipeline.
///
/// The host glue registers classes as the runtime loads them, calls
/// [`HeapSampler::record_object`] for every object the heap walker visits,
/// and brackets each walk with [`HeapSampler::begin_round`] /
/// [`HeapSampler::commit_round`].
#[derive(Debug)]
pub struct HeapSampler {
  config: SamplerConfig,
  registry: Arc<ClassRegistry>,
  pool: SnapshotPool,
  alert: Mutex<AlertHook>,
  skipped: AtomicU64,
}

impl HeapSampler {
  #[must_use]
  pub fn new(config: SamplerConfig) -> Self {
    Self {
      registry: Arc::new(ClassRegistry::new()),
      pool: SnapshotPool::new(&config),
      alert: Mutex::new(AlertHook::new(&config)),
      config,
      skipped: AtomicU64::new(0),
    }
  }

  #[must_use]
  pub fn config(&self) -> &SamplerConfig {
    &self.config
  }

  #[must_use]
  pub fn registry(&self) -> &ClassRegistry {
    &self.registry
  }

  #[must_use]
  pub fn pool(&self) -> &SnapshotPool {
    &self.pool
  }

  /// Objects skipped so far in the current round.
  #[must_use]
  pub fn skipped_objects(&self) -> u64 {
    self.skipped.load(Ordering::Relaxed)
  }

  /// Start a sampling round: take a cleared container from the pool, stamp
  /// the snapshot time, and re-arm the alert deduplication.
  #[must_use]
  pub fn begin_round(&self) -> Box<SnapshotContainer> {
    let container = self.pool.get_instance();
    container.mark_active();
    container.set_snapshot_time(unix_time_secs());
    self.alert.lock().begin_round();
    container
  }

  /// Attribute one visited object.
  ///
  /// A parentless visit counts the object under its own class; a visit with
  /// a parent (when reference-tree collection is enabled) counts it under
  /// the parent-class to child-class edge instead, so multiply referenced
  /// objects never inflate their class total. Unknown handles are a benign
  /// race with class loading: the object is skipped and only the skip
  /// metric moves.
  pub fn record_object<C: CounterStore>(
    &self,
    store: &C,
    class_handle: ClassHandle,
    parent_handle: Option<ClassHandle>,
    size: i64,
  ) {
    match parent_handle {
      Some(parent) if self.config.collect_ref_tree => {
        self.record_reference(store, parent, class_handle, size);
      }
      _ => self.record_instance(store, class_handle, size),
    }
  }

  /// Finish a round: fill the header, rank, evaluate alerts, hand the
  /// snapshot to the sink, recycle the container, and reap unloaded
  /// classes.
  ///
  /// The container is released and tombstones are reaped even when the
  /// sink fails; the error is returned afterwards.
  ///
  /// # Errors
  ///
  /// Returns the sink's `ExportError` if writing the snapshot failed.
  pub fn commit_round(
    &self,
    container: Box<SnapshotContainer>,
    cause: SnapshotCause,
    info: &JvmInfo,
    sink: &mut dyn SnapshotSink,
    alerts: &mut dyn AlertSink,
  ) -> Result<Vec<HeapDelta>, ExportError> {
    container.set_snapshot_cause(cause);
    container.set_jvm_info(info);
    container.set_total_size(info.total_heap_size);
    container.log_gc_summary(info.has_metaspace);

    let skipped = self.skipped.swap(0, Ordering::Relaxed);
    if skipped > 0 {
      warn!(skipped, "objects were skipped during the sampling round");
    }

    let ranking = self.registry.after_take_snapshot(&container);
    let header = container.header();
    self.alert.lock().evaluate(&header, alerts);

    let written = sink.write_snapshot(&header, &ranking);

    self.pool.release_instance(container);
    self.registry.commit_class_change();

    written.map(|()| ranking)
  }

  fn record_instance<C: CounterStore>(&self, store: &C, handle: ClassHandle, size: i64) {
    let Some(record) = self.registry.find(handle) else {
      self.note_skip();
      return;
    };

    let counter = match store.find_class(&record) {
      Some(counter) => counter,
      None => store.push_new_class(record),
    };
    counter.counter().inc(size);
  }

  fn record_reference<C: CounterStore>(
    &self,
    store: &C,
    parent_handle: ClassHandle,
    child_handle: ClassHandle,
    size: i64,
  ) {
    let Some(parent_record) = self.registry.find(parent_handle) else {
      self.note_skip();
      return;
    };

    let parent = match store.find_class(&parent_record) {
      Some(counter) => counter,
      None => store.push_new_class(parent_record),
    };

    let child = match store.find_child_class(&parent, child_handle) {
      Some(child) => child,
      None => {
        let Some(child_record) = self.registry.find(child_handle) else {
          self.note_skip();
          return;
        };
        store.push_new_child_class(&parent, child_record)
      }
    };
    child.counter().inc(size);
  }

  fn note_skip(&self) {
    self.skipped.fetch_add(1, Ordering::Relaxed);
  }
}

fn unix_time_secs() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::alert::{AlertEvent, AlertKind};
  use crate::counter::{ChildCounter, ClassCounter};
  use crate::registry::{ClassMeta, ClassRecord};
  use crate::writer::BinarySnapshotWriter;
  use std::sync::atomic::AtomicUsize;

  #[derive(Default)]
  struct CollectingAlerts {
    events: Vec<AlertEvent>,
  }

  impl AlertSink for CollectingAlerts {
    fn raise(&mut self, event: &AlertEvent) {
      self.events.push(*event);
    }
  }

  /// Store double that counts how the sampler exercises the capability set.
  struct ProbeStore {
    inner: SnapshotContainer,
    class_pushes: AtomicUsize,
    child_pushes: AtomicUsize,
  }

  impl ProbeStore {
    fn new() -> Self {
      Self {
        inner: SnapshotContainer::new(true),
        class_pushes: AtomicUsize::new(0),
        child_pushes: AtomicUsize::new(0),
      }
    }
  }

  impl CounterStore for ProbeStore {
    fn find_class(&self, record: &ClassRecord) -> Option<Arc<ClassCounter>> {
      self.inner.find_class(record)
    }

    fn push_new_class(&self, record: Arc<ClassRecord>) -> Arc<ClassCounter> {
      self.class_pushes.fetch_add(1, Ordering::Relaxed);
      self.inner.push_new_class(record)
    }

    fn find_child_class(
      &self,
      parent: &ClassCounter,
      handle: ClassHandle,
    ) -> Option<Arc<ChildCounter>> {
      self.inner.find_child_class(parent, handle)
    }

    fn push_new_child_class(
      &self,
      parent: &ClassCounter,
      record: Arc<ClassRecord>,
    ) -> Arc<ChildCounter> {
      self.child_pushes.fetch_add(1, Ordering::Relaxed);
      self.inner.push_new_child_class(parent, record)
    }

    fn clear(&self, force: bool) {
      self.inner.clear(force);
    }
  }

  fn commit(
    sampler: &HeapSampler,
    container: Box<SnapshotContainer>,
    info: &JvmInfo,
  ) -> Vec<HeapDelta> {
    let mut sink = BinarySnapshotWriter::new(Vec::new());
    let mut alerts = CollectingAlerts::default();
    sampler
      .commit_round(container, SnapshotCause::Periodic, info, &mut sink, &mut alerts)
      .expect("commit failed")
  }

  #[test]
  fn attributes_objects_and_ranks_with_delta() {
    let sampler = HeapSampler::new(SamplerConfig::default());
    let record = sampler
      .registry()
      .push_new_class(0x100, ClassMeta::named("A"));
    let info = JvmInfo::default();

    let container = sampler.begin_round();
    for _ in 0..3 {
      sampler.record_object(container.as_ref(), 0x100, None, 16);
    }
    let ranking = commit(&sampler, container, &info);
    assert_eq!(
      ranking,
      vec![HeapDelta { tag: record.tag(), usage: 48, delta: 48 }]
    );

    // The same three objects again: usage repeats, the delta vanishes.
    let container = sampler.begin_round();
    for _ in 0..3 {
      sampler.record_object(container.as_ref(), 0x100, None, 16);
    }
    let ranking = commit(&sampler, container, &info);
    assert_eq!(
      ranking,
      vec![HeapDelta { tag: record.tag(), usage: 48, delta: 0 }]
    );
  }

  #[test]
  fn equal_usage_ranks_by_tag() {
    let sampler = HeapSampler::new(SamplerConfig::default());
    let first = sampler.registry().push_new_class(0x1, ClassMeta::named("A"));
    let second = sampler.registry().push_new_class(0x2, ClassMeta::named("B"));

    let container = sampler.begin_round();
    sampler.record_object(container.as_ref(), 0x2, None, 100);
    sampler.record_object(container.as_ref(), 0x1, None, 100);
    let ranking = commit(&sampler, container, &JvmInfo::default());

    assert_eq!(
      ranking,
      vec![
        HeapDelta { tag: first.tag(), usage: 100, delta: 100 },
        HeapDelta { tag: second.tag(), usage: 100, delta: 100 },
      ]
    );
  }

  #[test]
  fn reference_visits_count_the_edge_not_the_class() {
    let sampler = HeapSampler::new(SamplerConfig::default());
    sampler.registry().push_new_class(0x1, ClassMeta::named("P"));
    sampler.registry().push_new_class(0x2, ClassMeta::named("C"));

    let container = sampler.begin_round();
    sampler.record_object(container.as_ref(), 0x1, None, 32);
    sampler.record_object(container.as_ref(), 0x2, Some(0x1), 24);
    sampler.record_object(container.as_ref(), 0x2, Some(0x1), 24);

    let parent_record = sampler.registry().find(0x1).unwrap();
    let parent = container.find_class(&parent_record).expect("parent counter");
    assert_eq!(parent.counter().count(), 1);
    assert_eq!(parent.counter().total_size(), 32);

    let edge = container
      .find_child_class(&parent, 0x2)
      .expect("edge counter");
    assert_eq!(edge.counter().count(), 2);
    assert_eq!(edge.counter().total_size(), 48);

    // The child class got no parentless visit, so it has no entry of its
    // own in the counter map.
    let child_record = sampler.registry().find(0x2).unwrap();
    assert!(container.find_class(&child_record).is_none());
  }

  #[test]
  fn parent_visits_fall_back_to_plain_attribution_without_ref_tree() {
    let sampler = HeapSampler::new(SamplerConfig::default().with_ref_tree(false));
    let record = sampler.registry().push_new_class(0x2, ClassMeta::named("C"));
    sampler.registry().push_new_class(0x1, ClassMeta::named("P"));

    let container = sampler.begin_round();
    sampler.record_object(container.as_ref(), 0x2, Some(0x1), 24);

    let counter = container.find_class(&record).expect("class counter");
    assert_eq!(counter.counter().count(), 1);
  }

  #[test]
  fn unknown_handles_are_skipped_silently() {
    let sampler = HeapSampler::new(SamplerConfig::default());
    let container = sampler.begin_round();

    sampler.record_object(container.as_ref(), 0xdead, None, 8);
    sampler.record_object(container.as_ref(), 0xdead, Some(0xbeef), 8);

    assert_eq!(sampler.skipped_objects(), 2);
    assert!(container.is_empty());

    let ranking = commit(&sampler, container, &JvmInfo::default());
    assert!(ranking.is_empty());
    // The metric resets with the round.
    assert_eq!(sampler.skipped_objects(), 0);
  }

  #[test]
  fn sampler_reuses_established_counters() {
    let sampler = HeapSampler::new(SamplerConfig::default());
    sampler.registry().push_new_class(0x1, ClassMeta::named("P"));
    sampler.registry().push_new_class(0x2, ClassMeta::named("C"));
    let store = ProbeStore::new();

    for _ in 0..5 {
      sampler.record_object(&store, 0x1, None, 16);
      sampler.record_object(&store, 0x2, Some(0x1), 8);
    }

    assert_eq!(store.class_pushes.load(Ordering::Relaxed), 1);
    assert_eq!(store.child_pushes.load(Ordering::Relaxed), 1);
  }

  #[test]
  fn unloaded_class_survives_until_ranking_is_consumed() {
    let sampler = HeapSampler::new(SamplerConfig::default());
    let record = sampler.registry().push_new_class(0x7, ClassMeta::named("G"));
    let info = JvmInfo::default();

    let container = sampler.begin_round();
    sampler.record_object(container.as_ref(), 0x7, None, 40);
    let ranking = commit(&sampler, container, &info);
    assert_eq!(ranking[0].usage, 40);

    sampler.registry().pop_class(&record);

    // The record stays findable while the next round is in flight.
    let container = sampler.begin_round();
    assert!(sampler.registry().find(0x7).is_some());
    let _ = commit(&sampler, container, &info);

    // The commit consumed the ranking, so the tombstone has been reaped.
    assert!(sampler.registry().find(0x7).is_none());
  }

  #[test]
  fn commit_fires_alerts_from_thresholds() {
    let config = SamplerConfig::default()
      .with_heap_alert_threshold(100)
      .with_metaspace_alert_threshold(10);
    let sampler = HeapSampler::new(config);
    let info = JvmInfo {
      new_area_size: 80,
      old_area_size: 40,
      metaspace_usage: 5,
      ..JvmInfo::default()
    };

    let container = sampler.begin_round();
    let mut sink = BinarySnapshotWriter::new(Vec::new());
    let mut alerts = CollectingAlerts::default();
    sampler
      .commit_round(container, SnapshotCause::Periodic, &info, &mut sink, &mut alerts)
      .unwrap();

    assert_eq!(alerts.events.len(), 1);
    assert_eq!(alerts.events[0].kind, AlertKind::JavaHeap);
    assert_eq!(alerts.events[0].usage, 120);
  }

  #[test]
  fn commit_recycles_the_container() {
    let sampler = HeapSampler::new(SamplerConfig::default());
    let container = sampler.begin_round();
    let _ = commit(&sampler, container, &JvmInfo::default());
    assert_eq!(sampler.pool().stocked(), 1);
  }
}
