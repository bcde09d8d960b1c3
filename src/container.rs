use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use nohash_hasher::BuildNoHashHasher;
use parking_lot::Mutex;
use tracing::info;

use crate::counter::{ChildCounter, ClassCounter};
use crate::header::{SnapshotCause, SnapshotHeader};
use crate::jvm_info::JvmInfo;
use crate::registry::{ClassHandle, ClassRecord};

/// The accumulation capability set the sampler is polymorphic over.
///
/// [`SnapshotContainer`] is the production implementation; tests substitute
/// doubles to observe the sampler's call pattern.
pub trait CounterStore {
  fn find_class(&self, record: &ClassRecord) -> Option<Arc<ClassCounter>>;
  fn push_new_class(&self, record: Arc<ClassRecord>) -> Arc<ClassCounter>;
  fn find_child_class(
    &self,
    parent: &ClassCounter,
    handle: ClassHandle,
  ) -> Option<Arc<ChildCounter>>;
  fn push_new_child_class(
    &self,
    parent: &ClassCounter,
    record: Arc<ClassRecord>,
  ) -> Arc<ChildCounter>;
  fn clear(&self, force: bool);
}

type CounterMap = DashMap<i64, Arc<ClassCounter>, BuildNoHashHasher<i64>>;

/// Accumulates per-class usage for one snapshot round.
///
/// Hot-path lookups and increments are concurrent; `clear` and the header
/// operations run only while the container is quiescent. Cleared counters
/// keep their map entries and child edge topology so a recycled container
/// resolves repeat classes without reallocating.
#[derive(Debug)]
pub struct SnapshotContainer {
  counters: CounterMap,
  header: Mutex<SnapshotHeader>,
  is_cleared: AtomicBool,
}

impl SnapshotContainer {
  #[must_use]
  pub fn new(collect_ref_tree: bool) -> Self {
    Self {
      counters: CounterMap::with_hasher(BuildNoHashHasher::default()),
      header: Mutex::new(SnapshotHeader::new(collect_ref_tree)),
      is_cleared: AtomicBool::new(true),
    }
  }

  /// Number of classes with a counter in this container.
  #[must_use]
  pub fn len(&self) -> usize {
    self.counters.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.counters.is_empty()
  }

  /// Visit every class counter. Only meaningful after the round has ended;
  /// during sampling the counters are still moving.
  pub fn each_counter(&self, mut f: impl FnMut(&ClassCounter)) {
    for entry in self.counters.iter() {
      f(entry.value());
    }
  }

  /// Copy of the header with `size` reflecting the live entry count.
  #[must_use]
  pub fn header(&self) -> SnapshotHeader {
    let mut header = *self.header.lock();
    header.size = self.counters.len() as i64;
    header
  }

  pub fn set_snapshot_time(&self, epoch_secs: i64) {
    self.header.lock().snapshot_time = epoch_secs;
  }

  pub fn set_snapshot_cause(&self, cause: SnapshotCause) {
    self.header.lock().cause = cause;
  }

  pub fn set_total_size(&self, bytes: i64) {
    self.header.lock().total_heap_size = bytes;
  }

  /// Copy the per-round performance counters into the header.
  ///
  /// The GC cause and work time are only meaningful for GC-triggered
  /// snapshots; other causes store the empty encoding.
  pub fn set_jvm_info(&self, info: &JvmInfo) {
    let mut header = self.header.lock();

    if header.cause == SnapshotCause::GcInvoked {
      header.set_gc_cause(&info.gc_cause);
      header.gc_worktime = info.gc_worktime;
    } else {
      header.clear_gc_cause();
      header.gc_worktime = 0;
    }

    header.fgc_count = info.fgc_count;
    header.ygc_count = info.ygc_count;
    header.new_area_size = info.new_area_size;
    header.old_area_size = info.old_area_size;
    header.metaspace_usage = info.metaspace_usage;
    header.metaspace_capacity = info.metaspace_capacity;
  }

  /// Log the GC statistics carried in the header.
  pub fn log_gc_summary(&self, has_metaspace: bool) {
    let header = self.header.lock();

    info!("GC statistics information:");
    if header.cause == SnapshotCause::GcInvoked {
      info!(
        gc_cause = header.gc_cause_str(),
        worktime_ms = header.gc_worktime,
        "GC cause"
      );
    }
    info!(
      full_gc = header.fgc_count,
      young_gc = header.ygc_count,
      "GC count"
    );
    info!(
      new_bytes = header.new_area_size,
      old_bytes = header.old_area_size,
      total_bytes = header.total_heap_size,
      "area using size"
    );
    let label = if has_metaspace { "Metaspace" } else { "PermGen" };
    info!(
      area = label,
      usage_bytes = header.metaspace_usage,
      capacity_bytes = header.metaspace_capacity,
      "class metadata usage"
    );
  }

  /// Mark the container in use; the next non-forced `clear` will do real
  /// work again.
  pub fn mark_active(&self) {
    self.is_cleared.store(false, Ordering::Release);
  }

  #[must_use]
  pub fn is_cleared(&self) -> bool {
    self.is_cleared.load(Ordering::Acquire)
  }
}

impl CounterStore for SnapshotContainer {
  fn find_class(&self, record: &ClassRecord) -> Option<Arc<ClassCounter>> {
    self
      .counters
      .get(&record.tag())
      .map(|entry| Arc::clone(entry.value()))
  }

  fn push_new_class(&self, record: Arc<ClassRecord>) -> Arc<ClassCounter> {
    let tag = record.tag();
    let entry = self
      .counters
      .entry(tag)
      .or_insert_with(|| Arc::new(ClassCounter::new(record)));
    Arc::clone(entry.value())
  }

  fn find_child_class(
    &self,
    parent: &ClassCounter,
    handle: ClassHandle,
  ) -> Option<Arc<ChildCounter>> {
    parent.find_child(handle)
  }

  fn push_new_child_class(
    &self,
    parent: &ClassCounter,
    record: Arc<ClassRecord>,
  ) -> Arc<ChildCounter> {
    parent.push_child(record)
  }

  /// Reset all counters for reuse.
  ///
  /// Non-forced clears are idempotent: once a container is cleared, the
  /// call returns without touching the counters. Counter shells and child
  /// edge lists survive the clear; only their values and the per-round
  /// offset caches are reset.
  fn clear(&self, force: bool) {
    if !force && self.is_cleared() {
      return;
    }

    for entry in self.counters.iter() {
      entry.value().clear_round();
    }
    self.is_cleared.store(true, Ordering::Release);
  }
}
