use std::sync::{
  Arc,
  atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
};

use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use nohash_hasher::BuildNoHashHasher;

use crate::container::SnapshotContainer;
use crate::ranking::{HeapDelta, sort_ranking};

/// Opaque class identity handle supplied by the host runtime.
///
/// Stable for the lifetime of a loaded class unless the runtime relocates
/// its metadata, in which case [`ClassRegistry::update_class`] rebinds it.
pub type ClassHandle = u64;

/// Broad classification of a loaded class.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum OopKind {
  #[default]
  Instance,
  ObjectArray,
  PrimitiveArray,
}

/// Class metadata resolved by the host glue before registration.
#[derive(Debug, Clone)]
pub struct ClassMeta {
  pub class_name: Arc<str>,
  pub oop_type: OopKind,
  pub class_loader_id: i64,
  pub class_loader_tag: i64,
  /// Fixed per-instance byte size for instance classes, zero otherwise.
  pub instance_size: i64,
}

impl Default for ClassMeta {
  fn default() -> Self {
    Self {
      class_name: Arc::from("<unknown>"),
      oop_type: OopKind::Instance,
      class_loader_id: 0,
      class_loader_tag: 0,
      instance_size: 0,
    }
  }
}

impl ClassMeta {
  #[must_use]
  pub fn named(class_name: impl Into<String>) -> Self {
    Self {
      class_name: Arc::<str>::from(class_name.into()),
      ..Self::default()
    }
  }
}

/// Durable per-class record owned by the [`ClassRegistry`].
///
/// Snapshot containers hold `Arc` references to records; a record marked
/// removed therefore stays alive until the last container referencing it is
/// cleared or dropped.
#[derive(Debug)]
pub struct ClassRecord {
  tag: i64,
  class_name: Arc<str>,
  handle: AtomicU64,
  oop_type: OopKind,
  class_loader_id: i64,
  class_loader_tag: i64,
  instance_size: i64,
  old_total_size: AtomicI64,
  is_removed: AtomicBool,
}

impl ClassRecord {
  fn new(tag: i64, handle: ClassHandle, meta: ClassMeta) -> Self {
    Self {
      tag,
      class_name: meta.class_name,
      handle: AtomicU64::new(handle),
      oop_type: meta.oop_type,
      class_loader_id: meta.class_loader_id,
      class_loader_tag: meta.class_loader_tag,
      instance_size: meta.instance_size,
      old_total_size: AtomicI64::new(0),
      is_removed: AtomicBool::new(false),
    }
  }

  /// Stable identity used in emitted snapshot files.
  #[must_use]
  pub fn tag(&self) -> i64 {
    self.tag
  }

  #[must_use]
  pub fn class_name(&self) -> &str {
    &self.class_name
  }

  #[must_use]
  pub fn class_name_len(&self) -> i64 {
    self.class_name.len() as i64
  }

  /// Current runtime handle. Changes only at a relocation safepoint.
  #[must_use]
  pub fn handle(&self) -> ClassHandle {
    self.handle.load(Ordering::Relaxed)
  }

  #[must_use]
  pub fn oop_type(&self) -> OopKind {
    self.oop_type
  }

  #[must_use]
  pub fn class_loader_id(&self) -> i64 {
    self.class_loader_id
  }

  #[must_use]
  pub fn class_loader_tag(&self) -> i64 {
    self.class_loader_tag
  }

  #[must_use]
  pub fn instance_size(&self) -> i64 {
    self.instance_size
  }

  /// Total bytes attributed to this class in the previously committed
  /// snapshot.
  #[must_use]
  pub fn old_total_size(&self) -> i64 {
    self.old_total_size.load(Ordering::Relaxed)
  }

  /// Whether the runtime has reported this class unloaded.
  #[must_use]
  pub fn is_removed(&self) -> bool {
    self.is_removed.load(Ordering::Acquire)
  }

  pub(crate) fn set_handle(&self, handle: ClassHandle) {
    self.handle.store(handle, Ordering::Relaxed);
  }

  /// Record `usage` as the new baseline and return the previous one.
  pub(crate) fn swap_old_total_size(&self, usage: i64) -> i64 {
    self.old_total_size.swap(usage, Ordering::Relaxed)
  }

  /// Returns whether the record was already tombstoned.
  pub(crate) fn mark_removed(&self) -> bool {
    self.is_removed.swap(true, Ordering::AcqRel)
  }
}

type ClassMap = DashMap<ClassHandle, Arc<ClassRecord>, BuildNoHashHasher<ClassHandle>>;

/// Process-wide mapping from class handles to class records.
///
/// Inserts and lookups are concurrent; unloads are two-phase so in-flight
/// snapshots keep their records until [`ClassRegistry::commit_class_change`]
/// runs after ranking has been consumed.
#[derive(Debug)]
pub struct ClassRegistry {
  classes: ClassMap,
  unloaded: SegQueue<Arc<ClassRecord>>,
  next_tag: AtomicI64,
}

impl Default for ClassRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl ClassRegistry {
  #[must_use]
  pub fn new() -> Self {
    Self {
      classes: ClassMap::with_hasher(BuildNoHashHasher::default()),
      unloaded: SegQueue::new(),
      next_tag: AtomicI64::new(1),
    }
  }

  /// Register a class under `handle`, or return the already registered
  /// record if another thread won the race. The loser's metadata is
  /// discarded.
  pub fn push_new_class(&self, handle: ClassHandle, meta: ClassMeta) -> Arc<ClassRecord> {
    let entry = self
      .classes
      .entry(handle)
      .or_insert_with(|| Arc::new(ClassRecord::new(self.allocate_tag(), handle, meta)));
    Arc::clone(entry.value())
  }

  /// Build a record without inserting it, for callers that want to finish
  /// expensive metadata resolution before publication.
  ///
  /// The tag is allocated eagerly; if the record later loses the
  /// [`ClassRegistry::push_new_record`] race its tag is simply never
  /// emitted.
  #[must_use]
  pub fn new_record(&self, handle: ClassHandle, meta: ClassMeta) -> Arc<ClassRecord> {
    Arc::new(ClassRecord::new(self.allocate_tag(), handle, meta))
  }

  /// Insert a caller-built record, returning the registered record. On a
  /// lost race the caller's record is dropped and the winner returned.
  pub fn push_new_record(&self, record: Arc<ClassRecord>) -> Arc<ClassRecord> {
    let entry = self.classes.entry(record.handle()).or_insert(record);
    Arc::clone(entry.value())
  }

  /// Concurrent lookup by handle. Tombstoned records remain findable until
  /// the next [`ClassRegistry::commit_class_change`].
  #[must_use]
  pub fn find(&self, handle: ClassHandle) -> Option<Arc<ClassRecord>> {
    self.classes.get(&handle).map(|entry| Arc::clone(entry.value()))
  }

  /// Rebind a record to a new handle after the runtime relocated its class
  /// metadata.
  ///
  /// Class relocation happens at a single-threaded safepoint, so no
  /// concurrent registry access can be in flight while this runs.
  pub fn update_class(&self, old_handle: ClassHandle, new_handle: ClassHandle) {
    if let Some((_, record)) = self.classes.remove(&old_handle) {
      record.set_handle(new_handle);
      self.classes.insert(new_handle, record);
    }
  }

  /// Tombstone a record and queue it for removal at the next commit.
  /// Calling this twice for the same record is a no-op.
  pub fn pop_class(&self, record: &Arc<ClassRecord>) {
    if !record.mark_removed() {
      self.unloaded.push(Arc::clone(record));
    }
  }

  /// Physically remove a tombstoned record from the map.
  ///
  /// The entry is only removed if the handle still maps to this record, so
  /// a handle that was rebound to a newly loaded class is left alone.
  pub fn remove_class(&self, record: &Arc<ClassRecord>) {
    self
      .classes
      .remove_if(&record.handle(), |_, current| Arc::ptr_eq(current, record));
  }

  /// Drain the unload queue, removing every tombstoned record.
  ///
  /// Must only run once the previous snapshot's ranking has been fully
  /// consumed; until then in-flight readers may still resolve these
  /// records.
  pub fn commit_class_change(&self) {
    while let Some(record) = self.unloaded.pop() {
      self.remove_class(&record);
    }
  }

  /// Join a populated snapshot with the registry's per-class baselines and
  /// produce the ranked `(tag, usage, delta)` sequence.
  ///
  /// Advances each record's remembered total as a side effect.
  pub fn after_take_snapshot(&self, snapshot: &SnapshotContainer) -> Vec<HeapDelta> {
    let mut rank = Vec::with_capacity(snapshot.len());
    snapshot.each_counter(|counter| {
      let record = counter.record();
      let usage = counter.counter().total_size();
      let delta = usage - record.swap_old_total_size(usage);
      rank.push(HeapDelta {
        tag: record.tag(),
        usage,
        delta,
      });
    });
    sort_ranking(&mut rank);
    rank
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.classes.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.classes.is_empty()
  }

  fn allocate_tag(&self) -> i64 {
    self.next_tag.fetch_add(1, Ordering::Relaxed)
  }
}
