use std::sync::{
  Arc,
  atomic::{AtomicI64, AtomicU32, Ordering},
};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::registry::{ClassHandle, ClassRecord};

/// One block of reference-field offsets within an instance layout.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct OopMapBlock {
  /// Byte offset of the first reference field in the block.
  pub offset: u32,
  /// Number of consecutive reference fields.
  pub count: u32,
}

/// Cached reference-field layout of a class.
pub type OopMapCache = SmallVec<[OopMapBlock; 8]>;

/// The primary `(count, total_size)` accumulator.
///
/// The two fields are individually atomic and monotonic within a round but
/// not jointly atomic; readers must wait for the round to end before
/// treating the pair as consistent. Alignment matches the serialized
/// counter layout.
#[derive(Debug, Default)]
#[repr(C, align(16))]
pub struct ObjectCounter {
  count: AtomicI64,
  total_size: AtomicI64,
}

impl ObjectCounter {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Attribute one object of `size` bytes.
  pub fn inc(&self, size: i64) {
    self.count.fetch_add(1, Ordering::Relaxed);
    self.total_size.fetch_add(size, Ordering::Relaxed);
  }

  /// Merge a quiescent counter into this one.
  ///
  /// Equivalent to two 64-bit adds; `operand` must no longer be receiving
  /// increments.
  pub fn add_inc(&self, operand: &ObjectCounter) {
    self
      .count
      .fetch_add(operand.count.load(Ordering::Relaxed), Ordering::Relaxed);
    self
      .total_size
      .fetch_add(operand.total_size.load(Ordering::Relaxed), Ordering::Relaxed);
  }

  pub fn reset(&self) {
    self.count.store(0, Ordering::Relaxed);
    self.total_size.store(0, Ordering::Relaxed);
  }

  #[must_use]
  pub fn count(&self) -> i64 {
    self.count.load(Ordering::Relaxed)
  }

  #[must_use]
  pub fn total_size(&self) -> i64 {
    self.total_size.load(Ordering::Relaxed)
  }
}

/// Accumulator for one observed parent-class to child-class reference edge.
#[derive(Debug)]
pub struct ChildCounter {
  counter: ObjectCounter,
  record: Arc<ClassRecord>,
  call_count: AtomicU32,
}

impl ChildCounter {
  fn new(record: Arc<ClassRecord>) -> Self {
    Self {
      counter: ObjectCounter::new(),
      record,
      call_count: AtomicU32::new(0),
    }
  }

  #[must_use]
  pub fn counter(&self) -> &ObjectCounter {
    &self.counter
  }

  /// The child class this edge points at.
  #[must_use]
  pub fn record(&self) -> &Arc<ClassRecord> {
    &self.record
  }

  /// How often this edge has been looked up; drives the list ordering.
  #[must_use]
  pub fn call_count(&self) -> u32 {
    self.call_count.load(Ordering::Relaxed)
  }
}

/// Per-snapshot accumulator for one class: the primary counter plus the
/// ordered list of observed child edges.
#[derive(Debug)]
pub struct ClassCounter {
  record: Arc<ClassRecord>,
  counter: ObjectCounter,
  children: Mutex<Vec<Arc<ChildCounter>>>,
  offsets: Mutex<Option<OopMapCache>>,
}

impl ClassCounter {
  #[must_use]
  pub fn new(record: Arc<ClassRecord>) -> Self {
    Self {
      record,
      counter: ObjectCounter::new(),
      children: Mutex::new(Vec::new()),
      offsets: Mutex::new(None),
    }
  }

  #[must_use]
  pub fn record(&self) -> &Arc<ClassRecord> {
    &self.record
  }

  #[must_use]
  pub fn counter(&self) -> &ObjectCounter {
    &self.counter
  }

  /// Look up the edge to the class identified by `handle`.
  ///
  /// A hit bumps the edge's call count and moves it one position toward
  /// the list head when it is now at least as hot as its predecessor, so
  /// skewed workloads converge on most-frequent-first ordering.
  #[must_use]
  pub fn find_child(&self, handle: ClassHandle) -> Option<Arc<ChildCounter>> {
    let mut children = self.children.lock();
    let index = children
      .iter()
      .position(|child| child.record.handle() == handle)?;
    let found = Arc::clone(&children[index]);

    let calls = found.call_count.fetch_add(1, Ordering::Relaxed) + 1;
    if index > 0 && children[index - 1].call_count() <= calls {
      children.swap(index - 1, index);
    }

    Some(found)
  }

  /// Append a new edge at the list tail, keeping cold new edges behind the
  /// established hot ones. Returns the existing edge if another thread
  /// appended it first.
  pub fn push_child(&self, record: Arc<ClassRecord>) -> Arc<ChildCounter> {
    let mut children = self.children.lock();
    if let Some(existing) = children
      .iter()
      .find(|child| child.record.handle() == record.handle())
    {
      return Arc::clone(existing);
    }

    let child = Arc::new(ChildCounter::new(record));
    children.push(Arc::clone(&child));
    child
  }

  /// Current edge list, head first.
  #[must_use]
  pub fn children(&self) -> Vec<Arc<ChildCounter>> {
    self.children.lock().clone()
  }

  /// Cached reference-field layout, if a sampler has populated it this
  /// round.
  #[must_use]
  pub fn cached_offsets(&self) -> Option<OopMapCache> {
    self.offsets.lock().clone()
  }

  /// Publish the reference-field layout for reuse within the round.
  pub fn cache_offsets(&self, offsets: OopMapCache) {
    *self.offsets.lock() = Some(offsets);
  }

  /// Reset this counter for a new round: drop the offset cache and zero
  /// every counter while keeping the accumulated edge topology.
  pub(crate) fn clear_round(&self) {
    *self.offsets.lock() = None;
    for child in self.children.lock().iter() {
      child.counter.reset();
    }
    self.counter.reset();
  }
}
