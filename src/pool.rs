use crossbeam_queue::ArrayQueue;

use crate::config::SamplerConfig;
use crate::container::{CounterStore, SnapshotContainer};

/// Default bound on idle containers kept for reuse.
pub const MAX_STOCK_COUNT: usize = 2;

/// Bounded recycler of snapshot containers.
///
/// Repeated rounds reuse cleared containers instead of rebuilding their
/// counter maps; anything beyond the stock bound is simply destroyed on
/// release.
#[derive(Debug)]
pub struct SnapshotPool {
  stock: ArrayQueue<Box<SnapshotContainer>>,
  collect_ref_tree: bool,
}

impl SnapshotPool {
  #[must_use]
  pub fn new(config: &SamplerConfig) -> Self {
    Self {
      stock: ArrayQueue::new(config.max_stock_count.max(1)),
      collect_ref_tree: config.collect_ref_tree,
    }
  }

  /// Hand out a cleared container, reusing stock when available.
  #[must_use]
  pub fn get_instance(&self) -> Box<SnapshotContainer> {
    self
      .stock
      .pop()
      .unwrap_or_else(|| Box::new(SnapshotContainer::new(self.collect_ref_tree)))
  }

  /// Return a container to the stock, destroying it if the stock is full.
  pub fn release_instance(&self, container: Box<SnapshotContainer>) {
    if self.stock.len() < self.stock.capacity() {
      container.clear(false);
      // A concurrent release can still fill the queue first; the failed
      // push hands the container back and it drops here.
      let _ = self.stock.push(container);
    }
  }

  /// Idle containers currently stocked.
  #[must_use]
  pub fn stocked(&self) -> usize {
    self.stock.len()
  }
}
