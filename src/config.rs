/// Controls how the sampler accumulates and reports heap statistics.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
  /// Whether to track parent-class to child-class reference edges.
  ///
  /// Selects the reference-tree snapshot format and enables the child
  /// counter lists on the hot path.
  pub collect_ref_tree: bool,
  /// Java heap usage (young + old area, in bytes) above which a heap alert
  /// fires. Zero disables the check.
  pub heap_alert_threshold: i64,
  /// Metaspace usage in bytes above which a metaspace alert fires. Zero
  /// disables the check.
  pub metaspace_alert_threshold: i64,
  /// Maximum number of idle snapshot containers kept for reuse.
  pub max_stock_count: usize,
}

impl Default for SamplerConfig {
  fn default() -> Self {
    Self {
      collect_ref_tree: true,
      heap_alert_threshold: 0,
      metaspace_alert_threshold: 0,
      max_stock_count: crate::pool::MAX_STOCK_COUNT,
    }
  }
}

impl SamplerConfig {
  /// Builder-style helper to toggle reference-tree collection.
  #[must_use]
  pub fn with_ref_tree(mut self, collect: bool) -> Self {
    self.collect_ref_tree = collect;
    self
  }

  /// Builder-style helper to set the Java heap alert threshold.
  #[must_use]
  pub fn with_heap_alert_threshold(mut self, bytes: i64) -> Self {
    self.heap_alert_threshold = bytes;
    self
  }

  /// Builder-style helper to set the metaspace alert threshold.
  #[must_use]
  pub fn with_metaspace_alert_threshold(mut self, bytes: i64) -> Self {
    self.metaspace_alert_threshold = bytes;
    self
  }

  /// Builder-style helper to bound the container stock.
  #[must_use]
  pub fn with_max_stock(mut self, count: usize) -> Self {
    self.max_stock_count = count.max(1);
    self
  }
}
