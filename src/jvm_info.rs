/// Performance counters collected from the host JVM for one sampling round.
///
/// The host glue fills this from its performance-counter sources before
/// committing a snapshot; the core only copies the values into the snapshot
/// header and the GC summary log.
#[derive(Debug, Clone)]
pub struct JvmInfo {
  /// Cause string reported by the collector for GC-triggered snapshots.
  pub gc_cause: String,
  /// Accumulated GC work time in milliseconds.
  pub gc_worktime: i64,
  /// Full GC count since VM start.
  pub fgc_count: i64,
  /// Young GC count since VM start.
  pub ygc_count: i64,
  /// Bytes in use in the new (young) area.
  pub new_area_size: i64,
  /// Bytes in use in the old area.
  pub old_area_size: i64,
  /// Total committed Java heap size in bytes.
  pub total_heap_size: i64,
  /// Metaspace (or PermGen) usage in bytes.
  pub metaspace_usage: i64,
  /// Metaspace (or PermGen) max capacity in bytes.
  pub metaspace_capacity: i64,
  /// Whether the VM names the class-metadata area "Metaspace" rather than
  /// "PermGen". Affects log output only.
  pub has_metaspace: bool,
}

impl Default for JvmInfo {
  fn default() -> Self {
    Self {
      gc_cause: String::new(),
      gc_worktime: 0,
      fgc_count: 0,
      ygc_count: 0,
      new_area_size: 0,
      old_area_size: 0,
      total_heap_size: 0,
      metaspace_usage: 0,
      metaspace_capacity: 0,
      has_metaspace: true,
    }
  }
}
