//! Byte-exact snapshot file header.
//!
//! The on-disk layout is a packed 174-byte record addressed by explicit
//! offsets; integer fields use the byte order declared by the BOM field.

/// Magic number for the extended snapshot format.
pub const EXTENDED_SNAPSHOT: u8 = 0b1000_0000;

/// Magic number for the extended format carrying reference-tree data.
pub const EXTENDED_REFTREE_SNAPSHOT: u8 = 0b1000_0001;

/// Serialized length of [`SnapshotHeader`] in bytes.
pub const SNAPSHOT_HEADER_LEN: usize = 174;

/// Capacity of the GC cause field, including its terminating NUL.
pub const GC_CAUSE_LEN: usize = 80;

#[cfg(target_endian = "little")]
const BYTE_ORDER_MARK: u8 = b'L';
#[cfg(target_endian = "big")]
const BYTE_ORDER_MARK: u8 = b'B';

/// What triggered a snapshot.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(i32)]
pub enum SnapshotCause {
  /// Timer-triggered periodic sampling.
  Periodic = 1,
  /// Garbage collection completed.
  GcInvoked = 2,
  /// Explicit dump request from the user.
  DataDumpRequest = 3,
  /// Resource exhaustion reported by the VM.
  ResourceExhausted = 4,
}

/// Fixed-layout header written at the front of every snapshot file.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
  pub magic_number: u8,
  pub byte_order_mark: u8,
  /// Seconds since the Unix epoch at which the snapshot was taken.
  pub snapshot_time: i64,
  /// Number of class entries that follow the header.
  pub size: i64,
  pub cause: SnapshotCause,
  pub gc_cause_len: i64,
  pub gc_cause: [u8; GC_CAUSE_LEN],
  pub fgc_count: i64,
  pub ygc_count: i64,
  pub gc_worktime: i64,
  pub new_area_size: i64,
  pub old_area_size: i64,
  pub total_heap_size: i64,
  pub metaspace_usage: i64,
  pub metaspace_capacity: i64,
}

impl SnapshotHeader {
  #[must_use]
  pub fn new(collect_ref_tree: bool) -> Self {
    Self {
      magic_number: if collect_ref_tree {
        EXTENDED_REFTREE_SNAPSHOT
      } else {
        EXTENDED_SNAPSHOT
      },
      byte_order_mark: BYTE_ORDER_MARK,
      snapshot_time: 0,
      size: 0,
      cause: SnapshotCause::Periodic,
      gc_cause_len: 0,
      gc_cause: [0; GC_CAUSE_LEN],
      fgc_count: 0,
      ygc_count: 0,
      gc_worktime: 0,
      new_area_size: 0,
      old_area_size: 0,
      total_heap_size: 0,
      metaspace_usage: 0,
      metaspace_capacity: 0,
    }
  }

  /// Whether this header announces reference-tree data.
  #[must_use]
  pub fn contains_ref_tree(&self) -> bool {
    self.magic_number & 0b0000_0001 != 0
  }

  /// Copy a GC cause string into the fixed-size field.
  ///
  /// The text is truncated to leave room for the terminating NUL;
  /// `gc_cause_len` records the number of text bytes actually stored.
  pub fn set_gc_cause(&mut self, cause: &str) {
    let bytes = cause.as_bytes();
    let len = bytes.len().min(GC_CAUSE_LEN - 1);
    self.gc_cause = [0; GC_CAUSE_LEN];
    self.gc_cause[..len].copy_from_slice(&bytes[..len]);
    self.gc_cause_len = len as i64;
  }

  /// Reset the GC cause to the "no GC" encoding: a single NUL byte.
  pub fn clear_gc_cause(&mut self) {
    self.gc_cause = [0; GC_CAUSE_LEN];
    self.gc_cause_len = 1;
  }

  /// The stored GC cause as text.
  #[must_use]
  pub fn gc_cause_str(&self) -> &str {
    let end = self
      .gc_cause
      .iter()
      .position(|&b| b == 0)
      .unwrap_or(GC_CAUSE_LEN);
    std::str::from_utf8(&self.gc_cause[..end]).unwrap_or("")
  }

  /// Serialize the header into its packed on-disk form.
  ///
  /// Integer fields are written in the byte order declared by
  /// `byte_order_mark`, which is always the native order of the producing
  /// process.
  #[must_use]
  pub fn to_bytes(&self) -> [u8; SNAPSHOT_HEADER_LEN] {
    let mut buf = [0u8; SNAPSHOT_HEADER_LEN];
    buf[0] = self.magic_number;
    buf[1] = self.byte_order_mark;
    put_i64(&mut buf, 2, self.snapshot_time);
    put_i64(&mut buf, 10, self.size);
    buf[18..22].copy_from_slice(&(self.cause as i32).to_ne_bytes());
    put_i64(&mut buf, 22, self.gc_cause_len);
    buf[30..110].copy_from_slice(&self.gc_cause);
    put_i64(&mut buf, 110, self.fgc_count);
    put_i64(&mut buf, 118, self.ygc_count);
    put_i64(&mut buf, 126, self.gc_worktime);
    put_i64(&mut buf, 134, self.new_area_size);
    put_i64(&mut buf, 142, self.old_area_size);
    put_i64(&mut buf, 150, self.total_heap_size);
    put_i64(&mut buf, 158, self.metaspace_usage);
    put_i64(&mut buf, 166, self.metaspace_capacity);
    buf
  }
}

fn put_i64(buf: &mut [u8], offset: usize, value: i64) {
  buf[offset..offset + 8].copy_from_slice(&value.to_ne_bytes());
}
