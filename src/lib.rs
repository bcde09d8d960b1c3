//! Concurrent heap-statistics accumulation core for a JVM profiling agent.
//!
//! At every GC- or timer-triggered sampling event an external heap walker
//! attributes live objects to their classes through this crate: the
//! [`ClassRegistry`] maps opaque runtime handles to durable class records,
//! a pooled [`SnapshotContainer`] accumulates per-class (and optionally
//! per-reference-edge) counts and byte totals under concurrent updates, and
//! committing a round produces a delta-ranked snapshot plus threshold
//! alerts.
//!
//! The host-runtime glue (heap walking, class-name resolution, snapshot
//! file management) stays outside; this crate only exposes the callback
//! and writer contracts it consumes.

mod alert;
mod config;
mod container;
mod counter;
mod header;
mod jvm_info;
mod pool;
mod ranking;
mod registry;
mod sampler;
mod writer;

pub use {
  alert::{AlertEvent, AlertHook, AlertKind, AlertSink, LogAlertSink},
  config::SamplerConfig,
  container::{CounterStore, SnapshotContainer},
  counter::{ChildCounter, ClassCounter, ObjectCounter, OopMapBlock, OopMapCache},
  header::{
    EXTENDED_REFTREE_SNAPSHOT, EXTENDED_SNAPSHOT, GC_CAUSE_LEN, SNAPSHOT_HEADER_LEN,
    SnapshotCause, SnapshotHeader,
  },
  jvm_info::JvmInfo,
  pool::{MAX_STOCK_COUNT, SnapshotPool},
  ranking::HeapDelta,
  registry::{ClassHandle, ClassMeta, ClassRecord, ClassRegistry, OopKind},
  sampler::HeapSampler,
  writer::{BinarySnapshotWriter, ExportError, SnapshotSink},
};
