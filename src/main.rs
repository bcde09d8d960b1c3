use heapstats::{
  BinarySnapshotWriter, ClassMeta, HeapSampler, JvmInfo, LogAlertSink, SamplerConfig,
  SnapshotCause,
};

fn main() {
  let sampler = HeapSampler::new(SamplerConfig::default());

  sampler
    .registry()
    .push_new_class(0x1000, ClassMeta::named("java/lang/String"));
  sampler
    .registry()
    .push_new_class(0x2000, ClassMeta::named("java/util/HashMap"));
  sampler
    .registry()
    .push_new_class(0x3000, ClassMeta::named("java/util/HashMap$Node"));

  let container = sampler.begin_round();
  for _ in 0..4 {
    sampler.record_object(container.as_ref(), 0x1000, None, 24);
  }
  sampler.record_object(container.as_ref(), 0x2000, None, 48);
  sampler.record_object(container.as_ref(), 0x3000, Some(0x2000), 32);
  sampler.record_object(container.as_ref(), 0x3000, Some(0x2000), 32);

  let info = JvmInfo {
    gc_cause: "Allocation Failure".to_string(),
    gc_worktime: 7,
    fgc_count: 1,
    ygc_count: 12,
    new_area_size: 32 * 1024 * 1024,
    old_area_size: 96 * 1024 * 1024,
    total_heap_size: 256 * 1024 * 1024,
    metaspace_usage: 21 * 1024 * 1024,
    metaspace_capacity: 64 * 1024 * 1024,
    ..JvmInfo::default()
  };

  let mut sink = BinarySnapshotWriter::new(Vec::new());
  let mut alerts = LogAlertSink;
  let ranking = sampler
    .commit_round(container, SnapshotCause::GcInvoked, &info, &mut sink, &mut alerts)
    .expect("snapshot export failed");

  println!("=== demo snapshot ===");
  for entry in &ranking {
    println!(
      "tag={} usage={}B delta={}B",
      entry.tag, entry.usage, entry.delta
    );
  }
  println!("snapshot bytes: {}", sink.into_inner().len());
}
