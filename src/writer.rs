use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};

use crate::header::SnapshotHeader;
use crate::ranking::HeapDelta;

/// Errors that can occur when handing a snapshot to a writer.
#[derive(Debug)]
pub enum ExportError {
  Io(io::Error),
}

impl Display for ExportError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(err) => write!(f, "i/o error during snapshot export: {err}"),
    }
  }
}

impl std::error::Error for ExportError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Io(err) => Some(err),
    }
  }
}

impl From<io::Error> for ExportError {
  fn from(value: io::Error) -> Self {
    Self::Io(value)
  }
}

/// Consumer of committed snapshots.
///
/// The core hands every committed round to a sink; full snapshot-file
/// emission (class entries, reference trees) lives behind this trait in the
/// host glue.
pub trait SnapshotSink {
  /// # Errors
  ///
  /// Returns an `ExportError` if the downstream writer fails to persist
  /// the snapshot.
  fn write_snapshot(
    &mut self,
    header: &SnapshotHeader,
    ranking: &[HeapDelta],
  ) -> Result<(), ExportError>;
}

/// Reference sink: the packed header followed by the ranked
/// `(tag, usage, delta)` triples in header byte order.
pub struct BinarySnapshotWriter<W: Write> {
  writer: W,
}

impl<W: Write> BinarySnapshotWriter<W> {
  pub fn new(writer: W) -> Self {
    Self { writer }
  }

  pub fn into_inner(self) -> W {
    self.writer
  }
}

impl<W: Write> SnapshotSink for BinarySnapshotWriter<W> {
  fn write_snapshot(
    &mut self,
    header: &SnapshotHeader,
    ranking: &[HeapDelta],
  ) -> Result<(), ExportError> {
    self.writer.write_all(&header.to_bytes())?;
    for entry in ranking {
      self.writer.write_all(&entry.tag.to_ne_bytes())?;
      self.writer.write_all(&entry.usage.to_ne_bytes())?;
      self.writer.write_all(&entry.delta.to_ne_bytes())?;
    }
    self.writer.flush()?;
    Ok(())
  }
}
