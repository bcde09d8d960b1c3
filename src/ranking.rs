/// One ranked entry: a class, its current usage, and the change since the
/// previously committed snapshot.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct HeapDelta {
  /// Stable class tag from the registry.
  pub tag: i64,
  /// Total bytes attributed to the class in this snapshot.
  pub usage: i64,
  /// `usage` minus the class's usage in the previous snapshot.
  pub delta: i64,
}

/// Order a ranking buffer: descending usage, ties broken by ascending tag
/// so equal-usage classes rank deterministically.
pub(crate) fn sort_ranking(rank: &mut [HeapDelta]) {
  rank.sort_unstable_by(|a, b| b.usage.cmp(&a.usage).then(a.tag.cmp(&b.tag)));
}
