//! Build and tick summaries, plus a rolling timing window.

use std::collections::VecDeque;

use crate::proxy::MeshOutcome;

/// Aggregate result of a hierarchy or mesh build.
///
/// Individual failures are logged where they happen; callers only get counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildSummary {
  /// Build passes that ran.
  pub tiers_built: usize,
  pub nodes_built: usize,
  /// Pairwise candidates kept after culling.
  pub candidates_generated: usize,
  /// Pairwise candidates dropped by the cull threshold.
  pub candidates_culled: usize,
  pub merges: usize,
  pub subtractions: usize,
  /// Clusters too small to become nodes.
  pub clusters_rejected: usize,
  pub meshes_built: usize,
  pub meshes_queued: usize,
  pub meshes_up_to_date: usize,
  pub meshes_failed: usize,
  pub nodes_without_components: usize,
}

impl BuildSummary {
  /// Count one mesh request outcome.
  pub fn record(&mut self, outcome: MeshOutcome) {
    match outcome {
      MeshOutcome::Built => self.meshes_built += 1,
      MeshOutcome::Queued(_) => self.meshes_queued += 1,
      MeshOutcome::UpToDate | MeshOutcome::AlreadyQueued(_) => self.meshes_up_to_date += 1,
      MeshOutcome::Failed => self.meshes_failed += 1,
      MeshOutcome::NoComponents => self.nodes_without_components += 1,
      MeshOutcome::Skipped => {}
    }
  }

  /// Successful mesh builds, including ones handed to async jobs.
  pub fn succeeded(&self) -> usize {
    self.meshes_built + self.meshes_queued
  }
}

/// Result of one [`crate::proxy::ProxyJobProcessor::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
  pub finalized: usize,
  /// Jobs whose merge produced no usable mesh.
  pub failed: usize,
  /// Jobs whose target node no longer exists.
  pub discarded: usize,
}

impl TickReport {
  pub fn processed(&self) -> usize {
    self.finalized + self.failed + self.discarded
  }
}

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Push a new value, evicting the oldest if at capacity.
  pub fn push(&mut self, value: T) {
    if self.capacity == 0 {
      return;
    }
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  /// Iterate over values (oldest to newest).
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }

  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }
}

impl RollingWindow<u64> {
  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.buffer.iter().sum::<u64>() as f64 / self.buffer.len() as f64
    }
  }

  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = self.buffer.iter().min()?;
    let max = self.buffer.iter().max()?;
    Some((*min, *max))
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(128)
  }
}
