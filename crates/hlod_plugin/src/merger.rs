//! ClusterMerger - bounded absorption passes over sorted candidates and the
//! acceptance filter.

use crate::cluster::{LodCluster, MemberEntry};
use crate::config::HlodConfig;
use crate::error::Result;

/// Counters from one [`ClusterMerger::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
  pub iterations: u32,
  pub merges: usize,
  pub subtractions: usize,
}

impl MergeStats {
  #[inline]
  pub fn changed(&self) -> bool {
    self.merges + self.subtractions > 0
  }
}

/// Clusters that passed the acceptance filter plus the members left over.
#[derive(Clone, Debug, Default)]
pub struct Acceptance {
  pub accepted: Vec<LodCluster>,
  /// Members of rejected clusters, available to the next tier.
  pub leftover: Vec<MemberEntry>,
  pub rejected: usize,
}

/// Resolves overlapping candidates into disjoint clusters.
#[derive(Clone, Copy, Debug)]
pub struct ClusterMerger {
  highest_cost: f64,
  max_iterations: u32,
}

impl ClusterMerger {
  pub fn new(highest_cost: f64, max_iterations: u32) -> Self {
    Self {
      highest_cost,
      max_iterations,
    }
  }

  /// Merger for build pass `pass`: the tier's cull threshold is the highest
  /// allowed cost.
  pub fn from_config(config: &HlodConfig, pass: usize) -> Result<Self> {
    Ok(Self::new(config.cull_threshold(pass)?, config.max_merge_iterations))
  }

  #[inline]
  pub fn highest_cost(&self) -> f64 {
    self.highest_cost
  }

  /// Run absorption passes over `clusters` (ascending cost).
  ///
  /// Each still valid candidate is tested against every earlier valid one
  /// it shares a member with. If the union is affordable the earlier cluster
  /// becomes the union and the candidate is invalidated; otherwise the
  /// shared members are taken out of the candidate. Stops after a pass with
  /// no change or after `max_iterations` passes.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "merger::run"))]
  pub fn run(&self, clusters: &mut [LodCluster]) -> MergeStats {
    let mut stats = MergeStats::default();

    for _ in 0..self.max_iterations {
      stats.iterations += 1;
      let mut changed = false;

      for index in 0..clusters.len() {
        let (earlier, rest) = clusters.split_at_mut(index);
        let candidate = &mut rest[0];

        for merged_into in earlier.iter_mut() {
          if !candidate.is_valid() {
            break;
          }
          if !merged_into.overlaps(candidate) {
            continue;
          }

          let union = match merged_into.merge(candidate) {
            Ok(union) => union,
            Err(_) => continue,
          };
          if union.cached_cost() <= self.highest_cost {
            tracing::debug!(into = %merged_into, from = %candidate, cost = union.cached_cost(), "merged clusters");
            *merged_into = union;
            candidate.invalidate();
            stats.merges += 1;
            changed = true;
            break;
          }

          tracing::debug!(cluster = %candidate, shared_with = %merged_into, "subtracted shared members");
          *candidate -= &*merged_into;
          stats.subtractions += 1;
          changed = true;
        }
      }

      if !changed {
        break;
      }
    }

    stats
  }

  /// Split valid clusters into accepted (at least `min_members`) and
  /// rejected. Members of rejected clusters are returned, not dropped.
  pub fn accept(clusters: Vec<LodCluster>, min_members: usize) -> Acceptance {
    let mut out = Acceptance::default();
    for cluster in clusters.into_iter().filter(LodCluster::is_valid) {
      if cluster.len() >= min_members {
        out.accepted.push(cluster);
      } else {
        out.rejected += 1;
        out.leftover.extend_from_slice(cluster.entries());
      }
    }
    out
  }
}

#[cfg(test)]
#[path = "merger_test.rs"]
mod merger_test;
