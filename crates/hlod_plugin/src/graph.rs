//! ClusterGraphBuilder - input selection and pairwise candidate generation.
//!
//! Every unordered pair of input elements becomes a two-member candidate;
//! candidates above the tier's cull threshold are dropped and the rest are
//! stably sorted by ascending cost.
//!
//! Pairwise generation is O(n²) in the number of inputs and there is no
//! broad phase in front of it. It dominates build time for dense levels.

use rayon::prelude::*;

use crate::cluster::{LodCluster, MemberEntry};
use crate::config::HlodConfig;
use crate::cost;
use crate::error::Result;
use crate::hierarchy::Hierarchy;
use crate::scene::{ActorQuery, Level};
use crate::types::{ActorId, NodeId, VolumeId};

/// Sorted candidate clusters for one tier.
#[derive(Clone, Debug, Default)]
pub struct ClusterGraph {
  /// Ascending cost, ties in generation order.
  pub candidates: Vec<LodCluster>,
  /// Candidates that survived the cull.
  pub generated: usize,
  /// Candidates dropped for exceeding the cull threshold.
  pub culled: usize,
}

/// Tier 0 actors split by eligibility and volume membership.
#[derive(Clone, Debug, Default)]
pub struct ActorClassification {
  /// Eligible actors outside any HLOD volume.
  pub valid: Vec<ActorId>,
  /// Actors failing eligibility at this tier.
  pub rejected: Vec<ActorId>,
  /// One cluster per HLOD volume that received at least one actor.
  pub volume_clusters: Vec<(VolumeId, LodCluster)>,
}

/// Builds candidate graphs for one build pass.
#[derive(Clone, Copy, Debug)]
pub struct ClusterGraphBuilder {
  cull_threshold: f64,
  cost_scale: f64,
}

impl ClusterGraphBuilder {
  /// Builder for build pass `pass` of `config`.
  pub fn new(config: &HlodConfig, pass: usize) -> Result<Self> {
    Ok(Self {
      cull_threshold: config.cull_threshold(pass)?,
      cost_scale: config.cost_space_scale(),
    })
  }

  /// Highest cost a candidate may have.
  #[inline]
  pub fn cull_threshold(&self) -> f64 {
    self.cull_threshold
  }

  /// Cost-space entry for a scene actor.
  pub fn actor_entry(&self, query: &dyn ActorQuery, actor: ActorId) -> Option<MemberEntry> {
    let bounds = query.bounds(actor)?;
    Some(MemberEntry::new(actor, bounds.scaled(self.cost_scale)))
  }

  /// Cost-space entry wrapping an existing node.
  pub fn node_entry(&self, hierarchy: &Hierarchy, node: NodeId) -> Option<MemberEntry> {
    let bounds = hierarchy.node(node)?.bounds();
    Some(MemberEntry::new(node, bounds.scaled(self.cost_scale)))
  }

  /// Split the level's actors for build pass `pass`.
  ///
  /// Eligible actors inside an HLOD volume join that volume's cluster, which
  /// is seeded with the volume's own sphere. With `volumes_only` the
  /// remaining eligible actors are not returned as valid. Eligibility and
  /// bounds come from `query`; `level` supplies the actor list and volumes.
  pub fn classify_actors(
    &self,
    level: &Level,
    query: &dyn ActorQuery,
    hierarchy: &Hierarchy,
    pass: usize,
    volumes_only: bool,
  ) -> ActorClassification {
    let mut out = ActorClassification::default();
    let mut seeds: Vec<(VolumeId, LodCluster)> = Vec::new();

    for actor in level.actors() {
      if !hierarchy.should_include(query, actor.id, pass) {
        out.rejected.push(actor.id);
        continue;
      }
      let Some(entry) = self.actor_entry(query, actor.id) else {
        continue;
      };

      match level.volume_for(actor) {
        Some(volume) => {
          let index = match seeds.iter().position(|(id, _)| *id == volume.id) {
            Some(index) => index,
            None => {
              seeds.push((volume.id, LodCluster::seeded(volume.sphere().scaled(self.cost_scale))));
              seeds.len() - 1
            }
          };
          // Entry clusters are always valid.
          let _ = seeds[index].1.merge_in(&LodCluster::from_entry(entry));
        }
        None if volumes_only => {}
        None => out.valid.push(actor.id),
      }
    }

    out.volume_clusters = seeds;
    out
  }

  /// Generate, cull and sort candidates over `elements`.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "graph::build"))]
  pub fn build(&self, elements: &[MemberEntry]) -> ClusterGraph {
    match elements.len() {
      0 => return ClusterGraph::default(),
      1 => {
        return ClusterGraph {
          candidates: vec![LodCluster::from_entry(elements[0])],
          generated: 1,
          culled: 0,
        }
      }
      _ => {}
    }

    let n = elements.len();
    let threshold = self.cull_threshold;
    let mut candidates: Vec<LodCluster> = (0..n)
      .into_par_iter()
      .flat_map_iter(|i| (i + 1..n).map(move |j| LodCluster::pair(elements[i], elements[j])))
      .filter(|candidate| candidate.cached_cost() <= threshold)
      .collect();

    candidates.par_sort_by(|a, b| cost::compare_cost(a.cached_cost(), b.cached_cost()));

    let total = n * (n - 1) / 2;
    let generated = candidates.len();
    tracing::debug!(elements = n, generated, culled = total - generated, threshold, "built cluster graph");

    ClusterGraph {
      candidates,
      generated,
      culled: total - generated,
    }
  }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;
