//! HierarchyBuilder - runs graph building, merging and node creation for
//! every configured tier of a level.
//!
//! Pass `t` (tier `t + 1`) either clusters fresh candidates (scene actors at
//! pass 0; previous tier nodes plus leftover actors above) or wraps each
//! previous tier node in its own cluster when the tier reuses clusters.
//! Nodes a pass does not absorb stay available to the passes above it.

use crate::cluster::LodCluster;
use crate::config::TierSettings;
use crate::error::Result;
use crate::graph::ClusterGraphBuilder;
use crate::merger::ClusterMerger;
use crate::proxy::NodeBuildContext;
use crate::scene::Level;
use crate::stats::BuildSummary;
use crate::types::{ActorId, ClusterMember, NodeId, VolumeId};

use super::MeshRequest;

/// Actor lists carried from one pass to the next.
#[derive(Default)]
struct PassState {
  /// Eligible actors not yet in any node.
  valid: Vec<ActorId>,
  /// Actors that failed eligibility at pass 0.
  rejected: Vec<ActorId>,
  /// Unparented nodes offered to the next pass.
  previous: Vec<NodeId>,
}

impl PassState {
  fn release(&mut self, cluster: &LodCluster) {
    self.valid.retain(|&a| !cluster.has_member(ClusterMember::Leaf(a)));
    self.rejected.retain(|&a| !cluster.has_member(ClusterMember::Leaf(a)));
  }
}

/// Builds all tiers of one level into the context's hierarchy.
pub struct HierarchyBuilder<'l> {
  level: &'l Level,
  request: MeshRequest,
}

impl<'l> HierarchyBuilder<'l> {
  /// `level` supplies actors and volumes; eligibility, bounds and
  /// components come from the context's `query`, which may wrap `level`.
  pub fn new(level: &'l Level, request: MeshRequest) -> Self {
    Self { level, request }
  }

  fn include(&self, ctx: &NodeBuildContext<'_>, actor: ActorId, pass: usize) -> bool {
    ctx.hierarchy.should_include(ctx.query, actor, pass)
  }

  /// Clear the hierarchy and rebuild every tier.
  ///
  /// A disabled system or a hidden level builds nothing. Clusters that fail
  /// to build are logged and skipped.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "hierarchy::build_all_tiers"))]
  pub fn build_all_tiers(&self, ctx: &mut NodeBuildContext<'_>) -> Result<BuildSummary> {
    let config = ctx.config;
    if !config.enabled {
      tracing::warn!(level = %self.level.name, "HLOD system disabled, nothing built");
      return Ok(BuildSummary::default());
    }
    if !self.level.visible {
      tracing::warn!(level = %self.level.name, "level hidden, HLODs are not built for hidden levels");
      return Ok(BuildSummary::default());
    }

    let cleared = ctx.hierarchy.clear_all(ctx.store);
    if cleared > 0 {
      tracing::debug!(level = %self.level.name, cleared, "cleared previous hierarchy");
    }

    if config.generate_single_cluster {
      self.build_single_clusters(ctx)?;
    } else {
      let mut state = PassState::default();
      for pass in 0..config.tier_count() {
        let settings = config.tier(pass)?;
        let input = state.previous.clone();
        let nodes = match pass.checked_sub(1) {
          Some(prev) if settings.reuse_previous_tier_clusters => {
            self.reuse_pass(ctx, pass, config.tier(prev)?, &mut state)?
          }
          _ => self.cluster_pass(ctx, pass, settings, &mut state)?,
        };

        let carried: Vec<NodeId> = input
          .into_iter()
          .filter(|&node| ctx.hierarchy.node(node).is_some() && !ctx.hierarchy.is_clustered(node))
          .collect();

        ctx.summary.tiers_built += 1;
        tracing::info!(
          level = %self.level.name,
          tier = pass + 1,
          nodes = nodes.len(),
          carried = carried.len(),
          leftover = state.valid.len(),
          "built HLOD tier"
        );
        state.previous = carried;
        state.previous.extend(nodes);
      }
    }

    Ok(std::mem::take(&mut ctx.summary))
  }

  /// Pairwise clustering for one pass.
  fn cluster_pass(
    &self,
    ctx: &mut NodeBuildContext<'_>,
    pass: usize,
    settings: &TierSettings,
    state: &mut PassState,
  ) -> Result<Vec<NodeId>> {
    let graph_builder = ClusterGraphBuilder::new(ctx.config, pass)?;
    let merger = ClusterMerger::from_config(ctx.config, pass)?;

    let mut elements = Vec::new();
    let mut volume_clusters = Vec::new();
    if pass == 0 {
      let split = graph_builder.classify_actors(
        self.level,
        ctx.query,
        ctx.hierarchy,
        pass,
        settings.only_generate_clusters_for_volumes,
      );
      state.valid = split.valid;
      state.rejected = split.rejected;
      volume_clusters = split.volume_clusters;
    } else {
      elements.extend(
        state
          .previous
          .iter()
          .filter_map(|&node| graph_builder.node_entry(ctx.hierarchy, node)),
      );
    }
    for &actor in &state.valid {
      if self.include(ctx, actor, pass) {
        elements.extend(graph_builder.actor_entry(ctx.query, actor));
      }
    }

    let graph = graph_builder.build(&elements);
    ctx.summary.candidates_generated += graph.generated;
    ctx.summary.candidates_culled += graph.culled;

    let mut clusters = graph.candidates;
    let stats = merger.run(&mut clusters);
    ctx.summary.merges += stats.merges;
    ctx.summary.subtractions += stats.subtractions;

    let min_members = settings.min_actors_to_build;
    let acceptance = ClusterMerger::accept(clusters, min_members);
    ctx.summary.clusters_rejected += acceptance.rejected;

    let mut nodes = Vec::new();
    for cluster in &acceptance.accepted {
      nodes.extend(self.build_cluster(ctx, pass, cluster, None, state));
    }

    for (volume, cluster) in &volume_clusters {
      if !cluster.is_valid() {
        continue;
      }
      if cluster.len() < min_members {
        ctx.summary.clusters_rejected += 1;
        // Volume actors never entered the valid list; offer them to later tiers.
        let returned: Vec<ActorId> = cluster
          .members()
          .filter_map(|m| m.as_leaf())
          .filter(|a| !state.valid.contains(a))
          .collect();
        state.valid.extend(returned);
        continue;
      }
      nodes.extend(self.build_cluster(ctx, pass, cluster, Some(*volume), state));
    }

    Ok(nodes)
  }

  /// One cluster per previous tier node, extended with re-admitted actors.
  fn reuse_pass(
    &self,
    ctx: &mut NodeBuildContext<'_>,
    pass: usize,
    previous_settings: &TierSettings,
    state: &mut PassState,
  ) -> Result<Vec<NodeId>> {
    let graph_builder = ClusterGraphBuilder::new(ctx.config, pass)?;
    let settings = ctx.config.tier(pass)?;
    let volumes_only = settings.only_generate_clusters_for_volumes;
    let reassess = previous_settings.allow_specific_exclusion;

    let mut nodes = Vec::new();
    for prev in std::mem::take(&mut state.previous) {
      let Some(prev_node) = ctx.hierarchy.node(prev) else {
        continue;
      };
      let (prev_bounds, prev_volume) = (prev_node.bounds(), prev_node.volume());
      let Some(entry) = graph_builder.node_entry(ctx.hierarchy, prev) else {
        continue;
      };
      let mut cluster = LodCluster::from_entry(entry);

      let mut admitted: Vec<ActorId> = Vec::new();
      if volumes_only {
        if let Some(volume) = prev_volume.and_then(|id| self.level.volume(id)) {
          for &actor in &state.valid {
            let inside = self.level.actor(actor).is_some_and(|a| volume.encompasses_pivot(a));
            if inside && self.include(ctx, actor, pass) {
              admitted.push(actor);
            }
          }
          if reassess {
            for &actor in &state.rejected {
              let inside = self.level.actor(actor).is_some_and(|a| volume.encompasses_pivot(a));
              if inside && self.newly_eligible(ctx, actor, pass) {
                admitted.push(actor);
              }
            }
          }
        }
      } else if reassess {
        for &actor in &state.rejected {
          let Some(scene_actor) = self.level.actor(actor) else {
            continue;
          };
          let reach = crate::bounds::SpatialBounds::new(scene_actor.location, scene_actor.bounds.size().length());
          if reach.intersects(&prev_bounds) && self.newly_eligible(ctx, actor, pass) {
            admitted.push(actor);
          }
        }
      }

      for actor in admitted {
        if let Some(entry) = graph_builder.actor_entry(ctx.query, actor) {
          cluster.merge_in(&LodCluster::from_entry(entry))?;
        }
      }

      nodes.extend(self.build_cluster(ctx, pass, &cluster, prev_volume, state));
    }
    Ok(nodes)
  }

  /// Excluded at the previous pass, eligible at this one.
  fn newly_eligible(&self, ctx: &NodeBuildContext<'_>, actor: ActorId, pass: usize) -> bool {
    pass > 0 && !self.include(ctx, actor, pass - 1) && self.include(ctx, actor, pass)
  }

  /// One cluster per tier: every eligible actor at pass 0, then the previous
  /// node plus actors that became eligible.
  fn build_single_clusters(&self, ctx: &mut NodeBuildContext<'_>) -> Result<()> {
    let mut state = PassState::default();
    let mut previous: Option<NodeId> = None;
    let mut held_back: Vec<ActorId> = Vec::new();

    for pass in 0..ctx.config.tier_count() {
      let graph_builder = ClusterGraphBuilder::new(ctx.config, pass)?;
      let mut cluster = LodCluster::empty();

      match previous {
        None => {
          held_back.clear();
          for actor in self.level.actors() {
            if !self.include(ctx, actor.id, pass) {
              held_back.push(actor.id);
              continue;
            }
            if let Some(entry) = graph_builder.actor_entry(ctx.query, actor.id) {
              cluster.merge_in(&LodCluster::from_entry(entry))?;
            }
          }
        }
        Some(node) => {
          if let Some(entry) = graph_builder.node_entry(ctx.hierarchy, node) {
            cluster.merge_in(&LodCluster::from_entry(entry))?;
          }
          let (ready, waiting): (Vec<ActorId>, Vec<ActorId>) = held_back
            .iter()
            .partition(|&&actor| self.include(ctx, actor, pass));
          held_back = waiting;
          for actor in ready {
            if let Some(entry) = graph_builder.actor_entry(ctx.query, actor) {
              cluster.merge_in(&LodCluster::from_entry(entry))?;
            }
          }
        }
      }

      if cluster.is_valid() {
        if let Some(node) = self.build_cluster(ctx, pass, &cluster, None, &mut state) {
          previous = Some(node);
        }
      }
      ctx.summary.tiers_built += 1;
      tracing::info!(level = %self.level.name, tier = pass + 1, members = cluster.len(), "built single cluster tier");
    }
    Ok(())
  }

  fn build_cluster(
    &self,
    ctx: &mut NodeBuildContext<'_>,
    pass: usize,
    cluster: &LodCluster,
    volume: Option<VolumeId>,
    state: &mut PassState,
  ) -> Option<NodeId> {
    match cluster.build_node(ctx, pass, self.request) {
      Ok(node) => {
        if let Some(built) = ctx.hierarchy.node_mut(node) {
          built.volume = volume;
        }
        ctx.summary.nodes_built += 1;
        state.release(cluster);
        tracing::debug!(node = node.raw(), tier = pass + 1, members = cluster.len(), "built node");
        Some(node)
      }
      Err(err) => {
        tracing::warn!(tier = pass + 1, %cluster, %err, "skipping cluster");
        None
      }
    }
  }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod builder_test;
