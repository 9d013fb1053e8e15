//! HlodSystem - per-level HLOD container.
//!
//! Owns the configuration, node hierarchy, proxy job processor and content
//! store for one level, and holds the merge service used for proxy builds.
//! The level itself stays with the caller and is passed into each build.

use std::sync::Arc;

use crate::config::HlodConfig;
use crate::error::Result;
use crate::hierarchy::{Hierarchy, HierarchyBuilder, MeshRequest};
use crate::proxy::build::{collect_components, is_node_current, key_for};
use crate::proxy::{ContentStore, MemoryContentStore, MeshMergeService, MeshOutcome, NodeBuildContext, ProxyJobProcessor};
use crate::scene::Level;
use crate::stats::{BuildSummary, TickReport};
use crate::types::{ActorId, ClusterMember, NodeId};

/// Per-level HLOD state, generic over the proxy content store.
pub struct HlodSystem<S: ContentStore = MemoryContentStore> {
  config: HlodConfig,
  hierarchy: Hierarchy,
  processor: ProxyJobProcessor,
  store: S,
  service: Arc<dyn MeshMergeService>,
}

impl HlodSystem<MemoryContentStore> {
  /// System with an in-memory store. Fails if `config` does not validate.
  pub fn new(config: HlodConfig, service: Arc<dyn MeshMergeService>) -> Result<Self> {
    Self::with_store(config, service, MemoryContentStore::new())
  }
}

impl<S: ContentStore> HlodSystem<S> {
  pub fn with_store(config: HlodConfig, service: Arc<dyn MeshMergeService>, store: S) -> Result<Self> {
    config.validate()?;
    Ok(Self {
      config,
      hierarchy: Hierarchy::new(),
      processor: ProxyJobProcessor::new(),
      store,
      service,
    })
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  #[inline]
  pub fn config(&self) -> &HlodConfig {
    &self.config
  }

  #[inline]
  pub fn hierarchy(&self) -> &Hierarchy {
    &self.hierarchy
  }

  #[inline]
  pub fn processor(&self) -> &ProxyJobProcessor {
    &self.processor
  }

  #[inline]
  pub fn store(&self) -> &S {
    &self.store
  }

  /// Read and reset the hierarchy's dirty flag.
  pub fn take_dirty(&mut self) -> bool {
    self.hierarchy.take_dirty()
  }

  fn context<'a>(&'a mut self, level: &'a Level) -> NodeBuildContext<'a> {
    NodeBuildContext::new(
      &self.config,
      level,
      &mut self.hierarchy,
      &mut self.store,
      self.service.as_ref(),
      &self.processor,
    )
  }

  // ===========================================================================
  // Building
  // ===========================================================================

  /// Rebuild every tier of `level` from scratch.
  ///
  /// Outstanding proxy jobs are dropped first. With `create_meshes` each new
  /// node gets its proxy (blocking or as a job, per tier); without, only the
  /// clusters are built.
  pub fn build(&mut self, level: &Level, create_meshes: bool) -> Result<BuildSummary> {
    self.processor.clear_all();
    let request = if create_meshes {
      MeshRequest::Auto
    } else {
      MeshRequest::Skip
    };
    let summary = HierarchyBuilder::new(level, request).build_all_tiers(&mut self.context(level))?;
    tracing::info!(
      level = %level.name,
      tiers = summary.tiers_built,
      nodes = summary.nodes_built,
      meshes = summary.succeeded(),
      failed = summary.meshes_failed,
      "HLOD build finished"
    );
    Ok(summary)
  }

  /// Cluster preview: rebuild nodes without proxies.
  pub fn build_clusters(&mut self, level: &Level) -> Result<BuildSummary> {
    self.build(level, false)
  }

  /// Build proxies for existing nodes, lowest tier first.
  ///
  /// Nodes whose stored proxy still matches their key are left alone unless
  /// `force_all` is set. A node that cannot be requested is counted as failed
  /// and the batch goes on.
  pub fn build_meshes(&mut self, level: &Level, force_all: bool) -> Result<BuildSummary> {
    if !self.config.enabled {
      tracing::warn!(level = %level.name, "HLOD system disabled, no meshes built");
      return Ok(BuildSummary::default());
    }

    let max_tier = self.hierarchy.max_tier();
    let mut ctx = self.context(level);
    for tier in 1..=max_tier {
      for node in ctx.hierarchy.nodes_at_tier(tier) {
        if force_all {
          if let Some(target) = ctx.hierarchy.node_mut(node) {
            target.force_unbuilt();
          }
        }
        if let Err(err) = ctx.request_mesh(node, MeshRequest::Auto) {
          tracing::warn!(node = node.raw(), tier, %err, "mesh request failed");
          ctx.summary.meshes_failed += 1;
        }
      }
    }

    let summary = std::mem::take(&mut ctx.summary);
    tracing::info!(
      level = %level.name,
      built = summary.meshes_built,
      queued = summary.meshes_queued,
      up_to_date = summary.meshes_up_to_date,
      failed = summary.meshes_failed,
      "HLOD mesh build finished"
    );
    Ok(summary)
  }

  /// Build (or confirm) one node's proxy.
  pub fn build_node_mesh(
    &mut self,
    level: &Level,
    node: NodeId,
    request: impl Into<MeshRequest>,
  ) -> Result<MeshOutcome> {
    self.context(level).request_mesh(node, request.into())
  }

  /// Whether `node` has a proxy matching its current inputs and no job in
  /// flight.
  pub fn is_node_built(&self, level: &Level, node: NodeId) -> bool {
    if self.processor.job_for_node(node).is_some() {
      return false;
    }
    let key = collect_components(&self.hierarchy, level, node)
      .and_then(|components| key_for(&self.config, &self.hierarchy, &self.store, node, &components));
    match key {
      Ok(key) => is_node_current(&self.hierarchy, &self.store, node, &key),
      Err(_) => false,
    }
  }

  /// Whether a mesh build would do anything. With `force` any node counts.
  pub fn needs_build(&self, level: &Level, force: bool) -> bool {
    if force {
      return !self.hierarchy.is_empty();
    }
    self.hierarchy.nodes().any(|node| !self.is_node_built(level, node.id()))
  }

  // ===========================================================================
  // Jobs
  // ===========================================================================

  /// Finalize delivered proxy jobs. Call once per frame from one thread.
  pub fn tick(&mut self) -> TickReport {
    self.processor.tick(&mut self.hierarchy, &mut self.store, &self.config)
  }

  #[inline]
  pub fn is_any_job_running(&self) -> bool {
    self.processor.is_any_job_running()
  }

  // ===========================================================================
  // Clearing
  // ===========================================================================

  /// Destroy nodes at or above 1-based `tier`.
  pub fn clear_tier(&mut self, tier: usize) -> usize {
    self.hierarchy.clear_tier(tier, &mut self.store)
  }

  /// Destroy every node and drop all proxy jobs.
  pub fn clear_all(&mut self) -> usize {
    self.processor.clear_all();
    self.hierarchy.clear_all(&mut self.store)
  }

  // ===========================================================================
  // Configuration
  // ===========================================================================

  /// Swap in `new`. Nodes of tiers whose settings changed lose their proxy.
  pub fn reload_config(&mut self, new: HlodConfig) -> Result<Vec<usize>> {
    let changed = self.config.reload(new)?;
    let mut invalidated = 0;
    for &pass in &changed {
      for node in self.hierarchy.nodes_at_tier(pass + 1) {
        if let Some(target) = self.hierarchy.node_mut(node) {
          target.force_unbuilt();
          invalidated += 1;
        }
      }
    }
    if invalidated > 0 {
      self.hierarchy.mark_dirty();
    }
    tracing::info!(tiers = ?changed, invalidated, "HLOD config reloaded");
    Ok(changed)
  }

  /// Runtime draw distance of `node` after overrides and scaling.
  pub fn effective_draw_distance(&self, node: NodeId) -> Option<f64> {
    let target = self.hierarchy.node(node)?;
    Some(
      self
        .config
        .effective_draw_distance(target.build_pass(), target.draw_distance()),
    )
  }

  // ===========================================================================
  // Cluster editing
  // ===========================================================================

  pub fn create_node_from_members(&mut self, level: &Level, tier: usize, members: &[ClusterMember]) -> Result<NodeId> {
    let node = self
      .hierarchy
      .create_node_from_members(tier, members, level, &mut self.store)?;
    self.context(level).assign_draw_distance(node)?;
    Ok(node)
  }

  pub fn add_member_to_node(&mut self, level: &Level, node: NodeId, member: impl Into<ClusterMember>) -> Result<()> {
    self.hierarchy.add_member_to_node(node, member, level, &mut self.store)?;
    self.context(level).assign_draw_distance(node)
  }

  /// Remove `member` from its node. Returns the former parent.
  pub fn remove_member(&mut self, member: impl Into<ClusterMember>) -> Option<NodeId> {
    self.hierarchy.remove_member(member, &mut self.store)
  }

  pub fn merge_nodes(&mut self, level: &Level, target: NodeId, source: NodeId) -> Result<()> {
    self.hierarchy.merge_nodes(target, source, &mut self.store)?;
    self.context(level).assign_draw_distance(target)
  }

  /// Turn off auto LOD on `actor` and pull it out of its node.
  pub fn exclude_actor(&mut self, level: &mut Level, actor: ActorId) -> Result<Option<NodeId>> {
    self.hierarchy.exclude_actor(level, actor, &mut self.store)
  }
}

#[cfg(test)]
#[path = "system_test.rs"]
mod system_test;
