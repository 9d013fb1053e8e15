//! Node mesh builds: key checks, blocking merges, job hand-off and the shared
//! finalize step.

use crate::config::HlodConfig;
use crate::error::{HlodError, Result};
use crate::hierarchy::draw_distance::tier_draw_distance;
use crate::hierarchy::{Hierarchy, MeshRequest, ProxyMesh};
use crate::scene::{ActorQuery, MeshComponent};
use crate::stats::BuildSummary;
use crate::types::{AssetId, NodeId};

use super::key::{KeyInputs, ProxyKey};
use super::processor::{JobId, ProxyJobProcessor};
use super::service::{AssetKind, MeshMergeService, ProxyAsset};
use super::store::ContentStore;

/// What a mesh request did for one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshOutcome {
  /// Mesh work was not requested.
  Skipped,
  /// No member carries a mergeable component; the node keeps no mesh.
  NoComponents,
  /// The stored proxy still matches the node's key.
  UpToDate,
  /// A job for this node is already in flight.
  AlreadyQueued(JobId),
  /// Proxy job handed to the merge service.
  Queued(JobId),
  /// Blocking merge finished and the mesh was assigned.
  Built,
  /// The merge produced no usable mesh; the node stays unbuilt.
  Failed,
}

/// Everything a node build touches, borrowed for the duration of one build.
pub struct NodeBuildContext<'a> {
  pub config: &'a HlodConfig,
  pub query: &'a dyn ActorQuery,
  pub hierarchy: &'a mut Hierarchy,
  pub store: &'a mut dyn ContentStore,
  pub service: &'a dyn MeshMergeService,
  pub processor: &'a ProxyJobProcessor,
  /// Counters accumulated over the build.
  pub summary: BuildSummary,
}

impl<'a> NodeBuildContext<'a> {
  pub fn new(
    config: &'a HlodConfig,
    query: &'a dyn ActorQuery,
    hierarchy: &'a mut Hierarchy,
    store: &'a mut dyn ContentStore,
    service: &'a dyn MeshMergeService,
    processor: &'a ProxyJobProcessor,
  ) -> Self {
    Self {
      config,
      query,
      hierarchy,
      store,
      service,
      processor,
      summary: BuildSummary::default(),
    }
  }

  /// Set the node's draw distance from its member bounds.
  pub fn assign_draw_distance(&mut self, node: NodeId) -> Result<()> {
    let pass = self.hierarchy.get(node)?.build_pass();
    let settings = self.config.tier(pass)?;
    let target = self.hierarchy.get_mut(node)?;
    target.draw_distance = tier_draw_distance(settings, target.bounds.radius, &self.config.projection);
    Ok(())
  }

  /// Mergeable components of every scene actor under `node`.
  pub fn collect_components(&self, node: NodeId) -> Result<Vec<MeshComponent>> {
    collect_components(&*self.hierarchy, self.query, node)
  }

  /// Proxy key of `node` over `components`.
  pub fn key_for(&self, node: NodeId, components: &[MeshComponent]) -> Result<ProxyKey> {
    key_for(self.config, &*self.hierarchy, &*self.store, node, components)
  }

  /// Whether the node's assigned proxy was built under `key` and the store
  /// still holds it.
  pub fn is_node_current(&self, node: NodeId, key: &ProxyKey) -> bool {
    is_node_current(&*self.hierarchy, &*self.store, node, key)
  }

  /// Produce (or confirm) the proxy mesh for `node`.
  ///
  /// Merge failures are logged and reported as [`MeshOutcome::Failed`]; only
  /// unknown nodes or tiers are errors.
  pub fn request_mesh(&mut self, node: NodeId, request: MeshRequest) -> Result<MeshOutcome> {
    let outcome = self.request_mesh_inner(node, request)?;
    self.summary.record(outcome);
    Ok(outcome)
  }

  fn request_mesh_inner(&mut self, node: NodeId, request: MeshRequest) -> Result<MeshOutcome> {
    let pass = self.hierarchy.get(node)?.build_pass();
    let settings = self.config.tier(pass)?;

    let request = request.resolve(settings);
    if request == MeshRequest::Skip {
      return Ok(MeshOutcome::Skipped);
    }
    if let Some(job) = self.processor.job_for_node(node) {
      return Ok(MeshOutcome::AlreadyQueued(job));
    }

    let components = self.collect_components(node)?;
    if components.is_empty() {
      tracing::warn!(node = node.raw(), "no mergeable components, node left without proxy");
      return Ok(MeshOutcome::NoComponents);
    }

    let key = self.key_for(node, &components)?;
    if self.is_node_current(node, &key) {
      return Ok(MeshOutcome::UpToDate);
    }
    if let Some(target) = self.hierarchy.node_mut(node) {
      if target.proxy_key.is_some() {
        tracing::debug!(node = node.raw(), "proxy key stale, rebuilding");
        target.force_unbuilt();
      }
    }

    let proxy = settings.proxy.clone();
    match request {
      MeshRequest::Deferred => {
        let job = self.processor.enqueue_job(node, pass, proxy.clone(), key);
        self.service.create_proxy_mesh_async(
          components,
          proxy,
          self.config.base_material.clone(),
          job,
          self.processor.delivery_callback(),
        );
        Ok(MeshOutcome::Queued(job))
      }
      _ => {
        let location = self.hierarchy.get(node)?.location;
        let merged =
          self
            .service
            .merge_components_to_mesh(&components, &proxy, &self.config.base_material, location);
        let assets = match merged {
          Ok(output) => output.assets,
          Err(err) => {
            tracing::error!(node = node.raw(), %err, "blocking merge failed");
            return Ok(MeshOutcome::Failed);
          }
        };

        match finalize_node(self.hierarchy, self.store, self.config, node, pass, key, &assets) {
          Ok(()) => Ok(MeshOutcome::Built),
          Err(err @ HlodError::AssetBuildFailure { .. }) => {
            tracing::error!(%err, "proxy build failed");
            Ok(MeshOutcome::Failed)
          }
          Err(err) => Err(err),
        }
      }
    }
  }
}

pub(crate) fn collect_components(
  hierarchy: &Hierarchy,
  query: &dyn ActorQuery,
  node: NodeId,
) -> Result<Vec<MeshComponent>> {
  let pass = hierarchy.get(node)?.build_pass();
  Ok(
    hierarchy
      .leaf_actors(node)
      .into_iter()
      .flat_map(|actor| query.components(actor, pass))
      .collect(),
  )
}

pub(crate) fn key_for(
  config: &HlodConfig,
  hierarchy: &Hierarchy,
  store: &dyn ContentStore,
  node: NodeId,
  components: &[MeshComponent],
) -> Result<ProxyKey> {
  let target = hierarchy.get(node)?;
  let settings = config.tier(target.build_pass())?;
  Ok(store.generate_key(&KeyInputs {
    settings: &settings.proxy,
    base_material: &config.base_material,
    first_actor: hierarchy.leaf_actors(node).first().copied(),
    components,
  }))
}

pub(crate) fn is_node_current(hierarchy: &Hierarchy, store: &dyn ContentStore, node: NodeId, key: &ProxyKey) -> bool {
  let Some(target) = hierarchy.node(node) else {
    return false;
  };
  target.mesh.is_some() && target.proxy_key.as_ref() == Some(key) && store.contains_key(target.build_pass(), key)
}

/// Last mesh asset among `assets`; the merge service emits it after the
/// materials it references.
fn find_mesh(assets: &[ProxyAsset]) -> Option<ProxyMesh> {
  assets.iter().rev().find_map(|asset| match asset.kind {
    AssetKind::Mesh { origin, radius } => Some(ProxyMesh {
      asset: asset.id,
      origin,
      radius,
    }),
    _ => None,
  })
}

/// Assign delivered assets to `node` and record the proxy under `key`.
///
/// Standalone intermediates are cleaned whether or not a mesh was found.
/// Returns `UnknownNode` when the node was destroyed meanwhile and
/// `AssetBuildFailure` when no mesh asset was delivered; the node is left
/// untouched in both cases.
pub(crate) fn finalize_node(
  hierarchy: &mut Hierarchy,
  store: &mut dyn ContentStore,
  config: &HlodConfig,
  node: NodeId,
  pass: usize,
  key: ProxyKey,
  assets: &[ProxyAsset],
) -> Result<()> {
  let standalone: Vec<AssetId> = assets.iter().filter(|a| a.standalone).map(|a| a.id).collect();
  store.add_standalone(pass, &standalone);

  let result = assign_mesh(hierarchy, store, config, node, pass, key, assets);

  let cleaned = store.clean_standalone(pass);
  if cleaned > 0 {
    tracing::debug!(tier = pass, cleaned, "dropped standalone proxy assets");
  }
  result
}

fn assign_mesh(
  hierarchy: &mut Hierarchy,
  store: &mut dyn ContentStore,
  config: &HlodConfig,
  node: NodeId,
  pass: usize,
  key: ProxyKey,
  assets: &[ProxyAsset],
) -> Result<()> {
  hierarchy.get(node)?;
  let mesh = find_mesh(assets)
    .ok_or_else(|| HlodError::build_failure(node, format!("no mesh among {} delivered assets", assets.len())))?;
  let settings = config.tier(pass)?;
  let distance = tier_draw_distance(settings, mesh.radius, &config.projection);

  let target = hierarchy.get_mut(node)?;
  target.mesh = Some(mesh);
  target.draw_distance = distance;
  target.proxy_key = Some(key);
  target.dirty = false;

  store.add_mesh(pass, node, mesh.asset, key);
  hierarchy.mark_dirty();
  Ok(())
}
