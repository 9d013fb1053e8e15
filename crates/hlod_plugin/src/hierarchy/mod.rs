//! HLOD hierarchy: node arena, multi-tier builder and cluster editing.
//!
//! Nodes are owned by [`Hierarchy`] and referenced by [`NodeId`]. Membership
//! is tracked in both directions: each node lists its immediate members and
//! the arena maps every clustered member back to its parent node.

mod builder;
pub mod draw_distance;
mod node;

use std::collections::{BTreeMap, HashMap};

pub use builder::HierarchyBuilder;
pub use node::{HierarchyNode, ProxyMesh, SubMember};

use crate::config::TierSettings;
use crate::error::{HlodError, Result};
use crate::proxy::ContentStore;
use crate::scene::{ActorQuery, ClusterEligibility, Level};
use crate::types::{ActorId, ClusterMember, NodeId};

// =============================================================================
// MeshRequest
// =============================================================================

/// How a node's proxy mesh is produced when the node is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshRequest {
  /// Clusters only (preview); no mesh work.
  Skip,
  /// Blocking merge through the merge service.
  Blocking,
  /// Asynchronous proxy job, finalized by a later tick.
  Deferred,
  /// `Deferred` for tiers with `simplify_mesh`, `Blocking` otherwise.
  Auto,
}

impl MeshRequest {
  /// Resolve `Auto` against the tier settings.
  pub fn resolve(self, settings: &TierSettings) -> MeshRequest {
    match self {
      MeshRequest::Auto if settings.simplify_mesh => MeshRequest::Deferred,
      MeshRequest::Auto => MeshRequest::Blocking,
      other => other,
    }
  }
}

impl From<bool> for MeshRequest {
  /// `true` merges immediately, `false` enqueues a proxy job.
  fn from(create_mesh: bool) -> Self {
    if create_mesh {
      MeshRequest::Blocking
    } else {
      MeshRequest::Deferred
    }
  }
}

// =============================================================================
// Hierarchy
// =============================================================================

/// Arena of hierarchy nodes for one level.
#[derive(Debug, Default)]
pub struct Hierarchy {
  nodes: BTreeMap<NodeId, HierarchyNode>,
  parents: HashMap<ClusterMember, NodeId>,
  next_id: u64,
  dirty: bool,
}

impl Hierarchy {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn node(&self, id: NodeId) -> Option<&HierarchyNode> {
    self.nodes.get(&id)
  }

  pub fn node_mut(&mut self, id: NodeId) -> Option<&mut HierarchyNode> {
    self.nodes.get_mut(&id)
  }

  pub(crate) fn get(&self, id: NodeId) -> Result<&HierarchyNode> {
    self.nodes.get(&id).ok_or(HlodError::UnknownNode(id))
  }

  pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut HierarchyNode> {
    self.nodes.get_mut(&id).ok_or(HlodError::UnknownNode(id))
  }

  /// Nodes in creation order.
  pub fn nodes(&self) -> impl Iterator<Item = &HierarchyNode> {
    self.nodes.values()
  }

  /// Node ids at a 1-based tier, in creation order.
  pub fn nodes_at_tier(&self, tier: usize) -> Vec<NodeId> {
    self.nodes.values().filter(|n| n.tier == tier).map(|n| n.id).collect()
  }

  /// Highest populated tier, 0 when empty.
  pub fn max_tier(&self) -> usize {
    self.nodes.values().map(|n| n.tier).max().unwrap_or(0)
  }

  /// Node directly containing `member`.
  pub fn parent_of(&self, member: impl Into<ClusterMember>) -> Option<NodeId> {
    self.parents.get(&member.into()).copied()
  }

  pub fn is_clustered(&self, member: impl Into<ClusterMember>) -> bool {
    self.parent_of(member).is_some()
  }

  /// Scene eligibility plus the clustered check.
  pub fn eligibility(&self, level: &Level, actor: ActorId, tier: usize) -> ClusterEligibility {
    match level.eligibility(actor, tier) {
      ClusterEligibility::Valid if self.is_clustered(actor) => ClusterEligibility::AlreadyClustered,
      other => other,
    }
  }

  /// The host's inclusion predicate plus the clustered check. Builds go
  /// through this, so a custom [`ActorQuery`] applies its own rules.
  pub fn should_include(&self, query: &dyn ActorQuery, actor: ActorId, tier: usize) -> bool {
    query.should_include(actor, tier) && !self.is_clustered(actor)
  }

  /// Scene actors under `node`, depth first in member order.
  pub fn leaf_actors(&self, node: NodeId) -> Vec<ActorId> {
    let mut out = Vec::new();
    self.collect_leaves(node, &mut out);
    out
  }

  fn collect_leaves(&self, node: NodeId, out: &mut Vec<ActorId>) {
    let Some(node) = self.nodes.get(&node) else {
      return;
    };
    for sub in &node.sub_members {
      match sub.member {
        ClusterMember::Leaf(actor) => out.push(actor),
        ClusterMember::Group(child) => self.collect_leaves(child, out),
      }
    }
  }

  /// Container dirty flag: set whenever a node is created, destroyed,
  /// edited or finalized.
  #[inline]
  pub fn is_dirty(&self) -> bool {
    self.dirty
  }

  #[inline]
  pub fn mark_dirty(&mut self) {
    self.dirty = true;
  }

  /// Read and reset the container dirty flag.
  pub fn take_dirty(&mut self) -> bool {
    std::mem::take(&mut self.dirty)
  }

  // ===========================================================================
  // Node creation / destruction
  // ===========================================================================

  fn resolve_member(&self, member: ClusterMember, query: &dyn ActorQuery) -> Option<SubMember> {
    match member {
      ClusterMember::Leaf(actor) => Some(SubMember {
        member,
        location: query.location(actor)?,
        bounds: query.bounds(actor)?,
      }),
      ClusterMember::Group(node) => {
        let node = self.nodes.get(&node)?;
        Some(SubMember {
          member,
          location: node.location,
          bounds: node.bounds,
        })
      }
    }
  }

  fn check_member_tier(&self, member: ClusterMember, tier: usize) -> Result<()> {
    if let ClusterMember::Group(child) = member {
      let child = self.get(child)?;
      if child.tier >= tier {
        return Err(HlodError::InvalidMember(member));
      }
    }
    Ok(())
  }

  /// Create a node at 1-based `tier` from `members`.
  ///
  /// Members already clustered elsewhere are moved. Leaves the scene no
  /// longer knows are skipped.
  pub(crate) fn create_node(
    &mut self,
    tier: usize,
    members: &[ClusterMember],
    query: &dyn ActorQuery,
    store: &mut dyn ContentStore,
  ) -> Result<NodeId> {
    if tier == 0 {
      return Err(HlodError::UnknownTier { tier, tiers: 0 });
    }
    for &member in members {
      self.check_member_tier(member, tier)?;
    }

    let mut subs = Vec::with_capacity(members.len());
    for &member in members {
      match self.resolve_member(member, query) {
        Some(sub) => subs.push(sub),
        None => tracing::warn!(%member, "skipping unresolvable cluster member"),
      }
    }
    if subs.is_empty() {
      return Err(HlodError::InvalidCluster);
    }

    for sub in &subs {
      if self.parents.contains_key(&sub.member) {
        self.remove_member(sub.member, store);
      }
    }
    // Detaching can empty (and destroy) a group that was itself listed.
    subs.retain(|s| match s.member {
      ClusterMember::Group(child) => self.nodes.contains_key(&child),
      ClusterMember::Leaf(_) => true,
    });
    if subs.is_empty() {
      return Err(HlodError::InvalidCluster);
    }

    let id = NodeId(self.next_id);
    self.next_id += 1;
    for sub in &subs {
      self.parents.insert(sub.member, id);
    }
    self.nodes.insert(id, HierarchyNode::new(id, tier, subs));
    self.dirty = true;
    Ok(id)
  }

  /// Create a node from hand-picked members (cluster editing).
  pub fn create_node_from_members(
    &mut self,
    tier: usize,
    members: &[ClusterMember],
    query: &dyn ActorQuery,
    store: &mut dyn ContentStore,
  ) -> Result<NodeId> {
    let id = self.create_node(tier, members, query, store)?;
    tracing::debug!(node = id.raw(), tier, members = members.len(), "created node from members");
    Ok(id)
  }

  /// Destroy a node, releasing its members and detaching it from its parent.
  pub fn destroy_node(&mut self, id: NodeId, store: &mut dyn ContentStore) -> Result<()> {
    let node = self.nodes.remove(&id).ok_or(HlodError::UnknownNode(id))?;
    for sub in &node.sub_members {
      if self.parents.get(&sub.member) == Some(&id) {
        self.parents.remove(&sub.member);
      }
    }
    store.remove_node(id);
    self.dirty = true;

    if self.parents.contains_key(&ClusterMember::Group(id)) {
      self.remove_member(ClusterMember::Group(id), store);
    }
    Ok(())
  }

  /// Destroy every node at or above 1-based `tier`. Returns the count.
  pub fn clear_tier(&mut self, tier: usize, store: &mut dyn ContentStore) -> usize {
    let mut doomed: Vec<(usize, NodeId)> = self
      .nodes
      .values()
      .filter(|n| n.tier >= tier)
      .map(|n| (n.tier, n.id))
      .collect();
    // Parents first so no cascade reaches a node still queued here.
    doomed.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut removed = 0;
    for (_, id) in doomed {
      if self.destroy_node(id, store).is_ok() {
        removed += 1;
      }
    }
    removed
  }

  /// Destroy every node.
  pub fn clear_all(&mut self, store: &mut dyn ContentStore) -> usize {
    let removed = self.clear_tier(1, store);
    self.parents.clear();
    removed
  }

  // ===========================================================================
  // Cluster editing
  // ===========================================================================

  /// Drop the node's proxy and mark its ancestors stale.
  fn invalidate_chain(&mut self, id: NodeId) {
    if let Some(node) = self.nodes.get_mut(&id) {
      node.invalidate_proxy();
    }
    let mut current = self.parents.get(&ClusterMember::Group(id)).copied();
    while let Some(parent) = current {
      match self.nodes.get_mut(&parent) {
        Some(node) => node.force_unbuilt(),
        None => break,
      }
      current = self.parents.get(&ClusterMember::Group(parent)).copied();
    }
    self.dirty = true;
  }

  /// Refresh placement of `id` from its members and propagate up the chain.
  fn refresh_chain(&mut self, id: NodeId) {
    let mut current = Some(id);
    while let Some(node_id) = current {
      let Some(node) = self.nodes.get_mut(&node_id) else {
        break;
      };
      node.refresh_placement();
      let (location, bounds) = (node.location, node.bounds);

      current = self.parents.get(&ClusterMember::Group(node_id)).copied();
      if let Some(parent) = current.and_then(|p| self.nodes.get_mut(&p)) {
        for sub in parent.sub_members.iter_mut() {
          if sub.member == ClusterMember::Group(node_id) {
            sub.location = location;
            sub.bounds = bounds;
          }
        }
      }
    }
  }

  /// Add `member` to `node`, moving it out of any previous parent.
  pub fn add_member_to_node(
    &mut self,
    node: NodeId,
    member: impl Into<ClusterMember>,
    query: &dyn ActorQuery,
    store: &mut dyn ContentStore,
  ) -> Result<()> {
    let member = member.into();
    let tier = self.get(node)?.tier;
    if member == ClusterMember::Group(node) {
      return Err(HlodError::InvalidMember(member));
    }
    self.check_member_tier(member, tier)?;
    if self.parent_of(member) == Some(node) {
      return Ok(());
    }

    let sub = self
      .resolve_member(member, query)
      .ok_or(HlodError::InvalidMember(member))?;

    if self.parents.contains_key(&member) {
      self.remove_member(member, store);
    }
    // Detaching from the old parent can cascade into `node`.
    let target = self.get_mut(node)?;
    target.push_member(sub);
    self.parents.insert(member, node);
    self.invalidate_chain(node);
    self.refresh_chain(node);
    tracing::debug!(%member, node = node.raw(), "added member to node");
    Ok(())
  }

  /// Remove `member` from its parent. A parent left empty is destroyed,
  /// cascading upwards. Returns the former parent.
  pub fn remove_member(&mut self, member: impl Into<ClusterMember>, store: &mut dyn ContentStore) -> Option<NodeId> {
    let member = member.into();
    let parent = self.parents.remove(&member)?;
    let now_empty = match self.nodes.get_mut(&parent) {
      Some(node) => {
        node.remove_member(member);
        node.sub_members.is_empty()
      }
      None => return Some(parent),
    };

    if now_empty {
      tracing::debug!(node = parent.raw(), "destroying emptied node");
      let _ = self.destroy_node(parent, store);
    } else {
      self.invalidate_chain(parent);
      self.refresh_chain(parent);
    }
    Some(parent)
  }

  /// Move every member of `source` into `target` and destroy `source`.
  pub fn merge_nodes(&mut self, target: NodeId, source: NodeId, store: &mut dyn ContentStore) -> Result<()> {
    if target == source {
      return Err(HlodError::InvalidMember(ClusterMember::Group(source)));
    }
    let target_tier = self.get(target)?.tier;
    let subs = self.get(source)?.sub_members.clone();
    for sub in &subs {
      if sub.member == ClusterMember::Group(target) {
        return Err(HlodError::InvalidMember(sub.member));
      }
      self.check_member_tier(sub.member, target_tier)?;
    }

    for sub in subs {
      self.parents.insert(sub.member, target);
      self.get_mut(target)?.push_member(sub);
    }
    self.get_mut(source)?.sub_members.clear();
    self.destroy_node(source, store)?;

    self.invalidate_chain(target);
    self.refresh_chain(target);
    tracing::debug!(target = target.raw(), source = source.raw(), "merged nodes");
    Ok(())
  }

  /// Disable auto LOD on a scene actor and pull it out of its cluster.
  pub fn exclude_actor(
    &mut self,
    level: &mut Level,
    actor: ActorId,
    store: &mut dyn ContentStore,
  ) -> Result<Option<NodeId>> {
    let scene_actor = level
      .actor_mut(actor)
      .ok_or(HlodError::InvalidMember(ClusterMember::Leaf(actor)))?;
    scene_actor.enable_auto_lod = false;
    Ok(self.remove_member(actor, store))
  }
}
