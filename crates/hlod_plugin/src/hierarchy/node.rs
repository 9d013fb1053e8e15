//! HierarchyNode - a built cluster (proxy mesh owner).

use glam::DVec3;

use crate::bounds::SpatialBounds;
use crate::proxy::ProxyKey;
use crate::types::{AssetId, ClusterMember, NodeId, VolumeId};

/// One immediate member of a node with the placement data captured when it
/// joined.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubMember {
  pub member: ClusterMember,
  /// Actor pivot or child node location.
  pub location: DVec3,
  /// World-space bounding sphere.
  pub bounds: SpatialBounds,
}

/// Generated proxy mesh assigned to a node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProxyMesh {
  pub asset: AssetId,
  pub origin: DVec3,
  /// Bounding sphere radius of the merged mesh.
  pub radius: f64,
}

/// Hierarchy node: the members merged into one proxy at `tier`.
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyNode {
  pub(crate) id: NodeId,
  /// 1-based; tier 0 is the raw scene.
  pub(crate) tier: usize,
  pub(crate) sub_members: Vec<SubMember>,
  pub(crate) bounds: SpatialBounds,
  pub(crate) location: DVec3,
  pub(crate) proxy_key: Option<ProxyKey>,
  pub(crate) mesh: Option<ProxyMesh>,
  pub(crate) draw_distance: f64,
  pub(crate) dirty: bool,
  /// HLOD volume the tier 1 cluster came from, carried up reused tiers.
  pub(crate) volume: Option<VolumeId>,
}

impl HierarchyNode {
  pub(crate) fn new(id: NodeId, tier: usize, sub_members: Vec<SubMember>) -> Self {
    let mut node = Self {
      id,
      tier,
      sub_members,
      bounds: SpatialBounds::EMPTY,
      location: DVec3::ZERO,
      proxy_key: None,
      mesh: None,
      draw_distance: 0.0,
      dirty: true,
      volume: None,
    };
    node.refresh_placement();
    node
  }

  #[inline]
  pub fn id(&self) -> NodeId {
    self.id
  }

  /// 1-based hierarchy tier.
  #[inline]
  pub fn tier(&self) -> usize {
    self.tier
  }

  /// Build pass index (`tier - 1`), used to look up tier settings.
  #[inline]
  pub fn build_pass(&self) -> usize {
    self.tier.saturating_sub(1)
  }

  pub fn sub_members(&self) -> &[SubMember] {
    &self.sub_members
  }

  pub fn members(&self) -> impl Iterator<Item = ClusterMember> + '_ {
    self.sub_members.iter().map(|s| s.member)
  }

  pub fn has_member(&self, member: ClusterMember) -> bool {
    self.sub_members.iter().any(|s| s.member == member)
  }

  /// Combined world-space bounds of the members.
  #[inline]
  pub fn bounds(&self) -> SpatialBounds {
    self.bounds
  }

  /// Unweighted centroid of the member locations.
  #[inline]
  pub fn location(&self) -> DVec3 {
    self.location
  }

  pub fn proxy_key(&self) -> Option<&ProxyKey> {
    self.proxy_key.as_ref()
  }

  pub fn mesh(&self) -> Option<&ProxyMesh> {
    self.mesh.as_ref()
  }

  #[inline]
  pub fn draw_distance(&self) -> f64 {
    self.draw_distance
  }

  /// Set when membership or build state changed since the last finalize.
  #[inline]
  pub fn is_dirty(&self) -> bool {
    self.dirty
  }

  pub fn volume(&self) -> Option<VolumeId> {
    self.volume
  }

  /// A mesh was assigned under some key. Whether that key is still current
  /// is checked against the content store.
  #[inline]
  pub fn has_proxy(&self) -> bool {
    self.mesh.is_some() && self.proxy_key.is_some()
  }

  /// Drop the proxy key so the next build regenerates the mesh.
  pub fn force_unbuilt(&mut self) {
    self.proxy_key = None;
    self.dirty = true;
  }

  /// Membership changed: the current proxy no longer represents the node.
  pub(crate) fn invalidate_proxy(&mut self) {
    self.proxy_key = None;
    self.mesh = None;
    self.dirty = true;
  }

  pub(crate) fn push_member(&mut self, sub: SubMember) {
    if !self.has_member(sub.member) {
      self.sub_members.push(sub);
      self.refresh_placement();
    }
  }

  pub(crate) fn remove_member(&mut self, member: ClusterMember) -> bool {
    let before = self.sub_members.len();
    self.sub_members.retain(|s| s.member != member);
    let removed = self.sub_members.len() != before;
    if removed {
      self.refresh_placement();
    }
    removed
  }

  /// Recompute centroid and bounds from the current members.
  pub(crate) fn refresh_placement(&mut self) {
    if self.sub_members.is_empty() {
      self.location = DVec3::ZERO;
      self.bounds = SpatialBounds::EMPTY;
      return;
    }

    let sum: DVec3 = self.sub_members.iter().map(|s| s.location).sum();
    self.location = sum / self.sub_members.len() as f64;
    self.bounds = self
      .sub_members
      .iter()
      .fold(SpatialBounds::EMPTY, |acc, s| acc.combine(&s.bounds));
  }
}
