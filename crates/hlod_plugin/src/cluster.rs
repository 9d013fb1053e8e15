//! LodCluster - candidate or accepted group of actors and nodes.
//!
//! Clusters live in cost space (meters): member bounds are converted by the
//! graph builder before they get here. Members are kept sorted and unique so
//! unions and subset tests are linear merges.

use std::fmt;
use std::ops::{Sub, SubAssign};

use smallvec::SmallVec;

use crate::bounds::SpatialBounds;
use crate::cost;
use crate::error::{HlodError, Result};
use crate::hierarchy::MeshRequest;
use crate::proxy::build::NodeBuildContext;
use crate::types::{ClusterMember, NodeId};

/// A cluster member together with its cost-space bounding sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemberEntry {
  pub member: ClusterMember,
  pub bounds: SpatialBounds,
}

impl MemberEntry {
  pub fn new(member: impl Into<ClusterMember>, bounds: SpatialBounds) -> Self {
    Self {
      member: member.into(),
      bounds,
    }
  }
}

/// Bounding sphere, filling factor and cached cost over a set of members.
///
/// A cluster without members is invalid: it cannot be merged, costed or
/// built. Volume seeds are the one exception, see [`LodCluster::seeded`].
#[derive(Clone, Debug, PartialEq)]
pub struct LodCluster {
  members: SmallVec<[MemberEntry; 4]>,
  bounds: SpatialBounds,
  filling_factor: f64,
  cost: f64,
}

impl LodCluster {
  /// Trivial single-member cluster with filling factor 1.
  pub fn new(member: impl Into<ClusterMember>, bounds: SpatialBounds) -> Self {
    Self::from_entry(MemberEntry::new(member, bounds))
  }

  pub fn from_entry(entry: MemberEntry) -> Self {
    let mut members = SmallVec::new();
    members.push(entry);
    let mut cluster = Self {
      members,
      bounds: entry.bounds,
      filling_factor: 1.0,
      cost: 0.0,
    };
    cluster.refresh_cost();
    cluster
  }

  /// Two-member candidate.
  pub fn pair(a: MemberEntry, b: MemberEntry) -> Self {
    let mut cluster = Self::from_entry(a);
    cluster.absorb(&Self::from_entry(b));
    cluster
  }

  /// Memberless cluster with preset bounds, used for HLOD volumes.
  ///
  /// Invalid until members are added with [`LodCluster::merge_in`]; the
  /// volume sphere stays part of the bounds.
  pub fn seeded(bounds: SpatialBounds) -> Self {
    let mut cluster = Self {
      members: SmallVec::new(),
      bounds,
      filling_factor: 1.0,
      cost: 0.0,
    };
    cluster.refresh_cost();
    cluster
  }

  /// Memberless cluster with empty bounds; the identity for `merge_in`.
  pub fn empty() -> Self {
    Self::seeded(SpatialBounds::EMPTY)
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  #[inline]
  pub fn is_valid(&self) -> bool {
    !self.members.is_empty()
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.members.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }

  #[inline]
  pub fn bounds(&self) -> SpatialBounds {
    self.bounds
  }

  #[inline]
  pub fn filling_factor(&self) -> f64 {
    self.filling_factor
  }

  /// Merge cost; fails on an invalid cluster.
  pub fn cost(&self) -> Result<f64> {
    if self.is_valid() {
      Ok(self.cost)
    } else {
      Err(HlodError::InvalidCluster)
    }
  }

  /// Cached cost without the validity check, for sorting.
  #[inline]
  pub fn cached_cost(&self) -> f64 {
    self.cost
  }

  /// Members in sorted order.
  pub fn members(&self) -> impl Iterator<Item = ClusterMember> + '_ {
    self.members.iter().map(|e| e.member)
  }

  pub fn entries(&self) -> &[MemberEntry] {
    &self.members
  }

  pub fn has_member(&self, member: ClusterMember) -> bool {
    self.members.binary_search_by(|e| e.member.cmp(&member)).is_ok()
  }

  /// True iff every member of `other` is a member of `self`.
  pub fn contains(&self, other: &LodCluster) -> bool {
    other.members.iter().all(|e| self.has_member(e.member))
  }

  /// True iff both clusters are valid and share at least one member.
  pub fn overlaps(&self, other: &LodCluster) -> bool {
    if !self.is_valid() || !other.is_valid() {
      return false;
    }
    let (mut i, mut j) = (0, 0);
    while i < self.members.len() && j < other.members.len() {
      match self.members[i].member.cmp(&other.members[j].member) {
        std::cmp::Ordering::Less => i += 1,
        std::cmp::Ordering::Greater => j += 1,
        std::cmp::Ordering::Equal => return true,
      }
    }
    false
  }

  // ===========================================================================
  // Mutation
  // ===========================================================================

  /// Union of two valid clusters.
  pub fn merge(&self, other: &LodCluster) -> Result<LodCluster> {
    if !self.is_valid() || !other.is_valid() {
      return Err(HlodError::InvalidCluster);
    }
    let mut merged = self.clone();
    merged.absorb(other);
    Ok(merged)
  }

  /// In-place union. `other` must be valid; `self` may be a memberless seed.
  pub fn merge_in(&mut self, other: &LodCluster) -> Result<()> {
    if !other.is_valid() {
      return Err(HlodError::InvalidCluster);
    }
    self.absorb(other);
    Ok(())
  }

  fn absorb(&mut self, other: &LodCluster) {
    self.filling_factor =
      cost::combined_filling_factor(&self.bounds, self.filling_factor, &other.bounds, other.filling_factor);
    self.bounds = self.bounds.combine(&other.bounds);
    self.members = union_sorted(&self.members, &other.members);
    self.refresh_cost();
  }

  /// Remove every member of `other`, rebuilding bounds from what remains.
  ///
  /// Returns true if any member was removed. A cluster left without members
  /// is invalidated.
  pub fn subtract(&mut self, other: &LodCluster) -> bool {
    let before = self.members.len();
    self.members.retain(|e| !other.has_member(e.member));
    if self.members.len() == before {
      return false;
    }

    match self.members.len() {
      0 => self.invalidate(),
      1 => {
        self.bounds = self.members[0].bounds;
        self.filling_factor = 1.0;
        self.refresh_cost();
      }
      _ => self.rebuild_bounds(),
    }
    true
  }

  fn rebuild_bounds(&mut self) {
    let first = self.members[0].bounds;
    let second = self.members[1].bounds;
    let mut filling = cost::combined_filling_factor(&first, 1.0, &second, 1.0);
    let mut bounds = first.combine(&second);

    for entry in &self.members[2..] {
      filling = cost::combined_filling_factor(&entry.bounds, 1.0, &bounds, filling);
      bounds = bounds.combine(&entry.bounds);
    }

    self.bounds = bounds;
    self.filling_factor = filling;
    self.refresh_cost();
  }

  /// Drop all members; the cluster becomes invalid.
  pub fn invalidate(&mut self) {
    self.members.clear();
    self.bounds = SpatialBounds::EMPTY;
    self.filling_factor = 1.0;
    self.refresh_cost();
  }

  #[inline]
  fn refresh_cost(&mut self) {
    self.cost = cost::cost(&self.bounds, self.filling_factor);
  }

  // ===========================================================================
  // Build
  // ===========================================================================

  /// Create a hierarchy node for this cluster at build pass `tier` and
  /// request its proxy mesh.
  ///
  /// `true` merges synchronously; `false` enqueues an asynchronous proxy job.
  pub fn build_node(
    &self,
    ctx: &mut NodeBuildContext<'_>,
    tier: usize,
    request: impl Into<MeshRequest>,
  ) -> Result<NodeId> {
    if !self.is_valid() {
      return Err(HlodError::InvalidCluster);
    }

    let members: Vec<ClusterMember> = self.members().collect();
    let node = ctx.hierarchy.create_node(tier + 1, &members, ctx.query, ctx.store)?;
    ctx.assign_draw_distance(node)?;
    ctx.request_mesh(node, request.into())?;
    Ok(node)
  }
}

fn union_sorted(a: &[MemberEntry], b: &[MemberEntry]) -> SmallVec<[MemberEntry; 4]> {
  let mut out = SmallVec::with_capacity(a.len() + b.len());
  let (mut i, mut j) = (0, 0);
  while i < a.len() && j < b.len() {
    match a[i].member.cmp(&b[j].member) {
      std::cmp::Ordering::Less => {
        out.push(a[i]);
        i += 1;
      }
      std::cmp::Ordering::Greater => {
        out.push(b[j]);
        j += 1;
      }
      std::cmp::Ordering::Equal => {
        out.push(a[i]);
        i += 1;
        j += 1;
      }
    }
  }
  out.extend_from_slice(&a[i..]);
  out.extend_from_slice(&b[j..]);
  out
}

impl SubAssign<&LodCluster> for LodCluster {
  fn sub_assign(&mut self, other: &LodCluster) {
    self.subtract(other);
  }
}

impl Sub<&LodCluster> for &LodCluster {
  type Output = LodCluster;

  fn sub(self, other: &LodCluster) -> LodCluster {
    let mut result = self.clone();
    result.subtract(other);
    result
  }
}

impl fmt::Display for LodCluster {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{")?;
    for (i, entry) in self.members.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}", entry.member)?;
    }
    write!(f, "}}")
  }
}

#[cfg(test)]
#[path = "cluster_test.rs"]
mod cluster_test;
