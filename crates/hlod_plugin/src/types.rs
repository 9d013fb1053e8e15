//! Identifier and member types shared across the HLOD pipeline.

use std::fmt;

/// Scene actor identifier (tier 0 leaf).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ActorId(pub u64);

/// Hierarchy node identifier.
///
/// Allocated by [`crate::hierarchy::Hierarchy`]; never reused within one
/// hierarchy, so a stale id simply fails to resolve.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
  /// Get the raw ID value.
  pub fn raw(&self) -> u64 {
    self.0
  }
}

/// HLOD volume identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VolumeId(pub u64);

/// Generated asset identifier (mesh, material or texture).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct AssetId(pub u64);

/// A member of a cluster: either a raw scene actor or a nested hierarchy node.
///
/// Tier 0 clusters only hold `Leaf` members. Higher tiers mix both when
/// leftover actors are clustered together with lower tier nodes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ClusterMember {
  /// Scene actor.
  Leaf(ActorId),
  /// Lower tier hierarchy node.
  Group(NodeId),
}

impl ClusterMember {
  /// Leaf actor id, if this member is a leaf.
  pub fn as_leaf(&self) -> Option<ActorId> {
    match self {
      ClusterMember::Leaf(actor) => Some(*actor),
      ClusterMember::Group(_) => None,
    }
  }

  /// Node id, if this member is a nested node.
  pub fn as_group(&self) -> Option<NodeId> {
    match self {
      ClusterMember::Leaf(_) => None,
      ClusterMember::Group(node) => Some(*node),
    }
  }
}

impl From<ActorId> for ClusterMember {
  fn from(actor: ActorId) -> Self {
    ClusterMember::Leaf(actor)
  }
}

impl From<NodeId> for ClusterMember {
  fn from(node: NodeId) -> Self {
    ClusterMember::Group(node)
  }
}

impl fmt::Display for ClusterMember {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ClusterMember::Leaf(actor) => write!(f, "actor#{}", actor.0),
      ClusterMember::Group(node) => write!(f, "node#{}", node.0),
    }
  }
}
