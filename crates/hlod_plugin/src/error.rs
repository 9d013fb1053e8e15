//! Error taxonomy for clustering, hierarchy and proxy builds.

use crate::types::{ClusterMember, NodeId};

/// Errors surfaced by the HLOD pipeline.
///
/// Per-candidate and per-job failures are logged and counted rather than
/// aborting a whole tier build or tick; these values only propagate where a
/// single operation was requested directly.
#[derive(thiserror::Error, Debug)]
pub enum HlodError {
  #[error("operation on a cluster with zero members")]
  InvalidCluster,

  #[error("proxy mesh build failed for {node:?}: {reason}")]
  AssetBuildFailure { node: NodeId, reason: String },

  #[error("unknown hierarchy node {0:?}")]
  UnknownNode(NodeId),

  #[error("{0} cannot be a member here")]
  InvalidMember(ClusterMember),

  #[error("tier {tier} out of range ({tiers} tiers configured)")]
  UnknownTier { tier: usize, tiers: usize },

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("config parse error: {0}")]
  ConfigParse(#[from] toml::de::Error),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

impl HlodError {
  pub fn invalid_config<T: ToString>(msg: T) -> Self {
    HlodError::InvalidConfig(msg.to_string())
  }

  pub fn build_failure<T: ToString>(node: NodeId, reason: T) -> Self {
    HlodError::AssetBuildFailure {
      node,
      reason: reason.to_string(),
    }
  }
}

pub type Result<T, E = HlodError> = std::result::Result<T, E>;
