//! hlod_plugin - Engine independent hierarchical LOD clustering
//!
//! Groups scene actors into clusters tier by tier and orchestrates the
//! proxy meshes that replace each cluster at a distance. Geometry baking
//! and asset persistence sit behind traits the host engine implements.
//!
//! # Features
//!
//! - **Cost driven clustering**: pairwise candidates ranked by
//!   `radius³ / filling_factor`, merged greedily under a per-tier threshold
//! - **Multi-tier hierarchy**: each tier clusters the nodes of the tier below,
//!   or reuses them one to one; HLOD volumes force clusters
//! - **Proxy jobs**: asynchronous merge results delivered from any thread and
//!   finalized on a single polling thread
//! - **Content keys**: SHA-256 keys over proxy inputs detect stale meshes
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hlod_plugin::{HlodConfig, HlodSystem, Level, ThreadedMergeService};
//!
//! let config = HlodConfig::load("hlod.toml")?;
//! let mut system = HlodSystem::new(config, Arc::new(ThreadedMergeService::default()))?;
//!
//! let summary = system.build(&level, true)?;
//! println!("built {} nodes over {} tiers", summary.nodes_built, summary.tiers_built);
//!
//! // Once per frame
//! system.tick();
//! ```

pub mod bounds;
pub mod cost;
pub mod error;
pub mod types;

pub use bounds::{DAabb3, SpatialBounds};
pub use error::{HlodError, Result};
pub use types::{ActorId, AssetId, ClusterMember, NodeId, VolumeId};

// Configuration
pub mod config;
pub use config::{BaseMaterial, HlodConfig, ProjectionSettings, ProxySettings, TierSettings};

// Scene boundary
pub mod scene;
pub use scene::{ActorQuery, ClusterEligibility, HlodVolume, Level, MeshComponent, SceneActor};

// Clustering
pub mod cluster;
pub mod graph;
pub mod merger;
pub use cluster::{LodCluster, MemberEntry};
pub use graph::{ActorClassification, ClusterGraph, ClusterGraphBuilder};
pub use merger::{Acceptance, ClusterMerger, MergeStats};

// Hierarchy and proxies
pub mod hierarchy;
pub mod proxy;
pub use hierarchy::{Hierarchy, HierarchyBuilder, HierarchyNode, MeshRequest, ProxyMesh, SubMember};
pub use proxy::{
  ContentStore, JobId, JobState, MemoryContentStore, MeshMergeService, MeshOutcome, ProxyJobProcessor, ProxyKey,
  ThreadedMergeService,
};

pub mod stats;
pub use stats::{BuildSummary, RollingWindow, TickReport};

pub mod system;
pub use system::HlodSystem;

#[cfg(test)]
pub mod test_utils;
