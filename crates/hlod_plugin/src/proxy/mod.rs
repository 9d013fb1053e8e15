//! Proxy meshes: content keys, the proxy store, the merge service boundary
//! and the asynchronous job processor.

pub mod build;
mod key;
mod processor;
mod service;
mod store;

pub use build::{MeshOutcome, NodeBuildContext};
pub use key::{generate_key, KeyInputs, ProxyKey};
pub use processor::{JobId, JobState, ProxyBuildJob, ProxyJobProcessor};
pub use service::{
  AssetKind, BoundsBaker, DeliveryCallback, MergeError, MergeOutput, MeshBaker, MeshMergeService, ProxyAsset,
  ThreadedMergeService,
};
pub use store::{ContentStore, MemoryContentStore, ProxyCollection, ProxyEntry};
