//! Proxy content store: per-tier collections of built meshes keyed by
//! [`ProxyKey`].

use std::collections::{BTreeMap, HashSet};

use super::key::{generate_key, KeyInputs, ProxyKey};
use crate::types::{AssetId, NodeId};

/// Persistence boundary for generated proxies.
pub trait ContentStore {
  /// Deterministic key over the node's proxy inputs.
  fn generate_key(&self, inputs: &KeyInputs<'_>) -> ProxyKey {
    generate_key(inputs)
  }

  /// Whether tier `tier`'s collection holds a proxy built under `key`.
  fn contains_key(&self, tier: usize, key: &ProxyKey) -> bool;

  /// Record `node`'s mesh, replacing any previous entry for the node.
  fn add_mesh(&mut self, tier: usize, node: NodeId, mesh: AssetId, key: ProxyKey);

  /// Track intermediate assets produced alongside a mesh.
  fn add_standalone(&mut self, tier: usize, assets: &[AssetId]);

  /// Drop intermediate assets for a tier. Returns how many were dropped.
  fn clean_standalone(&mut self, tier: usize) -> usize;

  /// Forget a node's entry. Returns true if one existed.
  fn remove_node(&mut self, node: NodeId) -> bool;
}

/// One stored proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProxyEntry {
  pub mesh: AssetId,
  pub key: ProxyKey,
}

/// Proxies of one tier.
#[derive(Clone, Debug, Default)]
pub struct ProxyCollection {
  entries: BTreeMap<NodeId, ProxyEntry>,
  keys: HashSet<ProxyKey>,
  standalone: Vec<AssetId>,
}

impl ProxyCollection {
  pub fn entry(&self, node: NodeId) -> Option<&ProxyEntry> {
    self.entries.get(&node)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn standalone(&self) -> &[AssetId] {
    &self.standalone
  }

  fn rebuild_keys(&mut self) {
    self.keys = self.entries.values().map(|e| e.key).collect();
  }
}

/// In-memory [`ContentStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryContentStore {
  collections: BTreeMap<usize, ProxyCollection>,
}

impl MemoryContentStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn collection(&self, tier: usize) -> Option<&ProxyCollection> {
    self.collections.get(&tier)
  }

  /// Total stored proxies across tiers.
  pub fn len(&self) -> usize {
    self.collections.values().map(ProxyCollection::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn entry(&self, node: NodeId) -> Option<&ProxyEntry> {
    self.collections.values().find_map(|c| c.entry(node))
  }
}

impl ContentStore for MemoryContentStore {
  fn contains_key(&self, tier: usize, key: &ProxyKey) -> bool {
    self.collections.get(&tier).is_some_and(|c| c.keys.contains(key))
  }

  fn add_mesh(&mut self, tier: usize, node: NodeId, mesh: AssetId, key: ProxyKey) {
    // A node only lives in one collection.
    self.remove_node(node);
    let collection = self.collections.entry(tier).or_default();
    collection.entries.insert(node, ProxyEntry { mesh, key });
    collection.keys.insert(key);
  }

  fn add_standalone(&mut self, tier: usize, assets: &[AssetId]) {
    if assets.is_empty() {
      return;
    }
    self.collections.entry(tier).or_default().standalone.extend_from_slice(assets);
  }

  fn clean_standalone(&mut self, tier: usize) -> usize {
    self
      .collections
      .get_mut(&tier)
      .map(|c| std::mem::take(&mut c.standalone).len())
      .unwrap_or(0)
  }

  fn remove_node(&mut self, node: NodeId) -> bool {
    for collection in self.collections.values_mut() {
      if collection.entries.remove(&node).is_some() {
        collection.rebuild_keys();
        return true;
      }
    }
    false
  }
}
