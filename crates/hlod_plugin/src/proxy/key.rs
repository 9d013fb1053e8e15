//! Content-addressed proxy keys.
//!
//! A key is a SHA-256 digest over everything that shapes a proxy mesh: the
//! tier's simplification settings, the base material, the first scene actor
//! under the node and every merged component's transform and derived data keys. Floats are
//! hashed by bit pattern so equal inputs always give equal keys.

use std::fmt;

use glam::DAffine3;
use sha2::{Digest, Sha256};

use crate::config::{BaseMaterial, ProxySettings};
use crate::scene::MeshComponent;
use crate::types::ActorId;

/// Bumped when the key layout changes so older keys read as stale.
const KEY_VERSION: u32 = 1;

/// SHA-256 proxy key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyKey([u8; 32]);

impl ProxyKey {
  pub fn as_bytes(&self) -> &[u8; 32] {
    &self.0
  }
}

impl fmt::Display for ProxyKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for byte in &self.0 {
      write!(f, "{:02x}", byte)?;
    }
    Ok(())
  }
}

impl fmt::Debug for ProxyKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ProxyKey({})", self)
  }
}

/// Inputs of a proxy key.
#[derive(Clone, Copy, Debug)]
pub struct KeyInputs<'a> {
  pub settings: &'a ProxySettings,
  pub base_material: &'a BaseMaterial,
  /// First scene actor under the node, depth first. Node ids are not
  /// stable across rebuilds and never enter the key.
  pub first_actor: Option<ActorId>,
  pub components: &'a [MeshComponent],
}

/// Compute the proxy key for `inputs`.
pub fn generate_key(inputs: &KeyInputs<'_>) -> ProxyKey {
  let mut hasher = Sha256::new();
  hasher.update(KEY_VERSION.to_le_bytes());

  hash_settings(&mut hasher, inputs.settings);

  hash_str(&mut hasher, &inputs.base_material.name);
  hasher.update(inputs.base_material.revision.to_le_bytes());

  match inputs.first_actor {
    Some(actor) => {
      hasher.update([1u8]);
      hasher.update(actor.0.to_le_bytes());
    }
    None => hasher.update([0u8]),
  }

  hasher.update((inputs.components.len() as u64).to_le_bytes());
  for component in inputs.components {
    hash_transform(&mut hasher, &component.transform);
    hash_str(&mut hasher, &component.mesh_key);
    hasher.update((component.material_keys.len() as u64).to_le_bytes());
    for material in &component.material_keys {
      hash_str(&mut hasher, material);
    }
  }

  let mut bytes = [0u8; 32];
  bytes.copy_from_slice(&hasher.finalize());
  ProxyKey(bytes)
}

fn hash_settings(hasher: &mut Sha256, settings: &ProxySettings) {
  hasher.update(settings.screen_size.to_le_bytes());
  hasher.update(settings.merge_distance.to_bits().to_le_bytes());
  hasher.update([settings.recalculate_normals as u8]);
  hasher.update(settings.hard_angle_threshold.to_bits().to_le_bytes());
  hasher.update(settings.material_texture_size.to_le_bytes());
}

fn hash_transform(hasher: &mut Sha256, transform: &DAffine3) {
  for value in transform.to_cols_array() {
    hasher.update(value.to_bits().to_le_bytes());
  }
}

/// Length-prefixed so adjacent strings cannot alias.
fn hash_str(hasher: &mut Sha256, value: &str) {
  hasher.update((value.len() as u64).to_le_bytes());
  hasher.update(value.as_bytes());
}
