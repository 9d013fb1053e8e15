//! Scene model consumed by the clusterer: levels, actors, mesh components and
//! HLOD volumes.
//!
//! The scene is owned by the caller. Clustering only reads it through
//! [`ActorQuery`]; the one mutation the HLOD system performs is excluding an
//! actor from auto LOD generation.

use std::collections::BTreeMap;

use glam::{DAffine3, DVec3};

use crate::bounds::{DAabb3, SpatialBounds};
use crate::types::{ActorId, VolumeId};

/// Actors whose box extent squared length is at or below this are skipped.
pub const MIN_EXTENT_SQUARED: f64 = 0.1;

// =============================================================================
// Components and actors
// =============================================================================

/// Renderable mesh component of a scene actor.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshComponent {
  /// Component to world transform.
  pub transform: DAffine3,
  /// Derived data key of the mesh geometry.
  pub mesh_key: String,
  /// Derived data keys of the materials and their textures.
  pub material_keys: Vec<String>,
  pub hidden_in_game: bool,
  /// Component participates in auto LOD generation.
  pub enable_auto_lod: bool,
  /// Movable components are never merged.
  pub movable: bool,
  /// Build passes this component is excluded from.
  pub excluded_tiers: Vec<usize>,
}

impl MeshComponent {
  pub fn new(mesh_key: impl Into<String>, transform: DAffine3) -> Self {
    Self {
      transform,
      mesh_key: mesh_key.into(),
      material_keys: Vec::new(),
      hidden_in_game: false,
      enable_auto_lod: true,
      movable: false,
      excluded_tiers: Vec::new(),
    }
  }

  /// Add a material derived data key.
  pub fn with_material(mut self, key: impl Into<String>) -> Self {
    self.material_keys.push(key.into());
    self
  }

  /// Whether this component contributes geometry at build pass `tier`.
  #[inline]
  pub fn should_generate_auto_lod(&self, tier: usize) -> bool {
    self.enable_auto_lod && !self.movable && !self.excluded_tiers.contains(&tier)
  }
}

/// Scene actor (tier 0 leaf).
#[derive(Clone, Debug, PartialEq)]
pub struct SceneActor {
  pub id: ActorId,
  pub name: String,
  /// Actor pivot in world space.
  pub location: DVec3,
  /// World-space bounds of all components.
  pub bounds: DAabb3,
  pub hidden_in_game: bool,
  /// Actor-level auto LOD switch; cleared by exclusion.
  pub enable_auto_lod: bool,
  /// The actor is a previously generated proxy rather than scene content.
  pub is_proxy: bool,
  pub components: Vec<MeshComponent>,
}

impl SceneActor {
  /// Actor with one component whose box has the given half-extents around
  /// `location`.
  pub fn new(id: ActorId, name: impl Into<String>, location: DVec3, half_extents: DVec3) -> Self {
    let name = name.into();
    let component = MeshComponent::new(format!("{}_mesh", name), DAffine3::from_translation(location));
    Self {
      id,
      name,
      location,
      bounds: DAabb3::from_center_half_extents(location, half_extents),
      hidden_in_game: false,
      enable_auto_lod: true,
      is_proxy: false,
      components: vec![component],
    }
  }

  /// Bounding sphere in world units: box center, half-diagonal radius.
  #[inline]
  pub fn sphere(&self) -> SpatialBounds {
    self.bounds.bounding_sphere()
  }

  /// Components that would be merged at build pass `tier`.
  pub fn mergeable_components(&self, tier: usize) -> impl Iterator<Item = &MeshComponent> {
    self
      .components
      .iter()
      .filter(move |c| !c.hidden_in_game && c.should_generate_auto_lod(tier))
  }
}

/// Axis-aligned HLOD volume that forces its actors into one cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct HlodVolume {
  pub id: VolumeId,
  pub bounds: DAabb3,
  /// Also take actors straddling the volume boundary.
  pub include_overlapping: bool,
}

impl HlodVolume {
  /// Whether `actor` belongs to this volume.
  ///
  /// The actor pivot must be inside the volume (or within the actor's box
  /// size of it when overlapping actors are included), and the actor box
  /// must be inside the volume box (or intersect it when overlapping).
  pub fn encompasses(&self, actor: &SceneActor) -> bool {
    if !self.encompasses_pivot(actor) {
      return false;
    }
    self.bounds.contains_box(&actor.bounds) || (self.include_overlapping && self.bounds.overlaps(&actor.bounds))
  }

  /// Pivot-only variant of [`HlodVolume::encompasses`].
  pub fn encompasses_pivot(&self, actor: &SceneActor) -> bool {
    let slack = if self.include_overlapping {
      actor.bounds.size().length()
    } else {
      0.0
    };
    self.bounds.encompasses_point(actor.location, slack)
  }

  /// Seed sphere for the volume cluster, in world units.
  #[inline]
  pub fn sphere(&self) -> SpatialBounds {
    self.bounds.bounding_sphere()
  }
}

// =============================================================================
// Eligibility
// =============================================================================

/// Why an actor can or cannot be clustered.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClusterEligibility {
  Valid,
  /// Unknown actor id.
  InvalidActor,
  HiddenInGame,
  /// Auto LOD disabled on the actor.
  ExcludedActor,
  /// The actor is itself a generated proxy.
  IsHierarchyNode,
  TooSmall,
  /// Already a member of a hierarchy node.
  AlreadyClustered,
  /// Every otherwise eligible component is hidden.
  ComponentHiddenInGame,
  /// No component generates auto LOD at this tier.
  NoEligibleComponents,
}

impl ClusterEligibility {
  #[inline]
  pub fn is_valid(self) -> bool {
    self == ClusterEligibility::Valid
  }
}

/// Read access the clusterer needs from the scene.
pub trait ActorQuery {
  /// World-space bounding sphere of an actor.
  fn bounds(&self, actor: ActorId) -> Option<SpatialBounds>;

  /// Actor pivot, used for node placement.
  fn location(&self, actor: ActorId) -> Option<DVec3>;

  /// Whether the actor takes part in clustering at build pass `tier`.
  fn should_include(&self, actor: ActorId, tier: usize) -> bool;

  /// Components merged into a proxy at build pass `tier`.
  fn components(&self, actor: ActorId, tier: usize) -> Vec<MeshComponent>;
}

// =============================================================================
// Level
// =============================================================================

/// A level: actors and HLOD volumes.
#[derive(Clone, Debug, Default)]
pub struct Level {
  pub name: String,
  /// Hidden levels are not built.
  pub visible: bool,
  actors: BTreeMap<ActorId, SceneActor>,
  volumes: Vec<HlodVolume>,
}

impl Level {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      visible: true,
      actors: BTreeMap::new(),
      volumes: Vec::new(),
    }
  }

  /// Insert or replace an actor.
  pub fn add_actor(&mut self, actor: SceneActor) {
    self.actors.insert(actor.id, actor);
  }

  pub fn remove_actor(&mut self, id: ActorId) -> Option<SceneActor> {
    self.actors.remove(&id)
  }

  pub fn actor(&self, id: ActorId) -> Option<&SceneActor> {
    self.actors.get(&id)
  }

  pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut SceneActor> {
    self.actors.get_mut(&id)
  }

  /// Actors in id order.
  pub fn actors(&self) -> impl Iterator<Item = &SceneActor> {
    self.actors.values()
  }

  pub fn actor_count(&self) -> usize {
    self.actors.len()
  }

  pub fn add_volume(&mut self, volume: HlodVolume) {
    self.volumes.push(volume);
  }

  pub fn volumes(&self) -> &[HlodVolume] {
    &self.volumes
  }

  pub fn volume(&self, id: VolumeId) -> Option<&HlodVolume> {
    self.volumes.iter().find(|v| v.id == id)
  }

  /// First volume that encompasses `actor`.
  pub fn volume_for(&self, actor: &SceneActor) -> Option<&HlodVolume> {
    self.volumes.iter().find(|v| v.encompasses(actor))
  }

  /// Classify an actor for build pass `tier`.
  ///
  /// Scene-only check; clustering state is layered on by
  /// [`crate::hierarchy::Hierarchy::eligibility`].
  pub fn eligibility(&self, id: ActorId, tier: usize) -> ClusterEligibility {
    let Some(actor) = self.actors.get(&id) else {
      return ClusterEligibility::InvalidActor;
    };

    if actor.hidden_in_game {
      return ClusterEligibility::HiddenInGame;
    }
    if !actor.enable_auto_lod {
      return ClusterEligibility::ExcludedActor;
    }
    if actor.is_proxy {
      return ClusterEligibility::IsHierarchyNode;
    }
    if actor.bounds.half_extents().length_squared() <= MIN_EXTENT_SQUARED {
      return ClusterEligibility::TooSmall;
    }

    let mut hidden = false;
    for component in &actor.components {
      if component.hidden_in_game {
        hidden = true;
      } else if component.should_generate_auto_lod(tier) {
        return ClusterEligibility::Valid;
      }
    }

    if hidden {
      ClusterEligibility::ComponentHiddenInGame
    } else {
      ClusterEligibility::NoEligibleComponents
    }
  }
}

impl ActorQuery for Level {
  fn bounds(&self, actor: ActorId) -> Option<SpatialBounds> {
    self.actors.get(&actor).map(SceneActor::sphere)
  }

  fn location(&self, actor: ActorId) -> Option<DVec3> {
    self.actors.get(&actor).map(|a| a.location)
  }

  fn should_include(&self, actor: ActorId, tier: usize) -> bool {
    self.eligibility(actor, tier).is_valid()
  }

  fn components(&self, actor: ActorId, tier: usize) -> Vec<MeshComponent> {
    self
      .actors
      .get(&actor)
      .map(|a| a.mergeable_components(tier).cloned().collect())
      .unwrap_or_default()
  }
}

#[cfg(test)]
#[path = "scene_test.rs"]
mod scene_test;
