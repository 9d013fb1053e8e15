//! HlodConfig - clustering, proxy and draw distance configuration.
//!
//! Loaded from TOML and injected into the builders. Runtime knobs (merge
//! iteration cap, distance scale and overrides) live here as plain fields and
//! are swapped with [`HlodConfig::reload`].

use std::path::Path;

use serde::Deserialize;

use crate::cost;
use crate::error::{HlodError, Result};

// =============================================================================
// Proxy / material settings
// =============================================================================

/// Mesh simplification settings handed to the merge service.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
  /// Target on-screen size in pixels the proxy is built for.
  pub screen_size: u32,
  /// Distance below which vertices are welded.
  pub merge_distance: f64,
  /// Recompute normals on the simplified mesh.
  pub recalculate_normals: bool,
  /// Angle (degrees) above which normals are split.
  pub hard_angle_threshold: f64,
  /// Edge length of baked material textures.
  pub material_texture_size: u32,
}

impl Default for ProxySettings {
  fn default() -> Self {
    Self {
      screen_size: 300,
      merge_distance: 0.0,
      recalculate_normals: true,
      hard_angle_threshold: 80.0,
      material_texture_size: 1024,
    }
  }
}

/// Base material that proxy materials are flattened into.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BaseMaterial {
  pub name: String,
  /// Bumped whenever the material changes; part of every proxy key.
  pub revision: u32,
}

impl Default for BaseMaterial {
  fn default() -> Self {
    Self {
      name: "BaseFlattenMaterial".to_string(),
      revision: 0,
    }
  }
}

/// Assumed projection used to relate screen size and draw distance.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProjectionSettings {
  /// Horizontal field of view in degrees.
  pub fov_degrees: f64,
  pub width: u32,
  pub height: u32,
}

impl ProjectionSettings {
  /// Largest projection matrix scale factor, halved.
  /// multiple = max(0.5 / tan(fov/2), 0.5 * aspect / tan(fov/2))
  #[inline]
  pub fn screen_multiple(&self) -> f64 {
    let half_fov = (self.fov_degrees * 0.5).to_radians();
    let inv_tan = 1.0 / half_fov.tan();
    let aspect = self.width as f64 / self.height.max(1) as f64;
    (0.5 * inv_tan).max(0.5 * aspect * inv_tan)
  }
}

impl Default for ProjectionSettings {
  fn default() -> Self {
    Self {
      fov_degrees: 90.0,
      width: 1920,
      height: 1080,
    }
  }
}

// =============================================================================
// Per-tier settings
// =============================================================================

/// Settings for one HLOD tier.
///
/// `tiers[i]` configures build pass `i`, whose nodes sit at hierarchy tier
/// `i + 1`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TierSettings {
  /// Desired cluster bound radius in world units.
  pub desired_bound_radius: f64,
  /// Desired filling percentage (0, 100].
  pub desired_filling_percentage: f64,
  /// Minimum members a cluster needs to become a node.
  pub min_actors_to_build: usize,
  /// Screen size at which the proxy replaces its members.
  pub transition_screen_size: f64,
  /// Explicit draw distance, bypassing the screen size derivation.
  pub override_draw_distance: Option<f64>,
  /// Build proxies asynchronously through mesh simplification.
  pub simplify_mesh: bool,
  /// Feed the previous tier's nodes as this tier's input.
  pub reuse_previous_tier_clusters: bool,
  /// Only produce clusters from HLOD volumes.
  pub only_generate_clusters_for_volumes: bool,
  /// Re-evaluate actors this tier rejected when building the next one.
  pub allow_specific_exclusion: bool,
  pub proxy: ProxySettings,
}

impl TierSettings {
  /// Desired filling as a fraction.
  #[inline]
  pub fn filling_ratio(&self) -> f64 {
    self.desired_filling_percentage * 0.01
  }
}

impl Default for TierSettings {
  fn default() -> Self {
    Self {
      desired_bound_radius: 2000.0,
      desired_filling_percentage: 50.0,
      min_actors_to_build: 2,
      transition_screen_size: 0.315,
      override_draw_distance: None,
      simplify_mesh: false,
      reuse_previous_tier_clusters: false,
      only_generate_clusters_for_volumes: false,
      allow_specific_exclusion: false,
      proxy: ProxySettings::default(),
    }
  }
}

// =============================================================================
// HlodConfig
// =============================================================================

/// Root HLOD configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct HlodConfig {
  /// Master switch; a disabled system builds nothing.
  pub enabled: bool,
  pub tiers: Vec<TierSettings>,
  /// Cap on cluster absorption passes.
  pub max_merge_iterations: u32,
  /// Multiplier applied to every effective draw distance.
  pub distance_scale: f64,
  /// Per-tier draw distance overrides; 0 means no override.
  pub distance_overrides: Vec<f64>,
  /// World units per meter; bounds are converted to meters for cost.
  pub world_units_per_meter: f64,
  /// One cluster per tier, skipping graph construction.
  pub generate_single_cluster: bool,
  pub projection: ProjectionSettings,
  pub base_material: BaseMaterial,
}

impl Default for HlodConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      tiers: vec![TierSettings::default()],
      max_merge_iterations: 3,
      distance_scale: 1.0,
      distance_overrides: Vec::new(),
      world_units_per_meter: 100.0,
      generate_single_cluster: false,
      projection: ProjectionSettings::default(),
      base_material: BaseMaterial::default(),
    }
  }
}

impl HlodConfig {
  /// Parse and validate a TOML document.
  pub fn from_toml_str(source: &str) -> Result<Self> {
    let config: HlodConfig = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  /// Load and validate a TOML file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let source = std::fs::read_to_string(path.as_ref())?;
    Self::from_toml_str(&source)
  }

  /// Check value ranges.
  pub fn validate(&self) -> Result<()> {
    if self.tiers.is_empty() {
      return Err(HlodError::invalid_config("at least one tier is required"));
    }
    if !(self.world_units_per_meter > 0.0) {
      return Err(HlodError::invalid_config(format!(
        "world_units_per_meter must be positive, got {}",
        self.world_units_per_meter
      )));
    }
    if self.max_merge_iterations == 0 {
      return Err(HlodError::invalid_config("max_merge_iterations must be at least 1"));
    }
    if !(self.distance_scale >= 0.0) {
      return Err(HlodError::invalid_config("distance_scale must be non-negative"));
    }
    let fov = self.projection.fov_degrees;
    if !(fov > 0.0 && fov < 180.0) || self.projection.width == 0 || self.projection.height == 0 {
      return Err(HlodError::invalid_config("projection must have fov in (0, 180) and a non-empty viewport"));
    }

    for (index, tier) in self.tiers.iter().enumerate() {
      if !(tier.desired_bound_radius > 0.0) {
        return Err(HlodError::invalid_config(format!(
          "tier {}: desired_bound_radius must be positive",
          index
        )));
      }
      let filling = tier.desired_filling_percentage;
      if !(filling > 0.0 && filling <= 100.0) {
        return Err(HlodError::invalid_config(format!(
          "tier {}: desired_filling_percentage must be in (0, 100], got {}",
          index, filling
        )));
      }
      if tier.min_actors_to_build == 0 {
        return Err(HlodError::invalid_config(format!(
          "tier {}: min_actors_to_build must be at least 1",
          index
        )));
      }
      if !(tier.transition_screen_size > 0.0) {
        return Err(HlodError::invalid_config(format!(
          "tier {}: transition_screen_size must be positive",
          index
        )));
      }
    }
    Ok(())
  }

  /// Validate `new` and swap it in.
  ///
  /// Returns the tiers whose settings changed (all tiers when a global input
  /// to every proxy key changed). On error the current config is untouched.
  pub fn reload(&mut self, new: HlodConfig) -> Result<Vec<usize>> {
    new.validate()?;

    let global_change = self.base_material != new.base_material
      || self.world_units_per_meter != new.world_units_per_meter
      || self.projection != new.projection;

    let tier_count = self.tiers.len().max(new.tiers.len());
    let changed = (0..tier_count)
      .filter(|&i| global_change || self.tiers.get(i) != new.tiers.get(i))
      .collect();

    *self = new;
    Ok(changed)
  }

  /// Settings for build pass `tier`.
  pub fn tier(&self, tier: usize) -> Result<&TierSettings> {
    self.tiers.get(tier).ok_or(HlodError::UnknownTier {
      tier,
      tiers: self.tiers.len(),
    })
  }

  /// Number of configured tiers.
  #[inline]
  pub fn tier_count(&self) -> usize {
    self.tiers.len()
  }

  /// Factor converting world units into cost space (meters).
  #[inline]
  pub fn cost_space_scale(&self) -> f64 {
    1.0 / self.world_units_per_meter
  }

  /// Highest acceptable cluster cost for build pass `tier`.
  pub fn cull_threshold(&self, tier: usize) -> Result<f64> {
    let settings = self.tier(tier)?;
    let radius = settings.desired_bound_radius * self.cost_space_scale();
    Ok(cost::cull_threshold(radius, settings.filling_ratio()))
  }

  /// Draw distance actually used at runtime for a node of build pass `tier`.
  pub fn effective_draw_distance(&self, tier: usize, node_distance: f64) -> f64 {
    let base = match self.distance_overrides.get(tier) {
      Some(&distance) if distance > 0.0 => distance,
      _ => node_distance,
    };
    base * self.distance_scale
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
