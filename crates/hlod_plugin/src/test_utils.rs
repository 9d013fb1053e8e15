//! Shared test fixtures: scenes, configs and a recording merge service.

use std::sync::Mutex;

use glam::{DAffine3, DVec3};

use crate::config::{BaseMaterial, HlodConfig, ProxySettings, TierSettings};
use crate::proxy::{
  generate_key, DeliveryCallback, JobId, KeyInputs, MergeError, MergeOutput, MeshMergeService, ProxyAsset, ProxyKey,
};
use crate::scene::{Level, MeshComponent, SceneActor};
use crate::types::ActorId;

/// Actor at `position` whose bounding sphere has `radius` world units.
pub fn actor_at(id: u64, position: DVec3, radius: f64) -> SceneActor {
  let half = DVec3::splat(radius / 3f64.sqrt());
  SceneActor::new(ActorId(id), format!("actor_{}", id), position, half)
}

/// Level with one actor per x position, ids starting at 1.
pub fn line_level(xs: &[f64], radius: f64) -> Level {
  let mut level = Level::new("test_level");
  for (i, &x) in xs.iter().enumerate() {
    level.add_actor(actor_at(i as u64 + 1, DVec3::new(x, 0.0, 0.0), radius));
  }
  level
}

/// Level with actors on a square grid in the XY plane, ids starting at 1.
pub fn grid_level(side: usize, spacing: f64, radius: f64) -> Level {
  let mut level = Level::new("grid_level");
  let mut id = 1;
  for y in 0..side {
    for x in 0..side {
      let position = DVec3::new(x as f64 * spacing, y as f64 * spacing, 0.0);
      level.add_actor(actor_at(id, position, radius));
      id += 1;
    }
  }
  level
}

/// Tier with the given desired radius (world units) and filling percentage.
pub fn tier(desired_bound_radius: f64, desired_filling_percentage: f64, min_actors_to_build: usize) -> TierSettings {
  TierSettings {
    desired_bound_radius,
    desired_filling_percentage,
    min_actors_to_build,
    ..TierSettings::default()
  }
}

pub fn config_with(tiers: Vec<TierSettings>) -> HlodConfig {
  HlodConfig {
    tiers,
    ..HlodConfig::default()
  }
}

/// Key over a single identity component.
pub fn test_key(mesh_key: &str) -> ProxyKey {
  let components = [MeshComponent::new(mesh_key, DAffine3::IDENTITY)];
  generate_key(&KeyInputs {
    settings: &ProxySettings::default(),
    base_material: &BaseMaterial::default(),
    first_actor: None,
    components: &components,
  })
}

/// Assets a successful merge delivers: material, standalone texture, mesh.
pub fn mesh_assets(origin: DVec3, radius: f64) -> Vec<ProxyAsset> {
  vec![
    ProxyAsset::material(),
    ProxyAsset::texture(true),
    ProxyAsset::mesh(origin, radius),
  ]
}

// =============================================================================
// RecordingMergeService
// =============================================================================

/// Async request held until the test delivers it.
pub struct RecordedRequest {
  pub job: JobId,
  pub components: Vec<MeshComponent>,
  pub callback: DeliveryCallback,
}

/// Merge service that records async requests for manual, out-of-order
/// delivery and answers blocking merges immediately.
#[derive(Default)]
pub struct RecordingMergeService {
  requests: Mutex<Vec<RecordedRequest>>,
  blocking_calls: Mutex<usize>,
  /// Blocking merges return an error.
  pub fail: bool,
  /// Merges produce materials but no mesh.
  pub omit_mesh: bool,
}

impl RecordingMergeService {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing() -> Self {
    Self {
      fail: true,
      ..Self::default()
    }
  }

  pub fn without_mesh() -> Self {
    Self {
      omit_mesh: true,
      ..Self::default()
    }
  }

  /// Number of async requests not yet delivered.
  pub fn pending(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  pub fn blocking_calls(&self) -> usize {
    *self.blocking_calls.lock().unwrap()
  }

  /// Job ids of undelivered requests, in request order.
  pub fn jobs(&self) -> Vec<JobId> {
    self.requests.lock().unwrap().iter().map(|r| r.job).collect()
  }

  /// Deliver the request for `job` with the assets this service produces.
  pub fn deliver(&self, job: JobId) -> bool {
    let request = {
      let mut requests = self.requests.lock().unwrap();
      match requests.iter().position(|r| r.job == job) {
        Some(index) => requests.remove(index),
        None => return false,
      }
    };
    let assets = self.assets_for(&request.components);
    (request.callback)(request.job, assets);
    true
  }

  /// Deliver every outstanding request.
  pub fn deliver_all(&self) -> usize {
    let jobs = self.jobs();
    jobs.iter().filter(|&&job| self.deliver(job)).count()
  }

  fn assets_for(&self, components: &[MeshComponent]) -> Vec<ProxyAsset> {
    let origin = centroid(components);
    let mut assets = mesh_assets(origin, 150.0);
    if self.omit_mesh {
      assets.pop();
    }
    assets
  }
}

fn centroid(components: &[MeshComponent]) -> DVec3 {
  if components.is_empty() {
    return DVec3::ZERO;
  }
  components.iter().map(|c| c.transform.translation).sum::<DVec3>() / components.len() as f64
}

impl MeshMergeService for RecordingMergeService {
  fn merge_components_to_mesh(
    &self,
    components: &[MeshComponent],
    _settings: &ProxySettings,
    _base_material: &BaseMaterial,
    location: DVec3,
  ) -> Result<MergeOutput, MergeError> {
    *self.blocking_calls.lock().unwrap() += 1;
    if self.fail {
      return Err(MergeError("recording service told to fail".to_string()));
    }
    Ok(MergeOutput {
      assets: self.assets_for(components),
      location,
    })
  }

  fn create_proxy_mesh_async(
    &self,
    components: Vec<MeshComponent>,
    _settings: ProxySettings,
    _base_material: BaseMaterial,
    job: JobId,
    on_complete: DeliveryCallback,
  ) {
    self.requests.lock().unwrap().push(RecordedRequest {
      job,
      components,
      callback: on_complete,
    });
  }
}
