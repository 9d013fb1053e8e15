//! Mesh merge service boundary and a rayon-backed implementation.
//!
//! The service bakes components into a proxy mesh plus its materials. The
//! asynchronous entry point runs the bake on rayon's pool and reports back
//! through a [`DeliveryCallback`] from the worker thread; that callback is the
//! only way results re-enter the HLOD system.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use glam::DVec3;

use super::processor::JobId;
use crate::config::{BaseMaterial, ProxySettings};
use crate::scene::MeshComponent;
use crate::types::AssetId;

// =============================================================================
// Assets
// =============================================================================

/// Kind of generated asset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AssetKind {
  Mesh { origin: DVec3, radius: f64 },
  Material,
  Texture,
}

/// Asset produced by a merge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProxyAsset {
  pub id: AssetId,
  pub kind: AssetKind,
  /// Intermediate asset not referenced by the final proxy.
  pub standalone: bool,
}

impl ProxyAsset {
  /// Allocate a fresh asset id.
  pub fn next_id() -> AssetId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    AssetId(COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  pub fn mesh(origin: DVec3, radius: f64) -> Self {
    Self {
      id: Self::next_id(),
      kind: AssetKind::Mesh { origin, radius },
      standalone: false,
    }
  }

  pub fn material() -> Self {
    Self {
      id: Self::next_id(),
      kind: AssetKind::Material,
      standalone: false,
    }
  }

  pub fn texture(standalone: bool) -> Self {
    Self {
      id: Self::next_id(),
      kind: AssetKind::Texture,
      standalone,
    }
  }

  #[inline]
  pub fn is_mesh(&self) -> bool {
    matches!(self.kind, AssetKind::Mesh { .. })
  }
}

/// Result of a blocking merge.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutput {
  pub assets: Vec<ProxyAsset>,
  /// Pivot the merged mesh was built around.
  pub location: DVec3,
}

/// Merge backend failure.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("mesh merge failed: {0}")]
pub struct MergeError(pub String);

/// Producer side of job delivery; callable from any thread.
pub type DeliveryCallback = Arc<dyn Fn(JobId, Vec<ProxyAsset>) + Send + Sync>;

// =============================================================================
// Service traits
// =============================================================================

/// External mesh merge / reduction service.
pub trait MeshMergeService: Send + Sync {
  /// Blocking merge of `components` into one mesh around `location`.
  fn merge_components_to_mesh(
    &self,
    components: &[MeshComponent],
    settings: &ProxySettings,
    base_material: &BaseMaterial,
    location: DVec3,
  ) -> Result<MergeOutput, MergeError>;

  /// Start an asynchronous proxy build. `on_complete` fires exactly once,
  /// from any thread, with whatever assets were produced (possibly none).
  fn create_proxy_mesh_async(
    &self,
    components: Vec<MeshComponent>,
    settings: ProxySettings,
    base_material: BaseMaterial,
    job: JobId,
    on_complete: DeliveryCallback,
  );
}

/// Geometry backend plugged into [`ThreadedMergeService`].
pub trait MeshBaker: Send + Sync + 'static {
  fn bake(
    &self,
    components: &[MeshComponent],
    settings: &ProxySettings,
    base_material: &BaseMaterial,
    location: DVec3,
  ) -> Result<Vec<ProxyAsset>, MergeError>;
}

/// Baker that produces placeholder assets sized from component positions.
///
/// The mesh asset is last in the output, after the flattened material and
/// its intermediate texture.
#[derive(Clone, Debug)]
pub struct BoundsBaker {
  /// Radius assumed around each component pivot.
  pub component_radius: f64,
}

impl Default for BoundsBaker {
  fn default() -> Self {
    Self {
      component_radius: 100.0,
    }
  }
}

impl MeshBaker for BoundsBaker {
  fn bake(
    &self,
    components: &[MeshComponent],
    settings: &ProxySettings,
    _base_material: &BaseMaterial,
    location: DVec3,
  ) -> Result<Vec<ProxyAsset>, MergeError> {
    if components.is_empty() {
      return Err(MergeError("no components to merge".to_string()));
    }

    let radius = components
      .iter()
      .map(|c| c.transform.translation.distance(location))
      .fold(0.0_f64, f64::max)
      + self.component_radius;

    let mut assets = vec![ProxyAsset::material()];
    if settings.material_texture_size > 0 {
      assets.push(ProxyAsset::texture(true));
    }
    assets.push(ProxyAsset::mesh(location, radius));
    Ok(assets)
  }
}

// =============================================================================
// ThreadedMergeService
// =============================================================================

/// [`MeshMergeService`] running bakes on rayon's thread pool.
pub struct ThreadedMergeService<B: MeshBaker = BoundsBaker> {
  baker: Arc<B>,
  /// Bakes spawned and not yet delivered.
  in_flight: Arc<AtomicUsize>,
}

impl<B: MeshBaker> ThreadedMergeService<B> {
  pub fn new(baker: B) -> Self {
    Self {
      baker: Arc::new(baker),
      in_flight: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// Number of asynchronous bakes still running.
  pub fn pending_count(&self) -> usize {
    self.in_flight.load(Ordering::Acquire)
  }

  pub fn is_idle(&self) -> bool {
    self.pending_count() == 0
  }
}

impl Default for ThreadedMergeService<BoundsBaker> {
  fn default() -> Self {
    Self::new(BoundsBaker::default())
  }
}

impl<B: MeshBaker> MeshMergeService for ThreadedMergeService<B> {
  fn merge_components_to_mesh(
    &self,
    components: &[MeshComponent],
    settings: &ProxySettings,
    base_material: &BaseMaterial,
    location: DVec3,
  ) -> Result<MergeOutput, MergeError> {
    let assets = self.baker.bake(components, settings, base_material, location)?;
    Ok(MergeOutput { assets, location })
  }

  fn create_proxy_mesh_async(
    &self,
    components: Vec<MeshComponent>,
    settings: ProxySettings,
    base_material: BaseMaterial,
    job: JobId,
    on_complete: DeliveryCallback,
  ) {
    let baker = Arc::clone(&self.baker);
    let in_flight = Arc::clone(&self.in_flight);
    in_flight.fetch_add(1, Ordering::AcqRel);

    let location = if components.is_empty() {
      DVec3::ZERO
    } else {
      components
        .iter()
        .map(|c| c.transform.translation)
        .sum::<DVec3>()
        / components.len() as f64
    };

    rayon::spawn(move || {
      let assets = match baker.bake(&components, &settings, &base_material, location) {
        Ok(assets) => assets,
        Err(err) => {
          tracing::error!(%job, %err, "proxy bake failed");
          Vec::new()
        }
      };
      on_complete(job, assets);
      in_flight.fetch_sub(1, Ordering::AcqRel);
    });
  }
}
