//! Cluster cost model.
//!
//! Cost is `radius³ / filling_factor`: larger and sparser clusters cost more.
//! Values are only compared against each other and against the cull
//! threshold, so they carry no absolute unit beyond the cost space scale
//! (meters, see [`crate::config::HlodConfig::world_units_per_meter`]).

use std::cmp::Ordering;

use crate::bounds::SpatialBounds;

/// Lower clamp for filling factors; keeps cost finite.
pub const FILLING_EPSILON: f64 = 1.0e-6;

/// Clamp a raw filling ratio into `(FILLING_EPSILON, 1]`.
#[inline]
fn clamp_filling(ratio: f64) -> f64 {
  if ratio.is_nan() {
    return FILLING_EPSILON;
  }
  ratio.clamp(FILLING_EPSILON, 1.0)
}

/// Ratio of an estimated member volume to the volume of `bounds`.
pub fn compute_filling_factor(bounds: &SpatialBounds, member_volume: f64) -> f64 {
  let volume = bounds.volume();
  if volume <= 0.0 {
    return 1.0;
  }
  clamp_filling(member_volume / volume)
}

/// Volume of the lens shared by two spheres.
///
/// Zero when they do not intersect, the smaller sphere's volume when one
/// contains the other.
pub fn overlap_volume(a: &SpatialBounds, b: &SpatialBounds) -> f64 {
  if !a.intersects(b) {
    return 0.0;
  }

  let d = a.center.distance(b.center);
  if d + b.radius <= a.radius {
    return b.volume();
  }
  if d + a.radius <= b.radius {
    return a.volume();
  }

  let (ra, rb) = (a.radius, b.radius);
  let cap_a = (rb * rb - (ra - d) * (ra - d)) / (2.0 * d);
  let cap_b = (ra * ra - (rb - d) * (rb - d)) / (2.0 * d);
  if cap_a <= 0.0 || cap_b <= 0.0 {
    return 0.0;
  }

  let chord_sq = ((ra + rb) * (ra + rb) - d * d) * (d * d - (ra - rb) * (ra - rb));
  let ring_radius = chord_sq.max(0.0).sqrt() / (2.0 * d);
  let ring_sq = ring_radius * ring_radius;

  let pi = std::f64::consts::PI;
  pi * cap_a / 6.0 * (3.0 * ring_sq + cap_a * cap_a)
    + pi * cap_b / 6.0 * (3.0 * ring_sq + cap_b * cap_b)
}

/// Filling factor of the union of two weighted spheres.
///
/// Member volume estimate is `fa·V(a) + fb·V(b)` minus half the weighted
/// overlap, measured against the combined sphere.
pub fn combined_filling_factor(a: &SpatialBounds, fa: f64, b: &SpatialBounds, fb: f64) -> f64 {
  let union = a.combine(b);
  let overlap = overlap_volume(a, b);
  let member_volume = (fa * a.volume() + fb * b.volume() - 0.5 * (fa + fb) * overlap).max(0.0);
  compute_filling_factor(&union, member_volume)
}

/// Merge cost for a sphere of the given filling factor.
#[inline]
pub fn cost(bounds: &SpatialBounds, filling_factor: f64) -> f64 {
  bounds.radius.powi(3) / clamp_filling(filling_factor)
}

/// Highest acceptable cluster cost for a desired radius and filling ratio.
///
/// `filling_ratio` is a fraction in `(0, 1]`, not a percentage.
#[inline]
pub fn cull_threshold(desired_radius: f64, filling_ratio: f64) -> f64 {
  desired_radius.powi(3) / clamp_filling(filling_ratio)
}

/// Total order on costs (ascending). NaN sorts last.
#[inline]
pub fn compare_cost(a: f64, b: f64) -> Ordering {
  a.total_cmp(&b)
}
