//! Bounding volumes: spheres for cluster cost, boxes for actors and HLOD
//! volumes.

use glam::DVec3;

/// Containment slack used when combining spheres.
const CONTAIN_TOLERANCE: f64 = 1.0e-4;

/// Bounding sphere. Immutable value type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialBounds {
  pub center: DVec3,
  pub radius: f64,
}

impl SpatialBounds {
  /// Empty sphere, the identity for [`SpatialBounds::combine`].
  pub const EMPTY: Self = Self {
    center: DVec3::ZERO,
    radius: 0.0,
  };

  pub fn new(center: DVec3, radius: f64) -> Self {
    debug_assert!(radius >= 0.0, "sphere radius must be non-negative");
    Self { center, radius }
  }

  /// True for the zero-radius identity sphere.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.radius <= 0.0
  }

  /// Sphere volume (4/3 π r³).
  #[inline]
  pub fn volume(&self) -> f64 {
    4.0 / 3.0 * std::f64::consts::PI * self.radius.powi(3)
  }

  /// Uniformly scale center and radius (unit conversion).
  #[inline]
  pub fn scaled(&self, factor: f64) -> Self {
    Self {
      center: self.center * factor,
      radius: self.radius * factor,
    }
  }

  /// Check if the two spheres intersect or touch.
  #[inline]
  pub fn intersects(&self, other: &SpatialBounds) -> bool {
    let reach = self.radius + other.radius;
    self.center.distance_squared(other.center) <= reach * reach
  }

  /// Check if `other` lies entirely inside this sphere, with `tolerance` slack.
  #[inline]
  pub fn contains_sphere(&self, other: &SpatialBounds, tolerance: f64) -> bool {
    self.center.distance(other.center) + other.radius <= self.radius + tolerance
  }

  /// Smallest sphere enclosing both spheres.
  ///
  /// When one sphere already contains the other the larger is returned
  /// unchanged. Otherwise the new center lies on the segment between the two
  /// centers and the radius is `(distance + ra + rb) / 2`.
  pub fn combine(&self, other: &SpatialBounds) -> SpatialBounds {
    if self.is_empty() {
      return *other;
    }
    if other.is_empty() {
      return *self;
    }

    let to_other = other.center - self.center;
    let dist_sq = to_other.length_squared();
    let radius_diff = self.radius - other.radius;

    if radius_diff * radius_diff + CONTAIN_TOLERANCE >= dist_sq {
      return if self.radius < other.radius {
        *other
      } else {
        *self
      };
    }

    let dist = dist_sq.sqrt();
    let radius = (dist + self.radius + other.radius) * 0.5;
    let center = self.center + to_other * ((radius - self.radius) / dist);
    SpatialBounds { center, radius }
  }
}

impl Default for SpatialBounds {
  fn default() -> Self {
    Self::EMPTY
  }
}

/// Double-precision axis-aligned bounding box.
///
/// Used for actor extents and HLOD volume shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DAabb3 {
  /// Minimum corner (inclusive).
  pub min: DVec3,
  /// Maximum corner (inclusive).
  pub max: DVec3,
}

impl DAabb3 {
  /// Create a new AABB from min and max corners.
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(
      min.x <= max.x && min.y <= max.y && min.z <= max.z,
      "AABB min must be <= max on all axes"
    );
    Self { min, max }
  }

  /// Create a new AABB from center and half-extents.
  pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
    Self {
      min: center - half_extents,
      max: center + half_extents,
    }
  }

  /// Check if this AABB overlaps with another (touching counts).
  #[inline]
  pub fn overlaps(&self, other: &DAabb3) -> bool {
    self.min.x <= other.max.x
      && self.max.x >= other.min.x
      && self.min.y <= other.max.y
      && self.max.y >= other.min.y
      && self.min.z <= other.max.z
      && self.max.z >= other.min.z
  }

  /// Check if this AABB contains a point.
  #[inline]
  pub fn contains_point(&self, point: DVec3) -> bool {
    point.cmpge(self.min).all() && point.cmple(self.max).all()
  }

  /// Check if `other` lies entirely inside this AABB.
  #[inline]
  pub fn contains_box(&self, other: &DAabb3) -> bool {
    self.contains_point(other.min) && self.contains_point(other.max)
  }

  /// Check if a sphere of `radius` around `point` touches this box.
  ///
  /// With a zero radius this is a plain point test.
  #[inline]
  pub fn encompasses_point(&self, point: DVec3, radius: f64) -> bool {
    let closest = point.clamp(self.min, self.max);
    closest.distance_squared(point) <= radius * radius
  }

  /// Get the size of the AABB (max - min).
  #[inline]
  pub fn size(&self) -> DVec3 {
    self.max - self.min
  }

  /// Get the half-extents of the AABB.
  #[inline]
  pub fn half_extents(&self) -> DVec3 {
    self.size() * 0.5
  }

  /// Get the center of the AABB.
  #[inline]
  pub fn center(&self) -> DVec3 {
    (self.min + self.max) * 0.5
  }

  /// Bounding sphere through the box corners.
  #[inline]
  pub fn bounding_sphere(&self) -> SpatialBounds {
    SpatialBounds::new(self.center(), self.half_extents().length())
  }
}

#[cfg(test)]
#[path = "bounds_test.rs"]
mod bounds_test;
