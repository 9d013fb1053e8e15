//! Screen size <-> draw distance conversion at a fixed assumed projection.

use crate::config::{ProjectionSettings, TierSettings};

/// Smallest screen radius considered, avoids dividing by zero.
const MIN_SCREEN_RADIUS: f64 = 1.0e-8;

/// Distance at which a sphere of `radius` covers `screen_size` of the screen.
pub fn draw_distance_from_screen_size(radius: f64, screen_size: f64, projection: &ProjectionSettings) -> f64 {
  let screen_radius = (screen_size * 0.5).max(MIN_SCREEN_RADIUS);
  projection.screen_multiple() * radius / screen_radius
}

/// Screen coverage of a sphere of `radius` seen from `distance`.
pub fn screen_size_from_draw_distance(radius: f64, distance: f64, projection: &ProjectionSettings) -> f64 {
  2.0 * projection.screen_multiple() * radius / distance.max(1.0)
}

/// Node draw distance for a tier: the explicit override, or the distance at
/// which the tier's transition screen size is reached.
pub fn tier_draw_distance(settings: &TierSettings, radius: f64, projection: &ProjectionSettings) -> f64 {
  match settings.override_draw_distance {
    Some(distance) if distance > 0.0 => distance,
    _ => draw_distance_from_screen_size(radius, settings.transition_screen_size, projection),
  }
}
