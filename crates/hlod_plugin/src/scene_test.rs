use super::*;

fn actor(id: u64, x: f64) -> SceneActor {
  SceneActor::new(ActorId(id), format!("actor_{}", id), DVec3::new(x, 0.0, 0.0), DVec3::splat(10.0))
}

fn level_with(actors: Vec<SceneActor>) -> Level {
  let mut level = Level::new("test");
  for a in actors {
    level.add_actor(a);
  }
  level
}

// =========================================================================
// Eligibility
// =========================================================================

#[test]
fn test_default_actor_is_valid() {
  let level = level_with(vec![actor(1, 0.0)]);
  assert_eq!(level.eligibility(ActorId(1), 0), ClusterEligibility::Valid);
  assert!(level.should_include(ActorId(1), 0));
}

#[test]
fn test_unknown_actor() {
  let level = Level::new("empty");
  assert_eq!(level.eligibility(ActorId(9), 0), ClusterEligibility::InvalidActor);
  assert!(level.bounds(ActorId(9)).is_none());
}

#[test]
fn test_actor_level_rejections() {
  let mut hidden = actor(1, 0.0);
  hidden.hidden_in_game = true;
  let mut excluded = actor(2, 0.0);
  excluded.enable_auto_lod = false;
  let mut proxy = actor(3, 0.0);
  proxy.is_proxy = true;
  let tiny = SceneActor::new(ActorId(4), "tiny", DVec3::ZERO, DVec3::splat(0.1));

  let level = level_with(vec![hidden, excluded, proxy, tiny]);
  assert_eq!(level.eligibility(ActorId(1), 0), ClusterEligibility::HiddenInGame);
  assert_eq!(level.eligibility(ActorId(2), 0), ClusterEligibility::ExcludedActor);
  assert_eq!(level.eligibility(ActorId(3), 0), ClusterEligibility::IsHierarchyNode);
  assert_eq!(level.eligibility(ActorId(4), 0), ClusterEligibility::TooSmall);
}

#[test]
fn test_component_rejections() {
  let mut hidden_component = actor(1, 0.0);
  hidden_component.components[0].hidden_in_game = true;

  let mut movable = actor(2, 0.0);
  movable.components[0].movable = true;

  let mut no_components = actor(3, 0.0);
  no_components.components.clear();

  let level = level_with(vec![hidden_component, movable, no_components]);
  assert_eq!(
    level.eligibility(ActorId(1), 0),
    ClusterEligibility::ComponentHiddenInGame
  );
  assert_eq!(level.eligibility(ActorId(2), 0), ClusterEligibility::NoEligibleComponents);
  assert_eq!(level.eligibility(ActorId(3), 0), ClusterEligibility::NoEligibleComponents);
}

#[test]
fn test_tier_specific_exclusion() {
  let mut a = actor(1, 0.0);
  a.components[0].excluded_tiers = vec![0];
  let level = level_with(vec![a]);

  assert!(!level.should_include(ActorId(1), 0));
  assert!(level.should_include(ActorId(1), 1));
}

#[test]
fn test_one_visible_component_is_enough() {
  let mut a = actor(1, 0.0);
  a.components[0].hidden_in_game = true;
  a.components.push(MeshComponent::new("second", DAffine3::IDENTITY));
  let level = level_with(vec![a]);

  assert!(level.should_include(ActorId(1), 0));
  assert_eq!(level.actor(ActorId(1)).unwrap().mergeable_components(0).count(), 1);
}

// =========================================================================
// Bounds and volumes
// =========================================================================

#[test]
fn test_actor_sphere() {
  let level = level_with(vec![actor(1, 100.0)]);
  let sphere = level.bounds(ActorId(1)).unwrap();
  assert_eq!(sphere.center, DVec3::new(100.0, 0.0, 0.0));
  assert!((sphere.radius - 300.0_f64.sqrt()).abs() < 1e-9);
}

#[test]
fn test_volume_contains_actor() {
  let volume = HlodVolume {
    id: VolumeId(1),
    bounds: DAabb3::new(DVec3::splat(-100.0), DVec3::splat(100.0)),
    include_overlapping: false,
  };

  assert!(volume.encompasses(&actor(1, 0.0)));
  assert!(!volume.encompasses(&actor(2, 95.0)), "box straddles the boundary");
  assert!(!volume.encompasses(&actor(3, 500.0)));
}

#[test]
fn test_volume_include_overlapping() {
  let volume = HlodVolume {
    id: VolumeId(1),
    bounds: DAabb3::new(DVec3::splat(-100.0), DVec3::splat(100.0)),
    include_overlapping: true,
  };

  assert!(volume.encompasses(&actor(1, 95.0)));
  assert!(volume.encompasses(&actor(2, 105.0)), "pivot within box size of the volume");
  assert!(!volume.encompasses(&actor(3, 500.0)));
}

#[test]
fn test_volume_for_picks_first_match() {
  let mut level = level_with(vec![actor(1, 0.0)]);
  level.add_volume(HlodVolume {
    id: VolumeId(7),
    bounds: DAabb3::new(DVec3::splat(-50.0), DVec3::splat(50.0)),
    include_overlapping: false,
  });
  level.add_volume(HlodVolume {
    id: VolumeId(8),
    bounds: DAabb3::new(DVec3::splat(-500.0), DVec3::splat(500.0)),
    include_overlapping: false,
  });

  let a = level.actor(ActorId(1)).unwrap();
  assert_eq!(level.volume_for(a).map(|v| v.id), Some(VolumeId(7)));
}
