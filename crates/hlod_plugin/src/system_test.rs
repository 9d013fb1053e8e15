use std::sync::Arc;
use std::time::Duration;

use glam::{DAffine3, DVec3};

use super::*;
use crate::proxy::ThreadedMergeService;
use crate::test_utils::{config_with, line_level, tier, RecordingMergeService};

/// Two tight pairs 9 m apart; one tier-1 node per pair.
fn two_pairs() -> Level {
  line_level(&[0.0, 100.0, 1000.0, 1100.0], 10.0)
}

fn deferred_config() -> HlodConfig {
  let mut settings = tier(300.0, 50.0, 2);
  settings.simplify_mesh = true;
  config_with(vec![settings])
}

fn system_with(config: HlodConfig) -> (HlodSystem, Arc<RecordingMergeService>) {
  let service = Arc::new(RecordingMergeService::new());
  let system = HlodSystem::new(config, service.clone()).unwrap();
  (system, service)
}

fn move_actor(level: &mut Level, actor: u64, offset: DVec3) {
  let actor = level.actor_mut(ActorId(actor)).unwrap();
  for component in &mut actor.components {
    component.transform = DAffine3::from_translation(component.transform.translation + offset);
  }
}

// =========================================================================
// Construction
// =========================================================================

#[test]
fn test_new_rejects_invalid_config() {
  let service: Arc<dyn MeshMergeService> = Arc::new(RecordingMergeService::new());
  assert!(HlodSystem::new(config_with(Vec::new()), service).is_err());
}

// =========================================================================
// Blocking builds
// =========================================================================

#[test]
fn test_build_with_meshes() {
  let level = two_pairs();
  let (mut system, service) = system_with(config_with(vec![tier(300.0, 50.0, 2)]));

  let summary = system.build(&level, true).unwrap();

  assert_eq!(summary.nodes_built, 2);
  assert_eq!(summary.meshes_built, 2);
  assert_eq!(service.blocking_calls(), 2);
  for node in system.hierarchy().nodes() {
    assert!(system.is_node_built(&level, node.id()));
  }
  assert!(!system.needs_build(&level, false));
  assert!(system.needs_build(&level, true));
  assert!(system.take_dirty());
}

#[test]
fn test_build_clusters_leaves_nodes_unbuilt() {
  let level = two_pairs();
  let (mut system, service) = system_with(config_with(vec![tier(300.0, 50.0, 2)]));

  system.build_clusters(&level).unwrap();

  assert_eq!(system.hierarchy().len(), 2);
  assert_eq!(service.blocking_calls(), 0);
  assert!(system.needs_build(&level, false));
}

#[test]
fn test_moved_component_makes_key_stale() {
  let mut level = two_pairs();
  let (mut system, _) = system_with(config_with(vec![tier(300.0, 50.0, 2)]));
  system.build(&level, true).unwrap();

  let moved = system.hierarchy().parent_of(ActorId(1)).unwrap();
  let untouched = system.hierarchy().parent_of(ActorId(3)).unwrap();
  let old_key = *system.hierarchy().node(moved).unwrap().proxy_key().unwrap();

  move_actor(&mut level, 1, DVec3::new(5.0, 0.0, 0.0));

  assert!(!system.is_node_built(&level, moved));
  assert!(system.is_node_built(&level, untouched));
  assert!(system.needs_build(&level, false));

  let summary = system.build_meshes(&level, false).unwrap();
  assert_eq!(summary.meshes_built, 1);
  assert_eq!(summary.meshes_up_to_date, 1);
  assert!(system.is_node_built(&level, moved));
  assert_ne!(*system.hierarchy().node(moved).unwrap().proxy_key().unwrap(), old_key);
}

#[test]
fn test_rebuilt_upper_tier_keeps_key() {
  let level = two_pairs();
  let (mut system, _) = system_with(config_with(vec![tier(300.0, 50.0, 2), tier(5000.0, 50.0, 2)]));

  system.build(&level, true).unwrap();
  let first = system.hierarchy().nodes_at_tier(2)[0];
  let first_key = *system.hierarchy().node(first).unwrap().proxy_key().unwrap();

  system.build(&level, true).unwrap();
  let second = system.hierarchy().nodes_at_tier(2)[0];

  assert_ne!(first, second, "rebuild allocates fresh node ids");
  assert_eq!(*system.hierarchy().node(second).unwrap().proxy_key().unwrap(), first_key);
}

#[test]
fn test_force_all_rebuilds_every_node() {
  let level = two_pairs();
  let (mut system, service) = system_with(config_with(vec![tier(300.0, 50.0, 2)]));
  system.build(&level, true).unwrap();

  let summary = system.build_meshes(&level, true).unwrap();

  assert_eq!(summary.meshes_built, 2);
  assert_eq!(service.blocking_calls(), 4);
}

#[test]
fn test_failed_merge_keeps_node_unbuilt() {
  let level = two_pairs();
  let service = Arc::new(RecordingMergeService::failing());
  let mut system = HlodSystem::new(config_with(vec![tier(300.0, 50.0, 2)]), service).unwrap();

  let summary = system.build(&level, true).unwrap();

  assert_eq!(summary.nodes_built, 2);
  assert_eq!(summary.meshes_failed, 2);
  assert!(system.hierarchy().nodes().all(|n| n.mesh().is_none()));
  assert!(system.needs_build(&level, false));
}

#[test]
fn test_merge_without_mesh_asset_fails() {
  let level = two_pairs();
  let service = Arc::new(RecordingMergeService::without_mesh());
  let mut system = HlodSystem::new(config_with(vec![tier(300.0, 50.0, 2)]), service).unwrap();

  let summary = system.build(&level, true).unwrap();

  assert_eq!(summary.meshes_failed, 2);
  assert_eq!(summary.meshes_built, 0);
  assert!(system.hierarchy().nodes().all(|n| n.proxy_key().is_none()));
}

#[test]
fn test_disabled_system_builds_no_meshes() {
  let level = two_pairs();
  let mut config = config_with(vec![tier(300.0, 50.0, 2)]);
  config.enabled = false;
  let (mut system, _) = system_with(config);

  assert_eq!(system.build(&level, true).unwrap(), BuildSummary::default());
  assert_eq!(system.build_meshes(&level, true).unwrap(), BuildSummary::default());
}

// =========================================================================
// Proxy jobs
// =========================================================================

#[test]
fn test_out_of_order_delivery() {
  let level = two_pairs();
  let (mut system, service) = system_with(deferred_config());

  let summary = system.build(&level, true).unwrap();
  assert_eq!(summary.meshes_queued, 2);
  assert!(system.is_any_job_running());
  for node in system.hierarchy().nodes() {
    assert!(!system.is_node_built(&level, node.id()), "node with a job in flight is not built");
  }

  let jobs = service.jobs();
  assert!(service.deliver(jobs[1]));
  assert_eq!(system.tick().finalized, 1);
  assert!(service.deliver(jobs[0]));
  assert_eq!(system.tick().finalized, 1);

  assert!(!system.is_any_job_running());
  assert!(system.hierarchy().nodes().all(|n| n.mesh().is_some()));
  assert!(!system.needs_build(&level, false));
}

#[test]
fn test_rebuild_while_job_queued_reports_queued() {
  let level = two_pairs();
  let (mut system, service) = system_with(deferred_config());
  system.build(&level, true).unwrap();

  let summary = system.build_meshes(&level, false).unwrap();

  assert_eq!(summary.meshes_up_to_date, 2);
  assert_eq!(service.pending(), 2, "no duplicate jobs");
}

#[test]
fn test_late_delivery_after_clear_is_noop() {
  let level = two_pairs();
  let (mut system, service) = system_with(deferred_config());
  system.build(&level, true).unwrap();

  assert_eq!(system.clear_all(), 2);
  assert!(!system.is_any_job_running());

  assert_eq!(service.deliver_all(), 2);
  let report = system.tick();
  assert_eq!(report.processed(), 0);
  assert!(system.hierarchy().is_empty());
}

#[test]
fn test_rebuild_drops_outstanding_jobs() {
  let level = two_pairs();
  let (mut system, service) = system_with(deferred_config());
  system.build(&level, true).unwrap();
  let stale = service.jobs();

  system.build(&level, true).unwrap();
  for job in stale {
    assert!(service.deliver(job));
  }

  assert_eq!(system.tick().processed(), 0);
  assert_eq!(system.processor().pending_count(), 2);
}

#[test]
fn test_threaded_service_end_to_end() {
  let level = two_pairs();
  let service: Arc<dyn MeshMergeService> = Arc::new(ThreadedMergeService::default());
  let mut system = HlodSystem::new(deferred_config(), service).unwrap();

  system.build(&level, true).unwrap();

  let mut finalized = 0;
  for _ in 0..2000 {
    finalized += system.tick().finalized;
    if !system.is_any_job_running() {
      break;
    }
    std::thread::sleep(Duration::from_millis(1));
  }

  assert_eq!(finalized, 2);
  assert!(system.hierarchy().nodes().all(|n| n.mesh().is_some()));
  assert!(!system.needs_build(&level, false));
}

// =========================================================================
// Configuration
// =========================================================================

#[test]
fn test_reload_unbuilds_changed_tiers() {
  let level = two_pairs();
  let (mut system, _) = system_with(config_with(vec![tier(300.0, 50.0, 2), tier(5000.0, 50.0, 2)]));
  system.build(&level, true).unwrap();
  assert!(!system.needs_build(&level, false));

  let mut changed = system.config().clone();
  changed.tiers[1].proxy.screen_size = 600;
  assert_eq!(system.reload_config(changed).unwrap(), vec![1]);

  for node in system.hierarchy().nodes() {
    assert_eq!(node.mesh().is_some(), node.tier() == 1, "only tier 2 loses its proxy");
  }
  assert!(system.needs_build(&level, false));
}

#[test]
fn test_dropped_tier_counts_as_failed() {
  let level = two_pairs();
  let (mut system, service) = system_with(config_with(vec![tier(300.0, 50.0, 2), tier(5000.0, 50.0, 2)]));
  system.build_clusters(&level).unwrap();
  assert_eq!(system.hierarchy().nodes_at_tier(2).len(), 1);

  system.reload_config(config_with(vec![tier(300.0, 50.0, 2)])).unwrap();
  let summary = system.build_meshes(&level, false).unwrap();

  assert_eq!(summary.meshes_built, 2);
  assert_eq!(summary.meshes_failed, 1);
  assert_eq!(service.blocking_calls(), 2);
  for node in system.hierarchy().nodes_at_tier(1) {
    assert!(system.is_node_built(&level, node));
  }
}

#[test]
fn test_invalid_reload_keeps_config() {
  let (mut system, _) = system_with(config_with(vec![tier(300.0, 50.0, 2)]));
  let before = system.config().clone();

  let mut broken = before.clone();
  broken.tiers[0].desired_filling_percentage = 0.0;

  assert!(system.reload_config(broken).is_err());
  assert_eq!(system.config(), &before);
}

#[test]
fn test_effective_draw_distance_scaled() {
  let level = two_pairs();
  let mut config = config_with(vec![tier(300.0, 50.0, 2)]);
  config.distance_scale = 2.0;
  let (mut system, _) = system_with(config);
  system.build(&level, true).unwrap();

  let node = system.hierarchy().parent_of(ActorId(1)).unwrap();
  let base = system.hierarchy().node(node).unwrap().draw_distance();
  assert!(base > 0.0);
  assert!((system.effective_draw_distance(node).unwrap() - base * 2.0).abs() < 1e-9);
}

// =========================================================================
// Cluster editing
// =========================================================================

#[test]
fn test_editing_invalidates_proxy() {
  let mut level = two_pairs();
  let (mut system, _) = system_with(config_with(vec![tier(300.0, 50.0, 2)]));
  system.build(&level, true).unwrap();

  let left = system.hierarchy().parent_of(ActorId(1)).unwrap();
  let right = system.hierarchy().parent_of(ActorId(3)).unwrap();

  system.add_member_to_node(&level, left, ActorId(3)).unwrap();
  assert!(system.hierarchy().node(left).unwrap().mesh().is_none());
  assert_eq!(system.hierarchy().parent_of(ActorId(3)), Some(left));

  assert_eq!(system.exclude_actor(&mut level, ActorId(4)).unwrap(), Some(right));
  assert!(system.hierarchy().node(right).is_none(), "emptied node destroyed");

  let summary = system.build_meshes(&level, false).unwrap();
  assert_eq!(summary.meshes_built, 1);
  assert!(!system.needs_build(&level, false));
}
