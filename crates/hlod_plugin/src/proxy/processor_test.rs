use std::sync::Arc;

use glam::DVec3;

use super::*;
use crate::proxy::MemoryContentStore;
use crate::test_utils::{line_level, mesh_assets, test_key};
use crate::types::{ActorId, ClusterMember};

/// Hierarchy with `count` two-actor nodes.
fn make_nodes(count: usize) -> (Hierarchy, MemoryContentStore, Vec<NodeId>) {
  let xs: Vec<f64> = (0..count * 2).map(|i| i as f64 * 100.0).collect();
  let level = line_level(&xs, 10.0);
  let mut hierarchy = Hierarchy::new();
  let mut store = MemoryContentStore::new();
  let mut nodes = Vec::new();
  for i in 0..count as u64 {
    let members = [
      ClusterMember::Leaf(ActorId(i * 2 + 1)),
      ClusterMember::Leaf(ActorId(i * 2 + 2)),
    ];
    nodes.push(hierarchy.create_node(1, &members, &level, &mut store).unwrap());
  }
  hierarchy.take_dirty();
  (hierarchy, store, nodes)
}

fn enqueue(processor: &ProxyJobProcessor, node: NodeId) -> JobId {
  processor.enqueue_job(node, 0, ProxySettings::default(), test_key("job"))
}

// =========================================================================
// Lifecycle
// =========================================================================

#[test]
fn test_enqueue_is_pending() {
  let (_, _, nodes) = make_nodes(1);
  let processor = ProxyJobProcessor::new();
  let job = enqueue(&processor, nodes[0]);

  assert_eq!(processor.job_state(job), Some(JobState::Pending));
  assert_eq!(processor.job_for_node(nodes[0]), Some(job));
  assert!(processor.is_any_job_running());
  assert_eq!(processor.pending_count(), 1);
}

#[test]
fn test_delivery_moves_to_ready() {
  let (_, _, nodes) = make_nodes(1);
  let processor = ProxyJobProcessor::new();
  let job = enqueue(&processor, nodes[0]);

  assert!(processor.on_assets_delivered(job, mesh_assets(DVec3::ZERO, 100.0)));
  assert_eq!(processor.job_state(job), Some(JobState::ReadyToProcess));
  assert_eq!(processor.pending_count(), 0);
  assert_eq!(processor.ready_count(), 1);
  assert!(processor.is_any_job_running());
}

#[test]
fn test_tick_finalizes_ready_job() {
  let (mut hierarchy, mut store, nodes) = make_nodes(1);
  let config = HlodConfig::default();
  let mut processor = ProxyJobProcessor::new();
  let key = test_key("finalize");
  let job = processor.enqueue_job(nodes[0], 0, ProxySettings::default(), key);
  let assets = mesh_assets(DVec3::ZERO, 100.0);
  let mesh_id = assets[2].id;
  processor.on_assets_delivered(job, assets);

  let report = processor.tick(&mut hierarchy, &mut store, &config);

  assert_eq!(report.finalized, 1);
  assert_eq!(report.processed(), 1);
  let node = hierarchy.node(nodes[0]).unwrap();
  assert_eq!(node.mesh().map(|m| m.asset), Some(mesh_id));
  assert_eq!(node.proxy_key(), Some(&key));
  assert!(store.contains_key(0, &key));
  assert!(hierarchy.is_dirty());
  assert!(!processor.is_any_job_running());
  assert_eq!(processor.job_state(job), None);
  assert_eq!(processor.finalize_timings().len(), 1);
}

#[test]
fn test_empty_tick() {
  let (mut hierarchy, mut store, _) = make_nodes(1);
  let mut processor = ProxyJobProcessor::new();
  let report = processor.tick(&mut hierarchy, &mut store, &HlodConfig::default());
  assert_eq!(report, TickReport::default());
  assert!(!hierarchy.is_dirty());
}

#[test]
fn test_out_of_order_delivery() {
  let (mut hierarchy, mut store, nodes) = make_nodes(5);
  let mut processor = ProxyJobProcessor::new();
  let jobs: Vec<JobId> = nodes.iter().map(|&n| enqueue(&processor, n)).collect();

  processor.on_assets_delivered(jobs[3], mesh_assets(DVec3::ZERO, 100.0));
  processor.on_assets_delivered(jobs[1], mesh_assets(DVec3::ZERO, 100.0));

  let report = processor.tick(&mut hierarchy, &mut store, &HlodConfig::default());

  assert_eq!(report.finalized, 2);
  for (i, (&job, &node)) in jobs.iter().zip(&nodes).enumerate() {
    let built = hierarchy.node(node).unwrap().mesh().is_some();
    if i == 1 || i == 3 {
      assert!(built, "job {} should be finalized", i + 1);
      assert_eq!(processor.job_state(job), None);
    } else {
      assert!(!built, "job {} should still wait", i + 1);
      assert_eq!(processor.job_state(job), Some(JobState::Pending));
    }
  }
  assert!(processor.is_any_job_running());
}

// =========================================================================
// Cancellation and failure
// =========================================================================

#[test]
fn test_clear_then_late_delivery_is_noop() {
  let (mut hierarchy, mut store, nodes) = make_nodes(1);
  let mut processor = ProxyJobProcessor::new();
  let job = enqueue(&processor, nodes[0]);

  processor.clear_all();
  assert!(!processor.is_any_job_running());

  assert!(!processor.on_assets_delivered(job, mesh_assets(DVec3::ZERO, 100.0)));
  let report = processor.tick(&mut hierarchy, &mut store, &HlodConfig::default());

  assert_eq!(report.processed(), 0);
  assert!(hierarchy.node(nodes[0]).unwrap().mesh().is_none());
  assert!(!processor.is_any_job_running());
}

#[test]
fn test_clear_drops_ready_jobs() {
  let (_, _, nodes) = make_nodes(2);
  let processor = ProxyJobProcessor::new();
  let a = enqueue(&processor, nodes[0]);
  enqueue(&processor, nodes[1]);
  processor.on_assets_delivered(a, Vec::new());

  processor.clear_all();
  assert_eq!(processor.pending_count(), 0);
  assert_eq!(processor.ready_count(), 0);
}

#[test]
fn test_no_mesh_counts_as_failure() {
  let (mut hierarchy, mut store, nodes) = make_nodes(2);
  let mut processor = ProxyJobProcessor::new();
  let bad = enqueue(&processor, nodes[0]);
  let good = enqueue(&processor, nodes[1]);

  let mut assets = mesh_assets(DVec3::ZERO, 100.0);
  assets.pop();
  processor.on_assets_delivered(bad, assets);
  processor.on_assets_delivered(good, mesh_assets(DVec3::ZERO, 100.0));

  let report = processor.tick(&mut hierarchy, &mut store, &HlodConfig::default());

  assert_eq!(report.failed, 1);
  assert_eq!(report.finalized, 1, "a failed job does not stop the others");
  assert!(hierarchy.node(nodes[0]).unwrap().mesh().is_none());
  assert!(hierarchy.node(nodes[1]).unwrap().mesh().is_some());
  assert!(!processor.is_any_job_running());
}

#[test]
fn test_destroyed_target_is_discarded() {
  let (mut hierarchy, mut store, nodes) = make_nodes(1);
  let mut processor = ProxyJobProcessor::new();
  let job = enqueue(&processor, nodes[0]);
  hierarchy.destroy_node(nodes[0], &mut store).unwrap();

  processor.on_assets_delivered(job, mesh_assets(DVec3::ZERO, 100.0));
  let report = processor.tick(&mut hierarchy, &mut store, &HlodConfig::default());

  assert_eq!(report.discarded, 1);
  assert!(store.is_empty());
}

// =========================================================================
// Threads
// =========================================================================

#[test]
fn test_callback_from_worker_threads() {
  let (mut hierarchy, mut store, nodes) = make_nodes(8);
  let mut processor = ProxyJobProcessor::new();
  let jobs: Vec<JobId> = nodes.iter().map(|&n| enqueue(&processor, n)).collect();

  let callback = processor.delivery_callback();
  let handles: Vec<_> = jobs
    .iter()
    .map(|&job| {
      let callback = Arc::clone(&callback);
      std::thread::spawn(move || callback(job, mesh_assets(DVec3::ZERO, 100.0)))
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(processor.ready_count(), 8);
  let report = processor.tick(&mut hierarchy, &mut store, &HlodConfig::default());
  assert_eq!(report.finalized, 8);
  assert!(hierarchy.nodes().all(|n| n.mesh().is_some()));
}

#[test]
fn test_job_ids_unique() {
  let a = JobId::new();
  let b = JobId::new();
  assert_ne!(a, b);
  assert_eq!(a.to_string(), a.as_uuid().to_string());
}
