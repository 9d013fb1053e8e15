//! ProxyJobProcessor - hand-off between asynchronous merge workers and the
//! polling thread.
//!
//! Jobs move `Pending -> ReadyToProcess -> finalized`. Workers only ever touch
//! the shared queues through [`ProxyJobProcessor::on_assets_delivered`] (or
//! the [`DeliveryCallback`] wrapping it); hierarchy nodes are mutated solely by
//! [`ProxyJobProcessor::tick`], outside the lock.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;
use web_time::Instant;

use super::build::finalize_node;
use super::key::ProxyKey;
use super::service::{DeliveryCallback, ProxyAsset};
use super::store::ContentStore;
use crate::config::{HlodConfig, ProxySettings};
use crate::error::HlodError;
use crate::hierarchy::Hierarchy;
use crate::stats::{RollingWindow, TickReport};
use crate::types::NodeId;

/// Correlation id of a proxy build job.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct JobId(Uuid);

impl JobId {
  /// Generate a random v4 id.
  pub fn new() -> Self {
    Self(Uuid::new_v4())
  }

  pub fn as_uuid(&self) -> &Uuid {
    &self.0
  }
}

impl Default for JobId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for JobId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// Where a job is in its lifecycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JobState {
  /// Waiting for the merge service.
  Pending,
  /// Assets delivered, waiting for the next tick.
  ReadyToProcess,
}

/// Asynchronous proxy build for one node.
#[derive(Clone, Debug)]
pub struct ProxyBuildJob {
  pub id: JobId,
  pub target: NodeId,
  /// Build pass index of the target node.
  pub tier: usize,
  pub settings: ProxySettings,
  /// Key of the content sent to the merge service.
  pub key: ProxyKey,
  pub collected_assets: Vec<ProxyAsset>,
  pub state: JobState,
  enqueued_at: Instant,
}

#[derive(Default)]
struct JobQueues {
  pending: HashMap<JobId, ProxyBuildJob>,
  ready: VecDeque<ProxyBuildJob>,
}

/// Guarded bookkeeping stays consistent across a panic in another holder.
fn lock(shared: &Mutex<JobQueues>) -> MutexGuard<'_, JobQueues> {
  shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn deliver(shared: &Mutex<JobQueues>, job: JobId, assets: Vec<ProxyAsset>) -> bool {
  let mut queues = lock(shared);
  let entry = queues.pending.remove(&job);
  match entry {
    Some(mut entry) => {
      entry.collected_assets = assets;
      entry.state = JobState::ReadyToProcess;
      queues.ready.push_back(entry);
      true
    }
    None => {
      drop(queues);
      tracing::warn!(%job, "assets delivered for unknown or cleared job");
      false
    }
  }
}

/// Thread-safe proxy job queue.
///
/// `enqueue_job`, `on_assets_delivered`, `clear_all` and the queries may be
/// called from any thread. `tick` must only ever run on one thread.
pub struct ProxyJobProcessor {
  shared: Arc<Mutex<JobQueues>>,
  /// Finalize time per job in microseconds.
  finalize_timings: RollingWindow<u64>,
}

impl ProxyJobProcessor {
  pub fn new() -> Self {
    Self {
      shared: Arc::new(Mutex::new(JobQueues::default())),
      finalize_timings: RollingWindow::default(),
    }
  }

  /// Queue a job for `target` in the `Pending` state.
  pub fn enqueue_job(&self, target: NodeId, tier: usize, settings: ProxySettings, key: ProxyKey) -> JobId {
    let id = JobId::new();
    let job = ProxyBuildJob {
      id,
      target,
      tier,
      settings,
      key,
      collected_assets: Vec::new(),
      state: JobState::Pending,
      enqueued_at: Instant::now(),
    };
    lock(&self.shared).pending.insert(id, job);
    tracing::debug!(job = %id, node = target.raw(), "proxy job enqueued");
    id
  }

  /// Move a pending job to the ready queue with its assets.
  ///
  /// Returns false (and changes nothing) if the job is unknown, e.g. it was
  /// cleared while the merge was running.
  pub fn on_assets_delivered(&self, job: JobId, assets: Vec<ProxyAsset>) -> bool {
    deliver(&self.shared, job, assets)
  }

  /// Callback handed to the merge service; forwards to `on_assets_delivered`.
  pub fn delivery_callback(&self) -> DeliveryCallback {
    let shared = Arc::clone(&self.shared);
    Arc::new(move |job, assets| {
      deliver(&shared, job, assets);
    })
  }

  /// Finalize every ready job into its target node.
  ///
  /// The ready queue is drained under the lock; node updates happen after it
  /// is released. Failures are logged and counted per job.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "proxy::tick"))]
  pub fn tick(&mut self, hierarchy: &mut Hierarchy, store: &mut dyn ContentStore, config: &HlodConfig) -> TickReport {
    let ready: Vec<ProxyBuildJob> = lock(&self.shared).ready.drain(..).collect();

    let mut report = TickReport::default();
    for job in ready {
      let start = Instant::now();
      match finalize_node(hierarchy, store, config, job.target, job.tier, job.key, &job.collected_assets) {
        Ok(()) => {
          report.finalized += 1;
          tracing::info!(
            job = %job.id,
            node = job.target.raw(),
            waited_ms = job.enqueued_at.elapsed().as_millis() as u64,
            "proxy mesh finalized"
          );
        }
        Err(HlodError::UnknownNode(node)) => {
          report.discarded += 1;
          tracing::warn!(job = %job.id, node = node.raw(), "target node gone, discarding proxy");
        }
        Err(err) => {
          report.failed += 1;
          tracing::error!(job = %job.id, %err, "proxy build failed");
        }
      }
      self.finalize_timings.push(start.elapsed().as_micros() as u64);
    }
    report
  }

  /// Drop all pending and ready jobs. Late deliveries become no-ops.
  pub fn clear_all(&self) {
    let mut queues = lock(&self.shared);
    let dropped = queues.pending.len() + queues.ready.len();
    queues.pending.clear();
    queues.ready.clear();
    drop(queues);
    if dropped > 0 {
      tracing::info!(dropped, "cleared proxy jobs");
    }
  }

  /// True while any job is pending or ready.
  pub fn is_any_job_running(&self) -> bool {
    let queues = lock(&self.shared);
    !queues.pending.is_empty() || !queues.ready.is_empty()
  }

  pub fn job_state(&self, job: JobId) -> Option<JobState> {
    let queues = lock(&self.shared);
    if queues.pending.contains_key(&job) {
      Some(JobState::Pending)
    } else if queues.ready.iter().any(|j| j.id == job) {
      Some(JobState::ReadyToProcess)
    } else {
      None
    }
  }

  /// Job currently in flight for `node`, if any.
  pub fn job_for_node(&self, node: NodeId) -> Option<JobId> {
    let queues = lock(&self.shared);
    queues
      .pending
      .values()
      .chain(queues.ready.iter())
      .find(|j| j.target == node)
      .map(|j| j.id)
  }

  pub fn pending_count(&self) -> usize {
    lock(&self.shared).pending.len()
  }

  pub fn ready_count(&self) -> usize {
    lock(&self.shared).ready.len()
  }

  /// Recent per-job finalize times (microseconds).
  pub fn finalize_timings(&self) -> &RollingWindow<u64> {
    &self.finalize_timings
  }
}

impl Default for ProxyJobProcessor {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
#[path = "processor_test.rs"]
mod processor_test;
