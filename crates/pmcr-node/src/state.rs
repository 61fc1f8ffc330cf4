//! Application state.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use pmcr_core::{CycleEntry, CycleResult, Intent};
use pmcr_cycle::{CancellationToken, CycleOrchestrator};
use pmcr_history::{CycleRecord, HistoryStore, InMemoryHistoryStore};
use pmcr_stages::StageSet;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::NodeConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Runs cycles against the configured stages.
    pub orchestrator: Arc<CycleOrchestrator>,

    /// In-process stages served on `/api/v1/stages/*`.
    pub local_stages: StageSet,

    /// Cycles started on this node.
    pub cycles: Arc<RwLock<CycleRegistry>>,

    /// One record per finished cycle.
    pub history: Arc<dyn HistoryStore>,

    /// Limits how many cycles run at once.
    pub permits: Arc<Semaphore>,

    pub started_at: Instant,
}

/// A cycle and the token that cancels it.
#[derive(Clone)]
pub struct CycleSlot {
    pub entry: CycleEntry,
    pub cancel: CancellationToken,
}

/// Running cycles plus a bounded tail of finished ones.
///
/// Once more than `max_finished` cycles have finished, the oldest finished
/// cycles are evicted. Running cycles are never evicted.
pub struct CycleRegistry {
    slots: HashMap<String, CycleSlot>,
    finished: VecDeque<String>,
    max_finished: usize,
}

impl CycleRegistry {
    pub fn new(max_finished: usize) -> Self {
        Self {
            slots: HashMap::new(),
            finished: VecDeque::new(),
            max_finished,
        }
    }

    pub fn insert(&mut self, cycle_id: String, slot: CycleSlot) {
        self.slots.insert(cycle_id, slot);
    }

    pub fn get(&self, cycle_id: &str) -> Option<&CycleSlot> {
        self.slots.get(cycle_id)
    }

    pub fn slots(&self) -> impl Iterator<Item = &CycleSlot> {
        self.slots.values()
    }

    /// Store the result of a cycle and evict the oldest finished cycles
    /// above the limit.
    pub fn finish(&mut self, cycle_id: &str, result: CycleResult) {
        let Some(slot) = self.slots.get_mut(cycle_id) else {
            return;
        };
        slot.entry.finish(result);
        self.finished.push_back(cycle_id.to_string());

        while self.finished.len() > self.max_finished {
            if let Some(evicted) = self.finished.pop_front() {
                debug!(cycle_id = %evicted, "Evicting finished cycle");
                self.slots.remove(&evicted);
            }
        }
    }

    /// Drop a cycle, running or finished.
    pub fn remove(&mut self, cycle_id: &str) -> Option<CycleSlot> {
        self.finished.retain(|id| id != cycle_id);
        self.slots.remove(cycle_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Why a cancel request was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelRefused {
    Unknown,
    AlreadyFinished(Box<CycleEntry>),
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        orchestrator: CycleOrchestrator,
        max_concurrent_cycles: usize,
        max_finished_cycles: usize,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            local_stages: StageSet::rule_based(),
            cycles: Arc::new(RwLock::new(CycleRegistry::new(max_finished_cycles))),
            history: Arc::new(InMemoryHistoryStore::new()),
            permits: Arc::new(Semaphore::new(max_concurrent_cycles)),
            started_at: Instant::now(),
        }
    }

    /// Build the state described by `config`.
    pub fn from_config(config: &NodeConfig) -> anyhow::Result<Self> {
        let orchestrator =
            CycleOrchestrator::new(config.stages.build(), config.cycle.to_cycle_config())?;
        Ok(Self::new(
            orchestrator,
            config.server.max_concurrent_cycles,
            config.server.max_finished_cycles,
        ))
    }

    /// Register a cycle for `intent` and run it in the background.
    ///
    /// The cycle waits for a free permit before its first stage call. The
    /// cycle deadline starts once the permit is held, so time spent queued
    /// is not counted. Its result is recorded in the history and in the
    /// cycle's entry.
    pub async fn launch(
        &self,
        intent: Intent,
    ) -> (String, CancellationToken, JoinHandle<CycleResult>) {
        let cycle_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();

        {
            let mut cycles = self.cycles.write().await;
            cycles.insert(
                cycle_id.clone(),
                CycleSlot {
                    entry: CycleEntry::running(&cycle_id, &intent.id),
                    cancel: cancel.clone(),
                },
            );
        }

        let state = self.clone();
        let id = cycle_id.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            // The semaphore is never closed, so this only waits.
            let _permit = state.permits.acquire().await;
            debug!(cycle_id = %id, "Cycle admitted");

            let result = state.orchestrator.run_cycle_as(id.clone(), intent, token).await;
            state.finish(&id, result.clone()).await;
            result
        });

        (cycle_id, cancel, handle)
    }

    async fn finish(&self, cycle_id: &str, result: CycleResult) {
        info!(
            cycle_id,
            status = ?result.status,
            iterations = result.iterations,
            duration_ms = result.duration_ms(),
            "Cycle finished"
        );

        if let Some(record) = CycleRecord::from_result(&result) {
            if let Err(e) = self.history.append(record).await {
                error!(cycle_id, "Failed to record cycle: {}", e);
            }
        }

        self.cycles.write().await.finish(cycle_id, result);
    }

    /// Drop a cycle from the registry.
    pub async fn forget(&self, cycle_id: &str) {
        self.cycles.write().await.remove(cycle_id);
    }

    /// Get a cycle by id.
    pub async fn get_cycle(&self, cycle_id: &str) -> Option<CycleEntry> {
        let cycles = self.cycles.read().await;
        cycles.get(cycle_id).map(|slot| slot.entry.clone())
    }

    /// All cycles, oldest first.
    pub async fn list_cycles(&self) -> Vec<CycleEntry> {
        let cycles = self.cycles.read().await;
        let mut entries: Vec<CycleEntry> = cycles.slots().map(|s| s.entry.clone()).collect();
        entries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        entries
    }

    /// Request cancellation of a running cycle.
    pub async fn cancel_cycle(&self, cycle_id: &str) -> Result<CycleEntry, CancelRefused> {
        let cycles = self.cycles.read().await;
        let slot = cycles.get(cycle_id).ok_or(CancelRefused::Unknown)?;

        if !slot.entry.is_running() {
            return Err(CancelRefused::AlreadyFinished(Box::new(slot.entry.clone())));
        }

        info!(cycle_id, "🛑 Cancelling cycle");
        slot.cancel.cancel();
        Ok(slot.entry.clone())
    }

    /// Number of cycles not yet finished.
    pub async fn active_cycles(&self) -> usize {
        let cycles = self.cycles.read().await;
        cycles.slots().filter(|s| s.entry.is_running()).count()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use pmcr_core::protocol::{PlanReply, PlanRequest};
    use pmcr_core::{CycleConfig, CycleStatus, StageError};
    use pmcr_stages::PlanStage;

    use super::*;

    /// Waits before handing the call to the wrapped planner.
    struct SlowPlan {
        inner: Arc<dyn PlanStage>,
        delay: Duration,
    }

    #[async_trait]
    impl PlanStage for SlowPlan {
        async fn invoke(&self, request: PlanRequest) -> Result<PlanReply, StageError> {
            tokio::time::sleep(self.delay).await;
            self.inner.invoke(request).await
        }
    }

    /// State running the rule-based stages in-process.
    pub(crate) fn rule_based_state() -> AppState {
        let orchestrator = CycleOrchestrator::new(
            StageSet::rule_based(),
            CycleConfig::new(5, Duration::from_secs(5)),
        )
        .unwrap();
        AppState::new(orchestrator, 4, 8)
    }

    fn fibonacci() -> Intent {
        Intent::builder()
            .content("Create a Python function to calculate Fibonacci numbers")
            .language("python")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_launch_records_result() {
        let state = rule_based_state();
        let (cycle_id, _cancel, handle) = state.launch(fibonacci()).await;

        let result = handle.await.unwrap();
        assert_eq!(result.status, CycleStatus::Converged);
        assert_eq!(result.cycle_id, cycle_id);

        let entry = state.get_cycle(&cycle_id).await.unwrap();
        assert!(!entry.is_running());
        assert_eq!(entry.status, CycleStatus::Converged);
        assert_eq!(state.history.len().await, 1);
        assert_eq!(state.active_cycles().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_refusals() {
        let state = rule_based_state();
        assert_eq!(
            state.cancel_cycle("missing").await,
            Err(CancelRefused::Unknown)
        );

        let (cycle_id, _cancel, handle) = state.launch(fibonacci()).await;
        handle.await.unwrap();
        assert!(matches!(
            state.cancel_cycle(&cycle_id).await,
            Err(CancelRefused::AlreadyFinished(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_input_is_not_recorded() {
        let state = rule_based_state();
        let intent = Intent::builder().content("   ").build().unwrap();
        let (_, _, handle) = state.launch(intent).await;

        let result = handle.await.unwrap();
        assert_eq!(result.status, CycleStatus::Failed);
        assert_eq!(state.history.len().await, 0);
    }

    #[tokio::test]
    async fn test_oldest_finished_cycles_are_evicted() {
        let orchestrator = CycleOrchestrator::new(
            StageSet::rule_based(),
            CycleConfig::new(5, Duration::from_secs(5)),
        )
        .unwrap();
        let state = AppState::new(orchestrator, 4, 2);

        let mut ids = Vec::new();
        for _ in 0..5 {
            let (cycle_id, _cancel, handle) = state.launch(fibonacci()).await;
            handle.await.unwrap();
            ids.push(cycle_id);
        }

        assert_eq!(state.cycles.read().await.len(), 2);
        assert!(state.get_cycle(&ids[2]).await.is_none());
        assert!(state.get_cycle(&ids[3]).await.is_some());
        assert!(state.get_cycle(&ids[4]).await.is_some());
        assert_eq!(state.history.len().await, 5);
    }

    #[tokio::test]
    async fn test_forget_removes_cycle() {
        let state = rule_based_state();
        let (cycle_id, _cancel, handle) = state.launch(fibonacci()).await;
        handle.await.unwrap();

        state.forget(&cycle_id).await;
        assert!(state.get_cycle(&cycle_id).await.is_none());
        assert!(state.cycles.read().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_time_does_not_count_toward_deadline() {
        let rules = StageSet::rule_based();
        let slow = SlowPlan {
            inner: rules.plan.clone(),
            delay: Duration::from_millis(90),
        };
        let stages = rules.with_plan(Arc::new(slow));
        let config = CycleConfig::new(2, Duration::from_millis(100))
            .with_deadline(Duration::from_millis(800));
        let state = AppState::new(CycleOrchestrator::new(stages, config).unwrap(), 1, 8);

        let started = tokio::time::Instant::now();
        let mut handles = Vec::new();
        for _ in 0..6 {
            let (_, _, handle) = state.launch(fibonacci()).await;
            handles.push(handle);
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().status, CycleStatus::Converged);
        }

        // Six two-pass cycles in series outlast a single cycle's deadline.
        assert!(started.elapsed() > Duration::from_millis(800));
    }
}
