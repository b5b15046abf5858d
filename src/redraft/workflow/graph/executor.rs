//! Workflow engine - drives runs over the fixed topology

use crate::redraft::error::{CheckpointError, EngineError};
use crate::redraft::workflow::checkpoint::{Checkpoint, CheckpointStore};
use crate::redraft::workflow::policy::{ContinuationPolicy, Decision, StopReason};
use crate::redraft::workflow::state::WorkflowState;
use crate::redraft::workflow::steps::StepSet;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::types::{successor, Edge, RunStatus, StepId, ENTRY, LOOP_ENTRY};

/// Progress notification sent after each persisted step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEvent {
    pub run_id: String,
    pub sequence: u64,
    pub step: StepId,
    pub next: Option<StepId>,
    pub status: RunStatus,
    pub revision_count: u32,
    pub loop_counter: u32,
    pub evidence_len: usize,
}

impl StepEvent {
    fn from_checkpoint(checkpoint: &Checkpoint, step: StepId) -> Self {
        Self {
            run_id: checkpoint.run_id.clone(),
            sequence: checkpoint.sequence,
            step,
            next: checkpoint.next,
            status: checkpoint.status,
            revision_count: checkpoint.state.revision_count,
            loop_counter: checkpoint.state.loop_counter,
            evidence_len: checkpoint.state.evidence.len(),
        }
    }
}

/// Result of driving a run until it stops
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    /// Latest draft, or the no-draft sentinel
    pub draft: String,
    pub state: WorkflowState,
    /// Sequence of the last persisted checkpoint
    pub last_sequence: u64,
}

impl RunOutcome {
    fn new(run_id: String, status: RunStatus, state: WorkflowState, last_sequence: u64) -> Self {
        Self {
            run_id,
            status,
            draft: state.final_draft(),
            state,
            last_sequence,
        }
    }

    fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        Self::new(
            checkpoint.run_id,
            checkpoint.status,
            checkpoint.state,
            checkpoint.sequence,
        )
    }
}

/// Evaluate the continuation policy after `from`
///
/// Returns the step to schedule next (if any) and the status to record.
pub fn branch(
    policy: &ContinuationPolicy,
    from: StepId,
    state: &mut WorkflowState,
) -> Result<(Option<StepId>, RunStatus), EngineError> {
    if successor(from) != Edge::Branch {
        return Err(EngineError::InvalidBranch(from));
    }

    let decision = policy.evaluate(state);
    log::info!(
        "Branch after {}: revision {}/{}, loop {} -> {:?}",
        from,
        state.revision_count,
        state.max_revisions,
        state.loop_counter,
        decision
    );
    Ok(match decision {
        Decision::Running => (Some(LOOP_ENTRY), RunStatus::Running),
        Decision::Terminated(StopReason::Completed) => (None, RunStatus::Completed),
        Decision::Terminated(StopReason::SafetyValve) => (None, RunStatus::SafetyValve),
    })
}

type CancelFlags = Mutex<HashMap<String, Arc<AtomicBool>>>;

/// Marks a run as executing; unregisters it when dropped
struct ActiveRun<'a> {
    flags: &'a CancelFlags,
    run_id: String,
    cancelled: Arc<AtomicBool>,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        flags.remove(&self.run_id);
    }
}

/// Runs, resumes and cancels workflow runs
///
/// One engine serves any number of concurrent runs; each run executes its
/// steps strictly in sequence.
pub struct WorkflowEngine {
    steps: StepSet,
    store: Arc<dyn CheckpointStore>,
    policy: ContinuationPolicy,
    active: CancelFlags,
}

impl WorkflowEngine {
    pub fn new(
        steps: StepSet,
        store: Arc<dyn CheckpointStore>,
        policy: ContinuationPolicy,
    ) -> Result<Self, EngineError> {
        steps.validate()?;
        Ok(Self {
            steps,
            store,
            policy,
            active: Mutex::new(HashMap::new()),
        })
    }

    /// Start a new run and drive it until it stops
    pub async fn start_run(
        &self,
        task: &str,
        max_revisions: u32,
        run_id: Option<String>,
    ) -> Result<RunOutcome, EngineError> {
        self.start_run_with_events(task, max_revisions, run_id, None)
            .await
    }

    /// [`Self::start_run`], reporting each completed step on `events`
    pub async fn start_run_with_events(
        &self,
        task: &str,
        max_revisions: u32,
        run_id: Option<String>,
        events: Option<mpsc::Sender<StepEvent>>,
    ) -> Result<RunOutcome, EngineError> {
        let run_id = run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        CheckpointError::validate_run_id(&run_id)?;

        let active = self.activate(&run_id)?;
        if self.store.latest(&run_id).await?.is_some() {
            return Err(EngineError::RunExists(run_id));
        }

        log::info!(
            "Starting run {} (max_revisions: {}, task: '{}')",
            run_id,
            max_revisions,
            task
        );
        let initial = Checkpoint::new(
            run_id,
            0,
            None,
            Some(ENTRY),
            RunStatus::Running,
            WorkflowState::new(task, max_revisions),
        );
        self.store.put(&initial).await?;

        self.drive(initial, &active, events.as_ref()).await
    }

    /// Continue a run from its latest checkpoint
    pub async fn resume(&self, run_id: &str) -> Result<RunOutcome, EngineError> {
        self.resume_with_events(run_id, None).await
    }

    /// [`Self::resume`], reporting each completed step on `events`
    pub async fn resume_with_events(
        &self,
        run_id: &str,
        events: Option<mpsc::Sender<StepEvent>>,
    ) -> Result<RunOutcome, EngineError> {
        CheckpointError::validate_run_id(run_id)?;
        let active = self.activate(run_id)?;

        let latest = self
            .store
            .latest(run_id)
            .await?
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))?;

        if latest.status.is_terminal() {
            log::info!(
                "Run {} already terminated ({}), returning stored outcome",
                run_id,
                latest.status
            );
            return Ok(RunOutcome::from_checkpoint(latest));
        }

        log::info!(
            "Resuming run {} at checkpoint {} (next: {:?})",
            run_id,
            latest.sequence,
            latest.next
        );
        self.drive(latest, &active, events.as_ref()).await
    }

    /// Ask an executing run to stop before its next step
    ///
    /// Returns false when the run is not executing on this engine.
    pub fn cancel(&self, run_id: &str) -> bool {
        let flags = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match flags.get(run_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                log::info!("Cancellation requested for run {}", run_id);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, run_id: &str) -> bool {
        let flags = self.active.lock().unwrap_or_else(|e| e.into_inner());
        flags.contains_key(run_id)
    }

    /// Every checkpoint of a run, oldest first
    pub async fn history(&self, run_id: &str) -> Result<Vec<Checkpoint>, EngineError> {
        CheckpointError::validate_run_id(run_id)?;
        let history = self.store.history(run_id).await?;
        if history.is_empty() {
            return Err(EngineError::RunNotFound(run_id.to_string()));
        }
        Ok(history)
    }

    /// Latest checkpoint of a run
    pub async fn snapshot(&self, run_id: &str) -> Result<Checkpoint, EngineError> {
        CheckpointError::validate_run_id(run_id)?;
        self.store
            .latest(run_id)
            .await?
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))
    }

    /// Ids of every stored run
    pub async fn runs(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.store.runs().await?)
    }

    fn activate(&self, run_id: &str) -> Result<ActiveRun<'_>, EngineError> {
        let mut flags = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if flags.contains_key(run_id) {
            return Err(EngineError::RunActive(run_id.to_string()));
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        flags.insert(run_id.to_string(), cancelled.clone());
        Ok(ActiveRun {
            flags: &self.active,
            run_id: run_id.to_string(),
            cancelled,
        })
    }

    /// Execute steps from `checkpoint.next` until the run terminates or is cancelled
    async fn drive(
        &self,
        checkpoint: Checkpoint,
        active: &ActiveRun<'_>,
        events: Option<&mpsc::Sender<StepEvent>>,
    ) -> Result<RunOutcome, EngineError> {
        let Checkpoint {
            run_id,
            mut sequence,
            mut next,
            mut status,
            mut state,
            ..
        } = checkpoint;

        while let Some(step_id) = next {
            if active.cancelled.load(Ordering::SeqCst) {
                log::warn!("Run {} cancelled before step {}", run_id, step_id);
                return Ok(RunOutcome::new(
                    run_id,
                    RunStatus::Cancelled,
                    state,
                    sequence,
                ));
            }

            let step = self.steps.get(step_id)?;
            log::info!("Run {}: executing step {}", run_id, step_id);
            let update = step.run(&state).await;
            if update.is_empty() {
                log::debug!("Run {}: step {} left the state unchanged", run_id, step_id);
            }
            state.apply(update);

            let (following, step_status) = match successor(step_id) {
                Edge::To(to) => (Some(to), RunStatus::Running),
                Edge::Branch => branch(&self.policy, step_id, &mut state)?,
            };

            sequence += 1;
            let checkpoint = Checkpoint::new(
                run_id.clone(),
                sequence,
                Some(step_id),
                following,
                step_status,
                state.clone(),
            );
            if let Err(e) = self.store.put(&checkpoint).await {
                log::error!(
                    "Run {}: failed to persist checkpoint {}: {}",
                    run_id,
                    sequence,
                    e
                );
                return Err(e.into());
            }

            if let Some(tx) = events {
                // A dropped receiver only means nobody is listening
                let _ = tx.send(StepEvent::from_checkpoint(&checkpoint, step_id)).await;
            }

            next = following;
            status = step_status;
        }

        log::info!(
            "Run {} finished: {} after {} revisions",
            run_id,
            status,
            state.revision_count
        );
        Ok(RunOutcome::new(run_id, status, state, sequence))
    }
}
