//! Serial and parallel execution of an action DAG.
//!
//! Both executors share one contract: run every action whose preconditions
//! are satisfied, never signal the events of a failed action, keep going on
//! independent branches, and stop dispatching once the context is
//! cancelled. The serial executor walks a fixed topological order for
//! reproducibility; the parallel executor dispatches from a ready set with
//! bounded concurrency.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use converge_cloud::{CallContext, Cloud};

use crate::action::Action;
use crate::dag::ActionDag;
use crate::error::{Error, Result};
use crate::event::{Event, EventList};

/// Execution options shared by both executors.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Validate the DAG walk without performing any I/O.
    pub dry_run: bool,
    /// Maximum in-flight actions for the parallel executor.
    pub concurrency: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            concurrency: 4,
        }
    }
}

impl ExecutorConfig {
    /// Set dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the parallel concurrency bound.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Outcome of one executor run, keyed by action name.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// Actions that ran to completion, in completion order.
    pub completed: Vec<String>,
    /// Errors of actions that ran and failed.
    pub errors: BTreeMap<String, Error>,
    /// Actions starved because an upstream action failed.
    pub orphaned: Vec<String>,
    /// Actions never reached, e.g. after cancellation.
    pub pending: Vec<String>,
    /// Wall-clock duration of each action that ran.
    pub timings: BTreeMap<String, Duration>,
}

impl ExecutionResult {
    /// Whether every action ran and succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.orphaned.is_empty() && self.pending.is_empty()
    }
}

/// Per-action progress tracked by an executor run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Unreached,
    Running,
    Completed,
    Errored,
}

/// Runs actions one at a time in a deterministic topological order.
pub struct SerialExecutor {
    dag: ActionDag,
    config: ExecutorConfig,
}

impl SerialExecutor {
    /// Build the DAG for `actions` and prepare a serial run.
    pub fn new(actions: Vec<Arc<dyn Action>>, config: ExecutorConfig) -> Result<Self> {
        Ok(Self {
            dag: ActionDag::build(actions)?,
            config,
        })
    }

    /// Execute the DAG.
    pub async fn run(&self, ctx: &CallContext, cloud: &Cloud) -> ExecutionResult {
        let actions = self.dag.actions();
        let mut state = RunState::new(actions.len());

        for &i in self.dag.order() {
            if ctx.is_cancelled() {
                break;
            }
            let action = &actions[i];
            if !state.satisfied(action.wants()) {
                continue;
            }

            let start = Instant::now();
            let outcome = if self.config.dry_run {
                Ok(action.dry_run())
            } else {
                action.run(ctx, cloud).await
            };
            state.settle(i, action.as_ref(), outcome, start.elapsed());
        }

        state.finish(&self.dag)
    }
}

/// Runs independent actions concurrently from a ready set.
pub struct ParallelExecutor {
    dag: ActionDag,
    config: ExecutorConfig,
}

impl ParallelExecutor {
    /// Build the DAG for `actions` and prepare a parallel run.
    pub fn new(actions: Vec<Arc<dyn Action>>, config: ExecutorConfig) -> Result<Self> {
        Ok(Self {
            dag: ActionDag::build(actions)?,
            config,
        })
    }

    /// Execute the DAG with at most `config.concurrency` actions in flight.
    pub async fn run(&self, ctx: &CallContext, cloud: &Cloud) -> ExecutionResult {
        let actions = self.dag.actions();
        let mut state = RunState::new(actions.len());

        let mut ready: VecDeque<usize> = self
            .dag
            .order()
            .iter()
            .copied()
            .filter(|&i| actions[i].wants().is_empty())
            .collect();
        let mut queued: HashSet<usize> = ready.iter().copied().collect();

        let mut tasks: JoinSet<(usize, Result<EventList>, Duration)> = JoinSet::new();
        let mut in_flight = 0usize;

        loop {
            while in_flight < self.config.concurrency && !ctx.is_cancelled() {
                let Some(i) = ready.pop_front() else { break };
                let action = actions[i].clone();
                let task_ctx = ctx.clone();
                let task_cloud = cloud.clone();
                let dry_run = self.config.dry_run;
                state.mark_running(i);
                in_flight += 1;
                tasks.spawn(async move {
                    let start = Instant::now();
                    let outcome = if dry_run {
                        Ok(action.dry_run())
                    } else {
                        action.run(&task_ctx, &task_cloud).await
                    };
                    (i, outcome, start.elapsed())
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            in_flight -= 1;

            match joined {
                Ok((i, outcome, elapsed)) => {
                    let newly_emitted =
                        state.settle(i, actions[i].as_ref(), outcome, elapsed);
                    if newly_emitted.is_empty() {
                        continue;
                    }
                    // queue an action when its last missing event arrives
                    for &j in self.dag.order() {
                        if queued.contains(&j)
                            || actions[j]
                                .wants()
                                .iter()
                                .all(|w| !newly_emitted.contains(w))
                        {
                            continue;
                        }
                        if state.satisfied(actions[j].wants()) {
                            ready.push_back(j);
                            queued.insert(j);
                        }
                    }
                }
                Err(join_err) => {
                    warn!(error = %join_err, "action task failed to join");
                }
            }
        }

        state.finish(&self.dag)
    }
}

/// Shared bookkeeping for one executor run: the event store and per-action
/// progress. This is the only state shared between actions.
struct RunState {
    slots: Vec<Slot>,
    emitted: HashSet<Event>,
    completed: Vec<usize>,
    errors: HashMap<usize, Error>,
    timings: HashMap<usize, Duration>,
}

impl RunState {
    fn new(len: usize) -> Self {
        Self {
            slots: vec![Slot::Unreached; len],
            emitted: HashSet::new(),
            completed: Vec::new(),
            errors: HashMap::new(),
            timings: HashMap::new(),
        }
    }

    fn satisfied(&self, wants: &[Event]) -> bool {
        wants.iter().all(|w| self.emitted.contains(w))
    }

    fn terminal(&self, i: usize) -> bool {
        matches!(self.slots[i], Slot::Completed | Slot::Errored)
    }

    fn mark_running(&mut self, i: usize) {
        self.slots[i] = Slot::Running;
    }

    /// Record an action's outcome; returns the events newly signaled.
    fn settle(
        &mut self,
        i: usize,
        action: &dyn Action,
        outcome: Result<EventList>,
        elapsed: Duration,
    ) -> EventList {
        self.timings.insert(i, elapsed);
        match outcome {
            Ok(events) => {
                debug!(action = %action.describe(), elapsed_ms = elapsed.as_millis() as u64, "action completed");
                self.slots[i] = Slot::Completed;
                self.completed.push(i);
                // signaling is idempotent; only report first emissions
                events
                    .into_iter()
                    .filter(|e| self.emitted.insert(e.clone()))
                    .collect()
            }
            Err(err) => {
                warn!(action = %action.describe(), error = %err, "action failed; downstream events withheld");
                self.slots[i] = Slot::Errored;
                self.errors.insert(i, err);
                Vec::new()
            }
        }
    }

    /// Classify unreached actions and assemble the result.
    ///
    /// An unreached action is orphaned when one of its awaited events can no
    /// longer be emitted (every emitter failed or is itself orphaned);
    /// otherwise it is pending (typically after cancellation).
    fn finish(mut self, dag: &ActionDag) -> ExecutionResult {
        let actions = dag.actions();
        let mut orphaned: HashSet<usize> = HashSet::new();

        loop {
            let mut changed = false;
            for i in 0..actions.len() {
                if self.terminal(i) || orphaned.contains(&i) {
                    continue;
                }
                let starved = actions[i].wants().iter().any(|event| {
                    if self.emitted.contains(event) {
                        return false;
                    }
                    dag.emitters_of(event).iter().all(|&e| {
                        self.slots[e] == Slot::Errored || orphaned.contains(&e)
                    })
                });
                if starved {
                    orphaned.insert(i);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let name = |i: usize| actions[i].metadata().name.clone();
        let mut result = ExecutionResult {
            completed: self.completed.iter().map(|&i| name(i)).collect(),
            errors: self
                .errors
                .drain()
                .map(|(i, err)| (name(i), err))
                .collect(),
            orphaned: orphaned.iter().map(|&i| name(i)).collect(),
            pending: (0..actions.len())
                .filter(|&i| !self.terminal(i) && !orphaned.contains(&i))
                .map(name)
                .collect(),
            timings: self
                .timings
                .drain()
                .map(|(i, d)| (name(i), d))
                .collect(),
        };
        result.orphaned.sort();
        result.pending.sort();

        info!(
            completed = result.completed.len(),
            failed = result.errors.len(),
            orphaned = result.orphaned.len(),
            pending = result.pending.len(),
            "execution finished"
        );
        result
    }
}
