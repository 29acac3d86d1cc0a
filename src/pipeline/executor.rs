//! Sequential stage runner with per-stage failure isolation.

use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use super::stage::Stage;
use super::state::{Field, PipelineState, StateUpdate};
use crate::error::{PipelineError, StageError};

pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// How a single stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    Failed { diagnostic: String },
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: StageOutcome,
    pub duration_ms: u64,
}

/// Callbacks for progress display. Both default to doing nothing.
pub trait PipelineObserver: Send + Sync {
    fn stage_started(&self, _index: usize, _total: usize, _name: &str) {}

    fn stage_finished(&self, _report: &StageReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Result of one run: the final record plus a report per stage.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub state: PipelineState,
    pub reports: Vec<StageReport>,
    pub result_field: Field,
}

impl PipelineRun {
    /// The designated result field of the final state.
    pub fn output(&self) -> &str {
        self.state.get(self.result_field)
    }

    pub fn failed_stages(&self) -> impl Iterator<Item = &StageReport> {
        self.reports.iter().filter(|r| r.outcome.is_failed())
    }
}

pub struct PipelineExecutor {
    stages: Vec<Box<dyn Stage>>,
    stage_timeout: Duration,
    result_field: Field,
    required_inputs: Vec<Field>,
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("stages", &self.stage_names())
            .field("stage_timeout", &self.stage_timeout)
            .field("result_field", &self.result_field)
            .finish()
    }
}

impl PipelineExecutor {
    /// Build from stages in execution order.
    ///
    /// Every field a stage reads must be an input field or be written by an
    /// earlier stage. Stage names are unique, input fields are never written
    /// and each output field has exactly one writer.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self, PipelineError> {
        validate_order(&stages)?;
        Ok(Self {
            stages,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            result_field: Field::Roadmap,
            required_inputs: Vec::new(),
        })
    }

    /// Build from stages in any order, sorting them by field dependencies.
    /// Independent stages keep their declaration order.
    pub fn from_dependencies(stages: Vec<Box<dyn Stage>>) -> Result<Self, PipelineError> {
        let order = dependency_order(&stages)?;

        let mut slots: Vec<Option<Box<dyn Stage>>> = stages.into_iter().map(Some).collect();
        let sorted = order
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .collect();
        Self::new(sorted)
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_result_field(mut self, field: Field) -> Self {
        self.result_field = field;
        self
    }

    /// Input fields that must be non-blank for a run to start.
    pub fn with_required_inputs(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.required_inputs = fields.into_iter().collect();
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub async fn run(&self, initial: PipelineState) -> Result<PipelineRun, PipelineError> {
        self.run_with_observer(initial, &NoopObserver).await
    }

    /// Run every stage once, in order.
    ///
    /// Only an invalid initial state is an error. A failing or timed out
    /// stage has its diagnostic written to each field it declares, and the
    /// run moves on to the next stage.
    #[instrument(skip_all, fields(stages = self.stages.len()))]
    pub async fn run_with_observer(
        &self,
        initial: PipelineState,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineRun, PipelineError> {
        for field in &self.required_inputs {
            if initial.get(*field).trim().is_empty() {
                return Err(PipelineError::InvalidState(format!(
                    "required input '{field}' is empty"
                )));
            }
        }

        let total = self.stages.len();
        let mut state = initial;
        let mut reports = Vec::with_capacity(total);
        info!("starting pipeline run");

        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.name();
            observer.stage_started(index, total, name);
            info!(stage = name, step = index + 1, total, "running stage");

            let started = Instant::now();
            let guarded = AssertUnwindSafe(stage.run(&state)).catch_unwind();
            let result = match tokio::time::timeout(self.stage_timeout, guarded).await {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => Err(StageError::Panicked(panic_message(payload.as_ref()))),
                Err(_) => Err(StageError::Timeout(self.stage_timeout)),
            };

            let outcome = match result {
                Ok(update) => {
                    merge(stage.as_ref(), &mut state, update);
                    StageOutcome::Completed
                }
                Err(err) => {
                    error!(stage = name, error = %err, "stage failed");
                    let diagnostic = format!("{}: {}", stage.failure_prefix(), err);
                    for field in stage.writes() {
                        state.set(*field, diagnostic.clone());
                    }
                    StageOutcome::Failed { diagnostic }
                }
            };

            let report = StageReport {
                name: name.to_string(),
                outcome,
                duration_ms: started.elapsed().as_millis() as u64,
            };
            info!(
                stage = name,
                duration_ms = report.duration_ms,
                failed = report.outcome.is_failed(),
                "stage finished"
            );
            observer.stage_finished(&report);
            reports.push(report);
        }

        let failed = reports.iter().filter(|r| r.outcome.is_failed()).count();
        info!(failed, "pipeline run finished");

        Ok(PipelineRun {
            state,
            reports,
            result_field: self.result_field,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn merge(stage: &dyn Stage, state: &mut PipelineState, update: StateUpdate) {
    for (field, value) in update {
        if !stage.writes().contains(&field) {
            warn!(stage = stage.name(), field = %field, "dropping write to undeclared field");
            continue;
        }
        state.set(field, value);
    }
}

fn check_unique_names(stages: &[Box<dyn Stage>]) -> Result<(), PipelineError> {
    let mut names = HashSet::new();
    for stage in stages {
        if !names.insert(stage.name()) {
            return Err(PipelineError::DuplicateStage(stage.name().to_string()));
        }
    }
    Ok(())
}

/// Map each output field to the index of the stage that writes it.
fn writers(stages: &[Box<dyn Stage>]) -> Result<HashMap<Field, usize>, PipelineError> {
    let mut writers: HashMap<Field, usize> = HashMap::new();
    for (i, stage) in stages.iter().enumerate() {
        for &field in stage.writes() {
            if field.is_input() {
                return Err(PipelineError::WritesInput {
                    stage: stage.name().to_string(),
                    field,
                });
            }
            if let Some(&first) = writers.get(&field) {
                return Err(PipelineError::MultipleWriters {
                    field,
                    first: stages[first].name().to_string(),
                    second: stage.name().to_string(),
                });
            }
            writers.insert(field, i);
        }
    }
    Ok(writers)
}

fn validate_order(stages: &[Box<dyn Stage>]) -> Result<(), PipelineError> {
    check_unique_names(stages)?;
    let writers = writers(stages)?;

    for (i, stage) in stages.iter().enumerate() {
        for &field in stage.reads() {
            if field.is_input() {
                continue;
            }
            match writers.get(&field) {
                Some(&writer) if writer < i => {}
                _ => {
                    return Err(PipelineError::MissingProducer {
                        stage: stage.name().to_string(),
                        field,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm over stage indices; the lowest ready index runs first.
fn dependency_order(stages: &[Box<dyn Stage>]) -> Result<Vec<usize>, PipelineError> {
    check_unique_names(stages)?;
    let writers = writers(stages)?;

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];
    let mut in_degree = vec![0usize; stages.len()];

    for (i, stage) in stages.iter().enumerate() {
        let mut producers = BTreeSet::new();
        for &field in stage.reads() {
            if field.is_input() {
                continue;
            }
            match writers.get(&field) {
                Some(&writer) if writer == i => {
                    return Err(PipelineError::Cycle(vec![stage.name().to_string()]));
                }
                Some(&writer) => {
                    producers.insert(writer);
                }
                None => {
                    return Err(PipelineError::MissingProducer {
                        stage: stage.name().to_string(),
                        field,
                    });
                }
            }
        }
        for producer in producers {
            dependents[producer].push(i);
            in_degree[i] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..stages.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(stages.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != stages.len() {
        let stuck = (0..stages.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| stages[i].name().to_string())
            .collect();
        return Err(PipelineError::Cycle(stuck));
    }

    Ok(order)
}
