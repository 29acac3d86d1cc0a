//! Stateful pipeline of named stages.

mod executor;
mod stage;
mod state;

pub use executor::{
    DEFAULT_STAGE_TIMEOUT, NoopObserver, PipelineExecutor, PipelineObserver, PipelineRun,
    StageOutcome, StageReport,
};
pub use stage::Stage;
pub use state::{Field, PipelineState, StateUpdate};
