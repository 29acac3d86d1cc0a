use async_trait::async_trait;

use super::state::{Field, PipelineState, StateUpdate};
use crate::error::StageError;

/// One named step of a pipeline.
///
/// A stage declares which fields it reads and which it writes; the executor
/// uses those declarations to order and validate the pipeline, and writes the
/// failure diagnostic into every declared output when [`Stage::run`] fails.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn reads(&self) -> &[Field];

    fn writes(&self) -> &[Field];

    /// Leading text of the diagnostic recorded when the stage fails.
    fn failure_prefix(&self) -> String {
        format!("Error in {}", self.name())
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate, StageError>;
}
