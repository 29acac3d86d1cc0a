use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::PipelineConfig;
use crate::error::RequestError;
use crate::pipeline::{PipelineRun, PipelineState, StageReport};
use crate::utils::meaningful_len;

/// A request to generate a roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapRequest {
    pub topic: String,
    pub resume: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jd: Option<String>,
}

impl RoadmapRequest {
    pub fn new(topic: impl Into<String>, resume: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            resume: resume.into(),
            jd: None,
        }
    }

    pub fn with_jd(mut self, jd: impl Into<String>) -> Self {
        self.jd = Some(jd.into());
        self
    }

    /// Reject requests the pipeline cannot work with.
    pub fn validate(&self, limits: &PipelineConfig) -> Result<(), RequestError> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(RequestError::EmptyTopic);
        }

        let len = topic.chars().count();
        if len > limits.max_topic_chars {
            return Err(RequestError::TopicTooLong {
                len,
                max: limits.max_topic_chars,
            });
        }

        let len = meaningful_len(&self.resume);
        if len < limits.min_resume_chars {
            return Err(RequestError::ResumeTooShort {
                len,
                min: limits.min_resume_chars,
            });
        }

        Ok(())
    }

    /// Initial pipeline state. The topic is trimmed and a blank job
    /// description is left empty.
    pub fn to_state(&self) -> PipelineState {
        let jd = self.jd.as_deref().map(str::trim).unwrap_or_default();
        PipelineState::new(self.topic.trim(), self.resume.as_str(), jd)
    }
}

/// Everything a run produced, plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapResponse {
    pub run_id: String,
    pub topic: String,
    pub roadmap: String,
    pub skill_gaps: String,
    pub curriculum: String,
    pub resources: String,
    pub analysis: String,
    pub rag_context: String,
    pub indexed_chunks: usize,
    pub stages: Vec<StageReport>,
    pub processing_time_ms: u64,
    pub generated_at: DateTime<Utc>,
}

impl RoadmapResponse {
    pub fn from_run(
        run_id: String,
        run: PipelineRun,
        indexed_chunks: usize,
        processing_time_ms: u64,
    ) -> Self {
        let state = run.state;
        Self {
            run_id,
            topic: state.topic,
            roadmap: state.roadmap,
            skill_gaps: state.skill_gaps,
            curriculum: state.curriculum,
            resources: state.resources,
            analysis: state.analysis,
            rag_context: state.rag_context,
            indexed_chunks,
            stages: run.reports,
            processing_time_ms,
            generated_at: Utc::now(),
        }
    }

    pub fn failed_stages(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|r| r.outcome.is_failed())
    }
}
