//! The record threaded through a pipeline run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Every field a [`PipelineState`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Topic,
    Resume,
    Jd,
    Analysis,
    SkillGaps,
    Curriculum,
    RagContext,
    Resources,
    Roadmap,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Topic,
        Field::Resume,
        Field::Jd,
        Field::Analysis,
        Field::SkillGaps,
        Field::Curriculum,
        Field::RagContext,
        Field::Resources,
        Field::Roadmap,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Topic => "topic",
            Field::Resume => "resume",
            Field::Jd => "jd",
            Field::Analysis => "analysis",
            Field::SkillGaps => "skill_gaps",
            Field::Curriculum => "curriculum",
            Field::RagContext => "rag_context",
            Field::Resources => "resources",
            Field::Roadmap => "roadmap",
        }
    }

    /// Input fields are supplied by the caller and never written by stages.
    pub fn is_input(self) -> bool {
        matches!(self, Field::Topic | Field::Resume | Field::Jd)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Work in progress for one run. An empty string means "not produced yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub topic: String,
    pub resume: String,
    pub jd: String,
    pub analysis: String,
    pub skill_gaps: String,
    pub curriculum: String,
    pub rag_context: String,
    pub resources: String,
    pub roadmap: String,
}

impl PipelineState {
    pub fn new(topic: impl Into<String>, resume: impl Into<String>, jd: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            resume: resume.into(),
            jd: jd.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Topic => &self.topic,
            Field::Resume => &self.resume,
            Field::Jd => &self.jd,
            Field::Analysis => &self.analysis,
            Field::SkillGaps => &self.skill_gaps,
            Field::Curriculum => &self.curriculum,
            Field::RagContext => &self.rag_context,
            Field::Resources => &self.resources,
            Field::Roadmap => &self.roadmap,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        *self.slot_mut(field) = value.into();
    }

    fn slot_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Topic => &mut self.topic,
            Field::Resume => &mut self.resume,
            Field::Jd => &mut self.jd,
            Field::Analysis => &mut self.analysis,
            Field::SkillGaps => &mut self.skill_gaps,
            Field::Curriculum => &mut self.curriculum,
            Field::RagContext => &mut self.rag_context,
            Field::Resources => &mut self.resources,
            Field::Roadmap => &mut self.roadmap,
        }
    }

    pub fn is_produced(&self, field: Field) -> bool {
        !self.get(field).is_empty()
    }
}

/// Fields returned by a stage, merged into the running state with overwrite
/// semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    fields: BTreeMap<Field, String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl IntoIterator for StateUpdate {
    type Item = (Field, String);
    type IntoIter = std::collections::btree_map::IntoIter<Field, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
