//! Curriculum lookup tables.
//!
//! Topics, subtopics and knowledge units are resolved by stable ID through
//! this structure. It is loaded once from configuration and injected into
//! the components that need it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::types::{KnowledgeUnit, Subtopic, Topic};

#[derive(Debug, Error)]
pub enum CurriculumError {
    #[error("failed to read curriculum file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse curriculum: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("subtopic {subtopic_id} references unknown topic {topic_id}")]
    UnknownTopic { subtopic_id: String, topic_id: String },
    #[error("unit {unit_id} references unknown subtopic {subtopic_id}")]
    UnknownSubtopic { unit_id: String, subtopic_id: String },
}

/// Serialized curriculum shape, as stored in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumSpec {
    pub topics: Vec<Topic>,
    pub subtopics: Vec<Subtopic>,
    pub units: Vec<KnowledgeUnit>,
}

#[derive(Debug, Clone, Default)]
pub struct Curriculum {
    topics: HashMap<String, Topic>,
    subtopics: HashMap<String, Subtopic>,
    units: HashMap<String, KnowledgeUnit>,
    topic_order: Vec<String>,
    subtopic_order: Vec<String>,
}

impl Curriculum {
    pub fn new(spec: CurriculumSpec) -> Result<Self, CurriculumError> {
        let topics: HashMap<String, Topic> =
            spec.topics.into_iter().map(|t| (t.id.clone(), t)).collect();

        for subtopic in &spec.subtopics {
            if !topics.contains_key(&subtopic.topic_id) {
                return Err(CurriculumError::UnknownTopic {
                    subtopic_id: subtopic.id.clone(),
                    topic_id: subtopic.topic_id.clone(),
                });
            }
        }
        let subtopics: HashMap<String, Subtopic> =
            spec.subtopics.into_iter().map(|s| (s.id.clone(), s)).collect();

        for unit in &spec.units {
            if !subtopics.contains_key(&unit.subtopic_id) {
                return Err(CurriculumError::UnknownSubtopic {
                    unit_id: unit.id.clone(),
                    subtopic_id: unit.subtopic_id.clone(),
                });
            }
        }
        let units: HashMap<String, KnowledgeUnit> =
            spec.units.into_iter().map(|u| (u.id.clone(), u)).collect();

        let mut topic_order: Vec<String> = topics.keys().cloned().collect();
        topic_order.sort_by_key(|id| (topics[id].sequence, id.clone()));

        let mut subtopic_order: Vec<String> = subtopics.keys().cloned().collect();
        subtopic_order.sort_by_key(|id| {
            let s = &subtopics[id];
            let topic_seq = topics.get(&s.topic_id).map(|t| t.sequence).unwrap_or(i32::MAX);
            (topic_seq, s.sequence, id.clone())
        });

        Ok(Self {
            topics,
            subtopics,
            units,
            topic_order,
            subtopic_order,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CurriculumError> {
        let raw = std::fs::read_to_string(path)?;
        let spec: CurriculumSpec = serde_json::from_str(&raw)?;
        Self::new(spec)
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.get(id)
    }

    pub fn subtopic(&self, id: &str) -> Option<&Subtopic> {
        self.subtopics.get(id)
    }

    pub fn unit(&self, id: &str) -> Option<&KnowledgeUnit> {
        self.units.get(id)
    }

    /// Topic ids in curriculum sequence order.
    pub fn topic_order(&self) -> &[String] {
        &self.topic_order
    }

    /// Subtopic ids in curriculum order (topic sequence, then subtopic
    /// sequence).
    pub fn subtopic_order(&self) -> &[String] {
        &self.subtopic_order
    }

    pub fn subtopics_of_topic(&self, topic_id: &str) -> Vec<&Subtopic> {
        let mut out: Vec<&Subtopic> = self
            .subtopics
            .values()
            .filter(|s| s.topic_id == topic_id)
            .collect();
        out.sort_by_key(|s| (s.sequence, s.id.clone()));
        out
    }

    /// Curriculum position of a topic, used as the secondary ordering key
    /// when two topics have equal mastery.
    pub fn topic_sequence(&self, topic_id: &str) -> i32 {
        self.topics.get(topic_id).map(|t| t.sequence).unwrap_or(i32::MAX)
    }

    /// Units a question from the given topic may cite: the topic's own units
    /// plus the foundational pool shared by all topics.
    pub fn allowed_units_for_topic(&self, topic_id: &str) -> HashSet<&str> {
        self.units
            .values()
            .filter(|u| u.topic_id == topic_id || u.is_foundational)
            .map(|u| u.id.as_str())
            .collect()
    }

    pub fn units_of_subtopic(&self, subtopic_id: &str) -> Vec<&KnowledgeUnit> {
        let mut out: Vec<&KnowledgeUnit> = self
            .units
            .values()
            .filter(|u| u.subtopic_id == subtopic_id)
            .collect();
        out.sort_by_key(|u| u.id.clone());
        out
    }

    /// Topic a subtopic belongs to, resolved through the table rather than
    /// any name matching.
    pub fn topic_of_subtopic(&self, subtopic_id: &str) -> Option<&Topic> {
        let subtopic = self.subtopics.get(subtopic_id)?;
        self.topics.get(&subtopic.topic_id)
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
