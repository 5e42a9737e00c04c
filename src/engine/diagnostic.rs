//! Diagnostic analysis.
//!
//! Aggregates judged question-level correctness into a per-student
//! competency profile: subtopic levels, strengths and weaknesses,
//! misconception patterns and a recommended starting unit. Pure function of
//! its input; persistence of the resulting profile is the caller's job.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::engine::curriculum::Curriculum;
use crate::engine::types::{percent, AnswerRecord};

/// Subtopic level at or above this is a strength.
pub const STRENGTH_LEVEL: u32 = 70;
/// Subtopic level below this is a weakness.
pub const WEAKNESS_LEVEL: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtopicVerdict {
    Strength,
    Neutral,
    Weakness,
}

impl SubtopicVerdict {
    pub fn from_level(level: u32) -> Self {
        if level >= STRENGTH_LEVEL {
            Self::Strength
        } else if level < WEAKNESS_LEVEL {
            Self::Weakness
        } else {
            Self::Neutral
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtopicLevel {
    pub subtopic_id: String,
    pub topic_id: String,
    pub answered: u32,
    pub correct: u32,
    /// Half-up integer percentage.
    pub level: u32,
    pub verdict: SubtopicVerdict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MisconceptionPattern {
    pub tag: String,
    pub occurrences: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyProfile {
    /// One entry per subtopic with at least one answered question, in
    /// curriculum order. Untested subtopics are omitted, not scored zero.
    pub subtopic_levels: Vec<SubtopicLevel>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub misconception_patterns: Vec<MisconceptionPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_starting_unit: Option<String>,
}

pub fn analyze(responses: &[AnswerRecord], curriculum: &Curriculum) -> CompetencyProfile {
    let mut counts: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for response in responses {
        let entry = counts.entry(response.subtopic_id.as_str()).or_insert((0, 0));
        entry.0 += 1;
        if response.is_correct {
            entry.1 += 1;
        }
    }

    let mut subtopic_levels: Vec<SubtopicLevel> = Vec::with_capacity(counts.len());
    for subtopic_id in curriculum.subtopic_order() {
        let Some(&(answered, correct)) = counts.get(subtopic_id.as_str()) else {
            continue;
        };
        let level = percent(correct, answered);
        let topic_id = curriculum
            .topic_of_subtopic(subtopic_id)
            .map(|t| t.id.clone())
            .unwrap_or_default();
        subtopic_levels.push(SubtopicLevel {
            subtopic_id: subtopic_id.clone(),
            topic_id,
            answered,
            correct,
            level,
            verdict: SubtopicVerdict::from_level(level),
        });
    }
    // Subtopics outside the curriculum tables still get scored; they land
    // after the ordered ones so output stays deterministic.
    for (subtopic_id, &(answered, correct)) in &counts {
        if subtopic_levels.iter().any(|s| s.subtopic_id == *subtopic_id) {
            continue;
        }
        let level = percent(correct, answered);
        subtopic_levels.push(SubtopicLevel {
            subtopic_id: (*subtopic_id).to_string(),
            topic_id: String::new(),
            answered,
            correct,
            level,
            verdict: SubtopicVerdict::from_level(level),
        });
    }

    let strengths: Vec<String> = subtopic_levels
        .iter()
        .filter(|s| s.verdict == SubtopicVerdict::Strength)
        .map(|s| s.subtopic_id.clone())
        .collect();
    let weaknesses: Vec<String> = subtopic_levels
        .iter()
        .filter(|s| s.verdict == SubtopicVerdict::Weakness)
        .map(|s| s.subtopic_id.clone())
        .collect();

    let misconception_patterns = collect_misconceptions(responses);
    let recommended_starting_unit =
        recommend_starting_unit(&subtopic_levels, &weaknesses, curriculum);

    CompetencyProfile {
        subtopic_levels,
        strengths,
        weaknesses,
        misconception_patterns,
        recommended_starting_unit,
    }
}

/// Distinct misconception tags across incorrect responses, deduplicated by
/// tag string, in first-seen order.
fn collect_misconceptions(responses: &[AnswerRecord]) -> Vec<MisconceptionPattern> {
    let mut patterns: Vec<MisconceptionPattern> = Vec::new();
    for response in responses {
        if response.is_correct {
            continue;
        }
        let Some(tag) = response.misconception_tag.as_deref() else {
            continue;
        };
        if tag.is_empty() {
            continue;
        }
        match patterns.iter_mut().find(|p| p.tag == tag) {
            Some(existing) => existing.occurrences += 1,
            None => patterns.push(MisconceptionPattern {
                tag: tag.to_string(),
                occurrences: 1,
            }),
        }
    }
    patterns
}

/// Pick where remediation should start: the lowest-level weakness whose
/// prerequisite units are all outside the weak set, falling back to the
/// first untested subtopic in curriculum order.
fn recommend_starting_unit(
    levels: &[SubtopicLevel],
    weaknesses: &[String],
    curriculum: &Curriculum,
) -> Option<String> {
    let weak_set: HashSet<&str> = weaknesses.iter().map(|s| s.as_str()).collect();

    let mut weak_levels: Vec<&SubtopicLevel> = levels
        .iter()
        .filter(|s| weak_set.contains(s.subtopic_id.as_str()))
        .collect();
    weak_levels.sort_by_key(|s| s.level);

    for weak in &weak_levels {
        for unit in curriculum.units_of_subtopic(&weak.subtopic_id) {
            let unresolved = unit.prerequisites.iter().any(|prereq_id| {
                curriculum
                    .unit(prereq_id)
                    .map(|p| weak_set.contains(p.subtopic_id.as_str()))
                    .unwrap_or(false)
            });
            if !unresolved {
                return Some(unit.id.clone());
            }
        }
    }
    // Every candidate unit sits on a weak prerequisite chain; start at the
    // lowest weakness anyway rather than recommending nothing.
    if let Some(weak) = weak_levels.first() {
        if let Some(unit) = curriculum.units_of_subtopic(&weak.subtopic_id).first() {
            return Some(unit.id.clone());
        }
    }

    let tested: HashSet<&str> = levels.iter().map(|s| s.subtopic_id.as_str()).collect();
    curriculum
        .subtopic_order()
        .iter()
        .find(|id| !tested.contains(id.as_str()))
        .and_then(|id| curriculum.units_of_subtopic(id).first().map(|u| u.id.clone()))
}
