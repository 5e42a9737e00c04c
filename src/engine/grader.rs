//! Mastery-test aggregation.
//!
//! Takes judged answers and attributes correctness to every knowledge unit a
//! question cites, then classifies units and subtopics. The judging itself
//! (external equivalence checks) happens upstream; this reduction is pure
//! and runs only after every judge call has resolved or failed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::curriculum::Curriculum;
use crate::engine::types::{percent, Classification, Question};

/// One question's judged outcome, carried into the result for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgedAnswer {
    pub question_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
    pub is_correct: bool,
    /// Set when the external judge errored or timed out; the question is
    /// then scored incorrect but grading continues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitMastery {
    pub unit_id: String,
    pub code: String,
    pub total: u32,
    pub correct: u32,
    pub percentage: u32,
    pub classification: Classification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtopicCoverage {
    pub subtopic_id: String,
    pub total: u32,
    pub correct: u32,
    pub percentage: u32,
    pub classification: Classification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryResult {
    /// Fraction of judged questions answered correctly, as a half-up
    /// integer percentage.
    pub overall_score: u32,
    pub unit_breakdown: Vec<UnitMastery>,
    pub weak_units: Vec<String>,
    pub strong_units: Vec<String>,
    pub subtopic_coverage: Vec<SubtopicCoverage>,
    pub graded: Vec<JudgedAnswer>,
}

/// Reduce judged answers into the per-unit and per-subtopic breakdown.
///
/// Every unit a question cites (primary, supporting or step citation,
/// deduplicated within the question) gets `total += 1`, and `correct += 1`
/// when that question was judged correct. Output ordering is fixed by unit
/// and subtopic id, so identical input yields identical output regardless
/// of answer order.
pub fn aggregate(
    questions: &[Question],
    judged: Vec<JudgedAnswer>,
    curriculum: &Curriculum,
) -> MasteryResult {
    let mut unit_tallies: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    let mut subtopic_tallies: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    let mut judged_questions = 0u32;
    let mut correct_questions = 0u32;

    for answer in &judged {
        let Some(question) = questions.iter().find(|q| q.id == answer.question_id) else {
            continue;
        };
        judged_questions += 1;
        if answer.is_correct {
            correct_questions += 1;
        }

        for unit_id in question.cited_units() {
            let tally = unit_tallies.entry(unit_id).or_insert((0, 0));
            tally.0 += 1;
            if answer.is_correct {
                tally.1 += 1;
            }
        }

        let tally = subtopic_tallies
            .entry(question.subtopic_id.as_str())
            .or_insert((0, 0));
        tally.0 += 1;
        if answer.is_correct {
            tally.1 += 1;
        }
    }

    let unit_breakdown: Vec<UnitMastery> = unit_tallies
        .iter()
        .map(|(unit_id, &(total, correct))| {
            let percentage = percent(correct, total);
            UnitMastery {
                unit_id: (*unit_id).to_string(),
                code: curriculum
                    .unit(unit_id)
                    .map(|u| u.code.clone())
                    .unwrap_or_default(),
                total,
                correct,
                percentage,
                classification: Classification::from_percentage(percentage),
            }
        })
        .collect();

    let weak_units: Vec<String> = unit_breakdown
        .iter()
        .filter(|u| u.classification == Classification::Weak)
        .map(|u| u.unit_id.clone())
        .collect();
    let strong_units: Vec<String> = unit_breakdown
        .iter()
        .filter(|u| u.classification == Classification::Strong)
        .map(|u| u.unit_id.clone())
        .collect();

    let subtopic_coverage: Vec<SubtopicCoverage> = subtopic_tallies
        .iter()
        .map(|(subtopic_id, &(total, correct))| {
            let percentage = percent(correct, total);
            SubtopicCoverage {
                subtopic_id: (*subtopic_id).to_string(),
                total,
                correct,
                percentage,
                classification: Classification::from_percentage(percentage),
            }
        })
        .collect();

    MasteryResult {
        overall_score: percent(correct_questions, judged_questions),
        unit_breakdown,
        weak_units,
        strong_units,
        subtopic_coverage,
        graded: judged,
    }
}
