//! Coverage validation for generated assessments.
//!
//! Generated question sets come from an untrusted oracle and are only
//! accepted once every question and solution step cites allowed knowledge
//! units and the set as a whole covers the required units. Pure and
//! deterministic; callers reject and regenerate on failure.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::engine::curriculum::Curriculum;
use crate::engine::types::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    MissingPrimaryUnit,
    UnitNotAllowedForTopic,
    UnknownSubtopic,
    StepMissingCitation,
    StepCitationNotAllowed,
    StepCodeMismatch,
    RequiredUnitUncovered,
    MissingCombinationQuestion,
}

impl ViolationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingPrimaryUnit => "question has no primary knowledge unit",
            Self::UnitNotAllowedForTopic => "primary unit is not in the topic's allowed set",
            Self::UnknownSubtopic => "question references an unknown subtopic",
            Self::StepMissingCitation => "solution step has no knowledge-unit citation",
            Self::StepCitationNotAllowed => "step citation is not in the topic's allowed set",
            Self::StepCodeMismatch => "step citation code does not match the cited unit",
            Self::RequiredUnitUncovered => "required unit is not covered by any question",
            Self::MissingCombinationQuestion => {
                "no combination question spanning two subtopics"
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    pub reason: ViolationReason,
}

impl Violation {
    fn question(question_id: &str, unit_id: Option<&str>, reason: ViolationReason) -> Self {
        Self {
            question_id: Some(question_id.to_string()),
            unit_id: unit_id.map(|u| u.to_string()),
            reason,
        }
    }

    fn unit(unit_id: &str, reason: ViolationReason) -> Self {
        Self {
            question_id: None,
            unit_id: Some(unit_id.to_string()),
            reason,
        }
    }
}

/// Validate a generated question set against the required unit ids.
///
/// Returns `Ok(())` only when all four coverage rules hold; otherwise the
/// full violation list, never a truncated one, so the caller can hand the
/// generator everything that needs fixing in one round trip.
pub fn validate(
    questions: &[Question],
    required_units: &[String],
    curriculum: &Curriculum,
) -> Result<(), Vec<Violation>> {
    let mut violations: Vec<Violation> = Vec::new();
    let mut covered: HashSet<&str> = HashSet::new();
    let mut has_combination = false;

    for question in questions {
        let Some(topic) = curriculum.topic_of_subtopic(&question.subtopic_id) else {
            violations.push(Violation::question(
                &question.id,
                None,
                ViolationReason::UnknownSubtopic,
            ));
            continue;
        };
        let allowed = curriculum.allowed_units_for_topic(&topic.id);

        if question.primary_unit.is_empty() {
            violations.push(Violation::question(
                &question.id,
                None,
                ViolationReason::MissingPrimaryUnit,
            ));
        } else if !allowed.contains(question.primary_unit.as_str()) {
            violations.push(Violation::question(
                &question.id,
                Some(&question.primary_unit),
                ViolationReason::UnitNotAllowedForTopic,
            ));
        } else {
            covered.insert(question.primary_unit.as_str());
        }

        for unit_id in &question.supporting_units {
            if allowed.contains(unit_id.as_str()) {
                covered.insert(unit_id.as_str());
            } else {
                violations.push(Violation::question(
                    &question.id,
                    Some(unit_id),
                    ViolationReason::UnitNotAllowedForTopic,
                ));
            }
        }

        for step in &question.steps {
            if step.unit_id.is_empty() {
                violations.push(Violation::question(
                    &question.id,
                    None,
                    ViolationReason::StepMissingCitation,
                ));
                continue;
            }
            if !allowed.contains(step.unit_id.as_str()) {
                violations.push(Violation::question(
                    &question.id,
                    Some(&step.unit_id),
                    ViolationReason::StepCitationNotAllowed,
                ));
                continue;
            }
            if curriculum
                .unit(&step.unit_id)
                .map(|u| u.code != step.unit_code)
                .unwrap_or(true)
            {
                violations.push(Violation::question(
                    &question.id,
                    Some(&step.unit_id),
                    ViolationReason::StepCodeMismatch,
                ));
            }
        }

        if question.is_combination && cites_two_subtopics(question, curriculum) {
            has_combination = true;
        }
    }

    for unit_id in required_units {
        if !covered.contains(unit_id.as_str()) {
            violations.push(Violation::unit(unit_id, ViolationReason::RequiredUnitUncovered));
        }
    }

    if !has_combination {
        violations.push(Violation {
            question_id: None,
            unit_id: None,
            reason: ViolationReason::MissingCombinationQuestion,
        });
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn cites_two_subtopics(question: &Question, curriculum: &Curriculum) -> bool {
    let subtopics: HashSet<&str> = question
        .cited_units()
        .iter()
        .filter_map(|id| curriculum.unit(id))
        .map(|u| u.subtopic_id.as_str())
        .collect();
    subtopics.len() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::curriculum::CurriculumSpec;
    use crate::engine::types::{DifficultyTier, KnowledgeUnit, SolutionStep, Subtopic, Topic};

    fn curriculum() -> Curriculum {
        Curriculum::new(CurriculumSpec {
            topics: vec![
                Topic { id: "alg".into(), name: "Algebra".into(), sequence: 1 },
                Topic { id: "geo".into(), name: "Geometry".into(), sequence: 2 },
            ],
            subtopics: vec![
                Subtopic { id: "lin".into(), topic_id: "alg".into(), name: "Linear equations".into(), sequence: 1 },
                Subtopic { id: "quad".into(), topic_id: "alg".into(), name: "Quadratics".into(), sequence: 2 },
                Subtopic { id: "tri".into(), topic_id: "geo".into(), name: "Triangles".into(), sequence: 1 },
            ],
            units: vec![
                unit("u-t1", "T1", "alg", "lin", false),
                unit("u-t2", "T2", "alg", "quad", false),
                unit("u-f1", "F1", "geo", "tri", true),
            ],
        })
        .unwrap()
    }

    fn unit(id: &str, code: &str, topic: &str, subtopic: &str, foundational: bool) -> KnowledgeUnit {
        KnowledgeUnit {
            id: id.into(),
            code: code.into(),
            topic_id: topic.into(),
            subtopic_id: subtopic.into(),
            title: code.into(),
            is_foundational: foundational,
            prerequisites: vec![],
        }
    }

    fn question(id: &str, subtopic: &str, primary: &str) -> Question {
        Question {
            id: id.into(),
            subtopic_id: subtopic.into(),
            difficulty: DifficultyTier::Medium,
            prompt: String::new(),
            expected_answer: "x=2".into(),
            primary_unit: primary.into(),
            supporting_units: vec![],
            steps: vec![SolutionStep {
                index: 0,
                unit_id: primary.into(),
                unit_code: code_of(primary),
                text: String::new(),
            }],
            is_combination: false,
        }
    }

    fn code_of(unit_id: &str) -> String {
        match unit_id {
            "u-t1" => "T1".into(),
            "u-t2" => "T2".into(),
            "u-f1" => "F1".into(),
            other => other.to_uppercase(),
        }
    }

    fn combination_question() -> Question {
        let mut q = question("q-comb", "lin", "u-t1");
        q.supporting_units = vec!["u-t2".into()];
        q.is_combination = true;
        q
    }

    #[test]
    fn accepts_covering_set() {
        let questions = vec![question("q1", "lin", "u-t1"), combination_question()];
        let required = vec!["u-t1".to_string(), "u-t2".to_string()];
        assert!(validate(&questions, &required, &curriculum()).is_ok());
    }

    #[test]
    fn accepted_set_covers_every_required_unit() {
        let questions = vec![question("q1", "lin", "u-t1"), combination_question()];
        let required = vec!["u-t1".to_string(), "u-t2".to_string()];
        if validate(&questions, &required, &curriculum()).is_ok() {
            let cited: std::collections::HashSet<String> = questions
                .iter()
                .flat_map(|q| {
                    std::iter::once(q.primary_unit.clone())
                        .chain(q.supporting_units.iter().cloned())
                })
                .collect();
            for unit in &required {
                assert!(cited.contains(unit), "unit {unit} not covered");
            }
        }
    }

    #[test]
    fn reports_uncovered_required_unit() {
        let questions = vec![question("q1", "lin", "u-t1"), combination_question()];
        let required = vec!["u-t1".to_string(), "u-f1".to_string()];
        let violations = validate(&questions, &required, &curriculum()).unwrap_err();
        assert!(violations.iter().any(|v| {
            v.reason == ViolationReason::RequiredUnitUncovered
                && v.unit_id.as_deref() == Some("u-f1")
        }));
    }

    #[test]
    fn rejects_foreign_topic_primary_unit() {
        // u-t1 belongs to algebra and is not foundational, so a geometry
        // question cannot cite it.
        let questions = vec![question("q1", "tri", "u-t1"), combination_question()];
        let violations = validate(&questions, &[], &curriculum()).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| v.reason == ViolationReason::UnitNotAllowedForTopic));
    }

    #[test]
    fn foundational_unit_is_allowed_from_any_topic() {
        let mut q = question("q1", "lin", "u-f1");
        q.steps[0].unit_id = "u-f1".into();
        q.steps[0].unit_code = "F1".into();
        let questions = vec![q, combination_question()];
        assert!(validate(&questions, &[], &curriculum()).is_ok());
    }

    #[test]
    fn rejects_step_without_citation() {
        let mut q = question("q1", "lin", "u-t1");
        q.steps[0].unit_id = String::new();
        let questions = vec![q, combination_question()];
        let violations = validate(&questions, &[], &curriculum()).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| v.reason == ViolationReason::StepMissingCitation));
    }

    #[test]
    fn rejects_step_code_mismatch() {
        let mut q = question("q1", "lin", "u-t1");
        q.steps[0].unit_code = "T9".into();
        let questions = vec![q, combination_question()];
        let violations = validate(&questions, &[], &curriculum()).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| v.reason == ViolationReason::StepCodeMismatch));
    }

    #[test]
    fn requires_combination_question() {
        let questions = vec![question("q1", "lin", "u-t1")];
        let violations = validate(&questions, &[], &curriculum()).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| v.reason == ViolationReason::MissingCombinationQuestion));
    }

    #[test]
    fn combination_flag_alone_is_not_enough() {
        // Flagged combination question citing a single subtopic does not
        // satisfy the rule.
        let mut q = question("q1", "lin", "u-t1");
        q.is_combination = true;
        let violations = validate(&[q], &[], &curriculum()).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| v.reason == ViolationReason::MissingCombinationQuestion));
    }
}
