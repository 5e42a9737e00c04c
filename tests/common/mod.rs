#![allow(dead_code)]

use tutora_backend_rust::engine::curriculum::{Curriculum, CurriculumSpec};
use tutora_backend_rust::engine::types::{
    AnswerSubmission, DifficultyTier, KnowledgeUnit, Question, SolutionStep, Subtopic, Topic,
};
use tutora_backend_rust::store::CompetencyStore;

/// Two-topic fixture: algebra carries units T1/T2, geometry carries M1/M2.
pub fn fixture_curriculum() -> Curriculum {
    Curriculum::new(CurriculumSpec {
        topics: vec![
            Topic { id: "alg".into(), name: "Algebra".into(), sequence: 1 },
            Topic { id: "geo".into(), name: "Geometry".into(), sequence: 2 },
        ],
        subtopics: vec![
            Subtopic { id: "lin".into(), topic_id: "alg".into(), name: "Linear equations".into(), sequence: 1 },
            Subtopic { id: "quad".into(), topic_id: "alg".into(), name: "Quadratics".into(), sequence: 2 },
            Subtopic { id: "tri".into(), topic_id: "geo".into(), name: "Triangles".into(), sequence: 1 },
            Subtopic { id: "circ".into(), topic_id: "geo".into(), name: "Circles".into(), sequence: 2 },
        ],
        units: vec![
            unit("u-t1", "T1", "alg", "lin"),
            unit("u-t2", "T2", "alg", "quad"),
            unit("u-m1", "M1", "geo", "tri"),
            unit("u-m2", "M2", "geo", "circ"),
        ],
    })
    .expect("fixture curriculum is consistent")
}

fn unit(id: &str, code: &str, topic: &str, subtopic: &str) -> KnowledgeUnit {
    KnowledgeUnit {
        id: id.into(),
        code: code.into(),
        topic_id: topic.into(),
        subtopic_id: subtopic.into(),
        title: code.into(),
        is_foundational: false,
        prerequisites: vec![],
    }
}

pub async fn memory_store() -> CompetencyStore {
    CompetencyStore::connect("sqlite::memory:")
        .await
        .expect("in-memory store")
}

pub fn question(id: &str, subtopic: &str, primary_unit: &str, expected: &str) -> Question {
    Question {
        id: id.into(),
        subtopic_id: subtopic.into(),
        difficulty: DifficultyTier::Medium,
        prompt: format!("question {id}"),
        expected_answer: expected.into(),
        primary_unit: primary_unit.into(),
        supporting_units: vec![],
        steps: vec![SolutionStep {
            index: 0,
            unit_id: primary_unit.into(),
            unit_code: code_for(primary_unit),
            text: format!("apply {primary_unit}"),
        }],
        is_combination: false,
    }
}

pub fn submission(question_id: &str, answer: &str) -> AnswerSubmission {
    AnswerSubmission {
        question_id: question_id.into(),
        answer_text: Some(answer.into()),
    }
}

fn code_for(unit_id: &str) -> String {
    match unit_id {
        "u-t1" => "T1".into(),
        "u-t2" => "T2".into(),
        "u-m1" => "M1".into(),
        "u-m2" => "M2".into(),
        other => other.to_uppercase(),
    }
}
