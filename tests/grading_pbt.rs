//! Property-based tests for grading.
//!
//! Invariants under test:
//! - Determinism: the same judged set produces the same result regardless of
//!   answer order.
//! - Classification boundaries: unit percentages map onto
//!   weak/needs-review/strong exactly at 50 and 80.
//! - Tally conservation: a unit's total equals the number of judged
//!   questions citing it.

mod common;

use proptest::prelude::*;

use tutora_backend_rust::engine::grader::{aggregate, JudgedAnswer};
use tutora_backend_rust::engine::types::{percent, Classification, Question};

use common::{fixture_curriculum, question};

const UNITS: [(&str, &str); 4] = [
    ("u-t1", "lin"),
    ("u-t2", "quad"),
    ("u-m1", "tri"),
    ("u-m2", "circ"),
];

fn arb_questions_and_answers() -> impl Strategy<Value = (Vec<Question>, Vec<JudgedAnswer>)> {
    proptest::collection::vec((0usize..UNITS.len(), any::<bool>()), 1..30).prop_map(|picks| {
        let mut questions = Vec::new();
        let mut answers = Vec::new();
        for (i, (unit_index, correct)) in picks.into_iter().enumerate() {
            let (unit, subtopic) = UNITS[unit_index];
            let id = format!("q{i}");
            questions.push(question(&id, subtopic, unit, "2"));
            answers.push(JudgedAnswer {
                question_id: id,
                answer_text: Some(if correct { "2" } else { "9" }.to_string()),
                is_correct: correct,
                judge_error: None,
            });
        }
        (questions, answers)
    })
}

proptest! {
    #[test]
    fn aggregation_is_deterministic_and_order_independent(
        (questions, answers) in arb_questions_and_answers(),
        seed in any::<u64>(),
    ) {
        let baseline = aggregate(&questions, answers.clone(), &fixture_curriculum());

        // Deterministic rerun.
        let rerun = aggregate(&questions, answers.clone(), &fixture_curriculum());
        prop_assert_eq!(
            serde_json::to_value(&baseline.unit_breakdown).unwrap(),
            serde_json::to_value(&rerun.unit_breakdown).unwrap()
        );

        // Rotated answer order must not change any percentage or class.
        let mut rotated = answers.clone();
        if !rotated.is_empty() {
            let rotate_by = (seed as usize) % rotated.len();
            rotated.rotate_left(rotate_by);
        }
        let shuffled = aggregate(&questions, rotated, &fixture_curriculum());
        prop_assert_eq!(
            serde_json::to_value(&baseline.unit_breakdown).unwrap(),
            serde_json::to_value(&shuffled.unit_breakdown).unwrap()
        );
        prop_assert_eq!(baseline.overall_score, shuffled.overall_score);
    }

    #[test]
    fn unit_totals_match_citing_questions(
        (questions, answers) in arb_questions_and_answers(),
    ) {
        let result = aggregate(&questions, answers, &fixture_curriculum());
        for unit in &result.unit_breakdown {
            let citing = questions
                .iter()
                .filter(|q| q.cited_units().contains(&unit.unit_id.as_str()))
                .count() as u32;
            prop_assert_eq!(unit.total, citing);
            prop_assert!(unit.correct <= unit.total);
            prop_assert_eq!(unit.percentage, percent(unit.correct, unit.total));
        }
    }

    #[test]
    fn classification_matches_percentage_bands(
        (questions, answers) in arb_questions_and_answers(),
    ) {
        let result = aggregate(&questions, answers, &fixture_curriculum());
        for unit in &result.unit_breakdown {
            let expected = if unit.percentage < 50 {
                Classification::Weak
            } else if unit.percentage < 80 {
                Classification::NeedsReview
            } else {
                Classification::Strong
            };
            prop_assert_eq!(unit.classification, expected);
        }
    }

    #[test]
    fn half_up_percent_stays_in_range(correct in 0u32..500, extra in 0u32..500) {
        let total = correct + extra;
        let value = percent(correct, total);
        prop_assert!(value <= 100);
        if total > 0 {
            // Half-up: value is the closest integer, ties rounded up.
            let scaled = (correct as u64) * 200 + total as u64;
            prop_assert_eq!(value as u64, scaled / (2 * total as u64));
        }
    }
}

#[test]
fn exact_boundary_examples() {
    // 49 -> weak, 50 -> needs-review, 79 -> needs-review, 80 -> strong.
    assert_eq!(Classification::from_percentage(49), Classification::Weak);
    assert_eq!(Classification::from_percentage(50), Classification::NeedsReview);
    assert_eq!(Classification::from_percentage(79), Classification::NeedsReview);
    assert_eq!(Classification::from_percentage(80), Classification::Strong);
}
