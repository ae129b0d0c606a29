//! Property-based tests for the core invariants:
//! - difficulty ladder bounds under arbitrary answer sequences
//! - readiness monotonicity in level and accuracy
//! - streak update purity/determinism
//! - blank-generator determinism per (student, question, attempt)
//! - mastery monotonicity under consistently correct answers

mod common;

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use proptest::prelude::*;

use praxis_core::blanks::{self, BlankCandidate, BlankCount, RoundRule};
use praxis_core::config::MasteryParams;
use praxis_core::types::TestAttempt;
use praxis_core::{gamification, mastery, readiness, selector};

use common::{answer, fixed_now, ladder_pool, question};

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (2024i32..=2027, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

proptest! {
    #[test]
    fn ladder_stays_in_band_for_any_answer_sequence(
        outcomes in prop::collection::vec(any::<bool>(), 1..40),
        start_tier in 1i32..=10,
        target_count in 1usize..=15,
    ) {
        let pool = ladder_pool("c1");
        let mut attempt = TestAttempt::new("s1", target_count, true);

        let mut picked = selector::select_first_question(&mut attempt, &pool, start_tier);
        prop_assert!((1..=10).contains(&attempt.current_difficulty));

        for outcome in outcomes {
            let Some(q) = picked else { break };
            let log = answer(&q.id, outcome, q.difficulty);
            picked = selector::select_next_question(&mut attempt, &pool, &log);
            prop_assert!((1..=10).contains(&attempt.current_difficulty));
        }

        prop_assert!(attempt.questions_asked() <= target_count.min(pool.len()));

        // once the target is reached the difficulty is frozen
        if attempt.has_reached_target() {
            let frozen = attempt.current_difficulty;
            let log = answer("stale", true, frozen);
            prop_assert!(selector::select_next_question(&mut attempt, &pool, &log).is_none());
            prop_assert_eq!(attempt.current_difficulty, frozen);
        }

        // asked list never contains duplicates
        let mut ids = attempt.asked_question_ids.clone();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), attempt.questions_asked());
    }

    #[test]
    fn readiness_tier_is_monotone(
        level_lo in 1i32..=15,
        level_hi in 1i32..=15,
        accuracy_lo in 0.0f64..=1.0,
        accuracy_hi in 0.0f64..=1.0,
    ) {
        let (level_lo, level_hi) = (level_lo.min(level_hi), level_lo.max(level_hi));
        let (accuracy_lo, accuracy_hi) = (
            accuracy_lo.min(accuracy_hi),
            accuracy_lo.max(accuracy_hi),
        );

        // fixed accuracy, increasing level never lowers the tier
        let fixed_accuracy = accuracy_lo;
        let tier_low_level = readiness::starting_difficulty(
            readiness::readiness_score(level_lo, fixed_accuracy),
        );
        let tier_high_level = readiness::starting_difficulty(
            readiness::readiness_score(level_hi, fixed_accuracy),
        );
        prop_assert!(tier_high_level >= tier_low_level);

        // fixed level, increasing accuracy never lowers the tier
        let fixed_level = level_lo;
        let tier_low_accuracy = readiness::starting_difficulty(
            readiness::readiness_score(fixed_level, accuracy_lo),
        );
        let tier_high_accuracy = readiness::starting_difficulty(
            readiness::readiness_score(fixed_level, accuracy_hi),
        );
        prop_assert!(tier_high_accuracy >= tier_low_accuracy);
    }

    #[test]
    fn streak_update_is_a_pure_function(
        streak in 0i32..=400,
        last in prop::option::of(arb_date()),
        today in arb_date(),
    ) {
        let first = gamification::update_streak(streak, last, today);
        let second = gamification::update_streak(streak, last, today);
        prop_assert_eq!(first.streak, second.streak);
        prop_assert_eq!(first.broken, second.broken);
        prop_assert!(first.streak >= 1 || (first.streak == streak && last.is_some()));
    }

    #[test]
    fn blank_generation_is_deterministic_per_attempt(
        attempt_count in 0u32..=8,
        seed_suffix in 0u32..=50,
        min in 0usize..=3,
        span in 0usize..=3,
    ) {
        let content = "a stitch in time saves nine so act before the gap widens";
        let candidates: Vec<BlankCandidate> = (0..12)
            .map(|i| BlankCandidate { word_index: i, importance: (i as f64) / 12.0 })
            .collect();
        let rules = vec![
            RoundRule { round: 1, count: BlankCount::Fixed(2), min_importance: 0.3 },
            RoundRule {
                round: 3,
                count: BlankCount::Range { min, max: min + span },
                min_importance: 0.5,
            },
        ];
        let attempt_id = format!("attempt-{seed_suffix}");

        let first = blanks::generate(
            content, &candidates, &rules, attempt_count, "s1", "q1", &attempt_id,
        );
        let second = blanks::generate(
            content, &candidates, &rules, attempt_count, "s1", "q1", &attempt_id,
        );
        prop_assert_eq!(&first.display_content, &second.display_content);
        prop_assert_eq!(&first.blank_answers, &second.blank_answers);

        // answer key always reconstructs the original words
        let words: Vec<&str> = content.split_whitespace().collect();
        for blank in second.blank_answers.values() {
            prop_assert_eq!(blank.answer.as_str(), words[blank.word_index]);
        }
    }

    #[test]
    fn mastery_percent_never_regresses_under_correct_answers(
        rounds in 1usize..=40,
    ) {
        let questions: HashMap<_, _> =
            [("q1".to_string(), question("q1", "c1", 5))].into_iter().collect();
        let params = MasteryParams::default();
        let mut masteries = BTreeMap::new();

        let mut previous = 0.0f64;
        let mut was_mastered = false;
        for _ in 0..rounds {
            let outcome = mastery::apply_attempt(
                &mut masteries,
                "s1",
                &questions,
                &[answer("q1", true, 5)],
                &params,
                fixed_now(),
            )
            .unwrap();
            let percent = outcome.updates[0].mastery_percent;
            prop_assert!((0.0..=100.0).contains(&percent));
            prop_assert!(percent + 1e-9 >= previous);
            previous = percent;

            if was_mastered {
                prop_assert!(masteries["c1"].mastered);
            }
            was_mastered = masteries["c1"].mastered;
        }
    }
}
