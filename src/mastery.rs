use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::MasteryParams;
use crate::error::CoreError;
use crate::types::{AnswerLog, ConceptMastery, Question};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryUpdate {
    pub concept_id: String,
    pub mastery_percent: f64,
    pub newly_mastered: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryOutcome {
    pub updates: Vec<MasteryUpdate>,
}

impl MasteryOutcome {
    pub fn newly_mastered(&self) -> Vec<String> {
        self.updates
            .iter()
            .filter(|u| u.newly_mastered)
            .map(|u| u.concept_id.clone())
            .collect()
    }
}

/// Folds one completed attempt's answers into per-concept mastery rows.
///
/// Answers are grouped by concept through each question's concept
/// reference; a question id missing from the supplied pool is a contract
/// violation. Mastery is monotonic: the `mastered` flag is set exactly
/// once, never cleared, and the reported percentage never falls back
/// below the threshold afterwards.
pub fn apply_attempt(
    masteries: &mut BTreeMap<String, ConceptMastery>,
    student_id: &str,
    questions: &HashMap<String, Question>,
    answers: &[AnswerLog],
    params: &MasteryParams,
    now: DateTime<Utc>,
) -> Result<MasteryOutcome, CoreError> {
    let mut by_concept: BTreeMap<String, Vec<&AnswerLog>> = BTreeMap::new();
    for answer in answers {
        let question = questions
            .get(&answer.question_id)
            .ok_or_else(|| CoreError::UnknownQuestion(answer.question_id.clone()))?;
        by_concept
            .entry(question.concept_id.clone())
            .or_default()
            .push(answer);
    }

    let mut outcome = MasteryOutcome::default();
    for (concept_id, concept_answers) in by_concept {
        let entry = masteries
            .entry(concept_id.clone())
            .or_insert_with(|| ConceptMastery::new(student_id, &concept_id));

        for answer in &concept_answers {
            entry.attempt_count += 1;
            if answer.is_correct {
                entry.correct_count += 1;
            }
            entry.average_score += (answer.score.clamp(0.0, 100.0) - entry.average_score)
                * params.score_smoothing;
        }

        let blended = params.accuracy_weight * entry.accuracy() * 100.0
            + params.score_weight * entry.average_score;
        let mut percent = blended.clamp(0.0, 100.0);
        if entry.mastered {
            // mastered implies percentage stays at or above the threshold
            percent = percent.max(params.threshold);
        }
        entry.mastery_percent = percent;

        let newly_mastered = !entry.mastered && percent >= params.threshold;
        if newly_mastered {
            entry.mastered = true;
            entry.mastered_at = Some(now);
            info!(student_id, concept_id = %concept_id, percent, "concept mastered");
        }

        outcome.updates.push(MasteryUpdate {
            concept_id,
            mastery_percent: percent,
            newly_mastered,
        });
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, concept_id: &str) -> Question {
        Question {
            id: id.to_string(),
            concept_id: concept_id.to_string(),
            difficulty: 5,
            active: true,
        }
    }

    fn answer(question_id: &str, is_correct: bool, score: f64) -> AnswerLog {
        AnswerLog {
            question_id: question_id.to_string(),
            selected_answer: "a".to_string(),
            is_correct,
            difficulty: 5,
            combo_count: 0,
            score,
            answered_at: Utc::now(),
        }
    }

    fn pool(concepts: &[(&str, &str)]) -> HashMap<String, Question> {
        concepts
            .iter()
            .map(|(qid, cid)| (qid.to_string(), question(qid, cid)))
            .collect()
    }

    #[test]
    fn groups_answers_by_concept() {
        let questions = pool(&[("q1", "c1"), ("q2", "c1"), ("q3", "c2")]);
        let answers = vec![
            answer("q1", true, 100.0),
            answer("q2", false, 0.0),
            answer("q3", true, 100.0),
        ];
        let mut masteries = BTreeMap::new();
        let outcome = apply_attempt(
            &mut masteries,
            "s1",
            &questions,
            &answers,
            &MasteryParams::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(outcome.updates.len(), 2);
        assert_eq!(masteries["c1"].attempt_count, 2);
        assert_eq!(masteries["c1"].correct_count, 1);
        assert_eq!(masteries["c2"].attempt_count, 1);
    }

    #[test]
    fn consistent_correct_answers_reach_mastery() {
        let questions = pool(&[("q1", "c1")]);
        let params = MasteryParams::default();
        let mut masteries = BTreeMap::new();

        let mut previous = 0.0;
        let mut mastered_at_round = None;
        for round in 0..20 {
            let outcome = apply_attempt(
                &mut masteries,
                "s1",
                &questions,
                &[answer("q1", true, 100.0)],
                &params,
                Utc::now(),
            )
            .unwrap();
            let update = &outcome.updates[0];
            assert!(update.mastery_percent >= previous, "percent must not regress");
            previous = update.mastery_percent;
            if update.newly_mastered {
                mastered_at_round = Some(round);
            }
        }

        let mastered_round = mastered_at_round.expect("threshold never crossed");
        assert!(mastered_round > 0, "mastery should take more than one answer");
        assert!(masteries["c1"].mastered);
        assert!(masteries["c1"].mastery_percent >= params.threshold);
    }

    #[test]
    fn mastery_is_never_revoked() {
        let questions = pool(&[("q1", "c1")]);
        let params = MasteryParams::default();
        let mut masteries = BTreeMap::new();

        for _ in 0..20 {
            apply_attempt(
                &mut masteries,
                "s1",
                &questions,
                &[answer("q1", true, 100.0)],
                &params,
                Utc::now(),
            )
            .unwrap();
        }
        assert!(masteries["c1"].mastered);
        let mastered_at = masteries["c1"].mastered_at;

        for _ in 0..10 {
            apply_attempt(
                &mut masteries,
                "s1",
                &questions,
                &[answer("q1", false, 0.0)],
                &params,
                Utc::now(),
            )
            .unwrap();
        }

        assert!(masteries["c1"].mastered);
        assert_eq!(masteries["c1"].mastered_at, mastered_at);
        assert!(masteries["c1"].mastery_percent >= params.threshold);
    }

    #[test]
    fn newly_mastered_reported_exactly_once() {
        let questions = pool(&[("q1", "c1")]);
        let params = MasteryParams::default();
        let mut masteries = BTreeMap::new();

        let mut transitions = 0;
        for _ in 0..30 {
            let outcome = apply_attempt(
                &mut masteries,
                "s1",
                &questions,
                &[answer("q1", true, 100.0)],
                &params,
                Utc::now(),
            )
            .unwrap();
            transitions += outcome.newly_mastered().len();
        }
        assert_eq!(transitions, 1);
    }

    #[test]
    fn unknown_question_is_a_contract_violation() {
        let questions = pool(&[("q1", "c1")]);
        let mut masteries = BTreeMap::new();
        let err = apply_attempt(
            &mut masteries,
            "s1",
            &questions,
            &[answer("ghost", true, 100.0)],
            &MasteryParams::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::UnknownQuestion(id) if id == "ghost"));
    }

    #[test]
    fn percentages_stay_in_range() {
        let questions = pool(&[("q1", "c1")]);
        let params = MasteryParams::default();
        let mut masteries = BTreeMap::new();

        for i in 0..50 {
            let correct = i % 3 != 0;
            let outcome = apply_attempt(
                &mut masteries,
                "s1",
                &questions,
                &[answer("q1", correct, if correct { 80.0 } else { 20.0 })],
                &params,
                Utc::now(),
            )
            .unwrap();
            let percent = outcome.updates[0].mastery_percent;
            assert!((0.0..=100.0).contains(&percent));
        }
    }
}
