use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Student aggregate mutated only by the gamification engine.
///
/// Counters are carried explicitly through scoring functions and handed
/// back to the persistence layer; nothing in this crate keeps hidden state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    /// Current level, 1..=MAX_LEVEL. Monotonic except the explicit
    /// level-down path in the gamification engine.
    pub level: i32,
    pub total_xp: i64,
    pub current_streak: i32,
    pub max_streak: i32,
    /// Consumable buffer shielding the student from an immediate
    /// level decrease, 0..=max.
    pub level_down_defense: i32,
    pub last_activity_date: Option<NaiveDate>,
}

impl Student {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            level: 1,
            total_xp: 0,
            current_streak: 0,
            max_streak: 0,
            level_down_defense: 0,
            last_activity_date: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub id: String,
    pub grade: i32,
    #[serde(default)]
    pub prerequisite_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub grade: i32,
    /// Position within the grade; drives the bootstrap rule and the
    /// "next chapter" recommendation.
    pub sequence: i32,
    /// Concept order defines the unlock sequence within the chapter.
    pub concept_ids: Vec<String>,
    pub final_test_id: Option<String>,
    #[serde(default)]
    pub require_teacher_approval: bool,
    /// Chapters that must be completed before this one unlocks.
    #[serde(default)]
    pub prerequisite_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub concept_id: String,
    /// 1..=10.
    pub difficulty: i32,
    pub active: bool,
}

/// Per-(student, concept) mastery state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMastery {
    pub student_id: String,
    pub concept_id: String,
    /// Monotonic: a concept is never re-locked.
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
    /// Monotonic: mastery, once achieved, is never revoked here.
    pub mastered: bool,
    pub mastered_at: Option<DateTime<Utc>>,
    /// 0..=100.
    pub mastery_percent: f64,
    pub attempt_count: i64,
    pub correct_count: i64,
    /// Smoothed per-answer score, 0..=100.
    pub average_score: f64,
}

impl ConceptMastery {
    pub fn new(student_id: impl Into<String>, concept_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            concept_id: concept_id.into(),
            unlocked: false,
            unlocked_at: None,
            mastered: false,
            mastered_at: None,
            mastery_percent: 0.0,
            attempt_count: 0,
            correct_count: 0,
            average_score: 0.0,
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.attempt_count == 0 {
            return 0.0;
        }
        self.correct_count as f64 / self.attempt_count as f64
    }
}

/// Per-(student, chapter) progress row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgress {
    pub student_id: String,
    pub chapter_id: String,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub final_test_attempted: bool,
    pub final_test_score: Option<f64>,
    pub final_test_passed: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approval_feedback: Option<String>,
}

impl ChapterProgress {
    pub fn new(student_id: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            chapter_id: chapter_id.into(),
            unlocked: false,
            unlocked_at: None,
            completed: false,
            completed_at: None,
            final_test_attempted: false,
            final_test_score: None,
            final_test_passed: false,
            approved_by: None,
            approved_at: None,
            approval_feedback: None,
        }
    }
}

/// One adaptive test attempt. Advanced one answer at a time by the
/// selector; the caller serializes concurrent submissions per attempt id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAttempt {
    pub id: String,
    pub student_id: String,
    /// 1..=10; anchored to the difficulty of the question actually asked.
    pub current_difficulty: i32,
    /// No duplicates; append-only.
    pub asked_question_ids: Vec<String>,
    pub score: f64,
    pub target_question_count: usize,
    pub adaptive: bool,
}

impl TestAttempt {
    pub fn new(student_id: impl Into<String>, target_question_count: usize, adaptive: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            student_id: student_id.into(),
            current_difficulty: 1,
            asked_question_ids: Vec::new(),
            score: 0.0,
            target_question_count,
            adaptive,
        }
    }

    pub fn questions_asked(&self) -> usize {
        self.asked_question_ids.len()
    }

    pub fn has_reached_target(&self) -> bool {
        self.questions_asked() >= self.target_question_count
    }

    /// Folds one submitted answer into the running score.
    pub fn record_answer(&mut self, answer: &AnswerLog) {
        self.score += answer.score;
    }
}

/// Immutable record of one submitted answer. The only sanctioned mutation
/// is the explicit override-to-correct correction path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerLog {
    pub question_id: String,
    pub selected_answer: String,
    pub is_correct: bool,
    /// Question difficulty at the time of answering.
    pub difficulty: i32,
    pub combo_count: i32,
    /// 0..=100.
    pub score: f64,
    pub answered_at: DateTime<Utc>,
}

impl AnswerLog {
    /// Correction path for disputed answers: flips the record to correct
    /// and restores full score. Intentionally the only mutator.
    pub fn override_to_correct(&mut self) {
        self.is_correct = true;
        self.score = 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_target_tracking() {
        let mut attempt = TestAttempt::new("s1", 2, true);
        assert!(!attempt.has_reached_target());
        attempt.asked_question_ids.push("q1".to_string());
        attempt.asked_question_ids.push("q2".to_string());
        assert!(attempt.has_reached_target());
    }

    #[test]
    fn override_restores_full_score() {
        let mut log = AnswerLog {
            question_id: "q1".to_string(),
            selected_answer: "b".to_string(),
            is_correct: false,
            difficulty: 4,
            combo_count: 0,
            score: 0.0,
            answered_at: Utc::now(),
        };
        log.override_to_correct();
        assert!(log.is_correct);
        assert_eq!(log.score, 100.0);
    }

    #[test]
    fn mastery_accuracy_handles_empty() {
        let mastery = ConceptMastery::new("s1", "c1");
        assert_eq!(mastery.accuracy(), 0.0);
    }

    #[test]
    fn student_serializes_camel_case() {
        let student = Student::new("s1");
        let json = serde_json::to_value(&student).unwrap();
        assert!(json.get("totalXp").is_some());
        assert!(json.get("levelDownDefense").is_some());

        let back: Student = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, "s1");
        assert_eq!(back.level, 1);
    }

    #[test]
    fn chapter_optional_fields_default_on_deserialize() {
        let chapter: Chapter = serde_json::from_str(
            r#"{"id":"ch1","grade":1,"sequence":1,"conceptIds":["c1"],"finalTestId":null}"#,
        )
        .unwrap();
        assert!(chapter.prerequisite_ids.is_empty());
        assert!(!chapter.require_teacher_approval);
    }
}
