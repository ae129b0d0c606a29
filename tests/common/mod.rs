#![allow(dead_code)]

use chrono::{TimeZone, Utc};

use praxis_core::types::{AnswerLog, Chapter, Question};

pub const FIXED_TIMESTAMP: i64 = 1_770_000_000_000;

pub fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(FIXED_TIMESTAMP).unwrap()
}

pub fn question(id: &str, concept_id: &str, difficulty: i32) -> Question {
    Question {
        id: id.to_string(),
        concept_id: concept_id.to_string(),
        difficulty,
        active: true,
    }
}

/// One question per difficulty rung, all on the same concept.
pub fn ladder_pool(concept_id: &str) -> Vec<Question> {
    (1..=10)
        .map(|d| question(&format!("{concept_id}-q{d}"), concept_id, d))
        .collect()
}

pub fn answer(question_id: &str, is_correct: bool, difficulty: i32) -> AnswerLog {
    AnswerLog {
        question_id: question_id.to_string(),
        selected_answer: "a".to_string(),
        is_correct,
        difficulty,
        combo_count: 0,
        score: if is_correct { 100.0 } else { 0.0 },
        answered_at: fixed_now(),
    }
}

pub fn chapter(id: &str, sequence: i32, concepts: &[&str], prereqs: &[&str]) -> Chapter {
    Chapter {
        id: id.to_string(),
        grade: 1,
        sequence,
        concept_ids: concepts.iter().map(|c| c.to_string()).collect(),
        final_test_id: None,
        require_teacher_approval: false,
        prerequisite_ids: prereqs.iter().map(|p| p.to_string()).collect(),
    }
}
