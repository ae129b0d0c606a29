use tracing::debug;

use crate::types::{AnswerLog, Question, TestAttempt};

pub const MIN_DIFFICULTY: i32 = 1;
pub const MAX_DIFFICULTY: i32 = 10;

/// One rung up on a correct answer, one down on an incorrect one,
/// clamped to the difficulty band.
fn ladder_target(current: i32, last_correct: bool) -> i32 {
    if last_correct {
        (current + 1).min(MAX_DIFFICULTY)
    } else {
        (current - 1).max(MIN_DIFFICULTY)
    }
}

/// Closest-difficulty active question not yet asked. Exact match wins;
/// otherwise nearest, ties broken toward the lower difficulty, then pool
/// order. Deterministic for a fixed pool.
fn closest_match<'a>(pool: &'a [Question], target: i32, asked: &[String]) -> Option<&'a Question> {
    pool.iter()
        .filter(|q| q.active && !asked.iter().any(|id| id == &q.id))
        .min_by_key(|q| ((q.difficulty - target).abs(), q.difficulty))
}

/// Picks the opening question of an adaptive attempt from the readiness
/// tier. Anchors `current_difficulty` to the question actually asked.
pub fn select_first_question<'a>(
    attempt: &mut TestAttempt,
    pool: &'a [Question],
    start_difficulty: i32,
) -> Option<&'a Question> {
    if !attempt.adaptive || attempt.has_reached_target() {
        return None;
    }

    let picked = closest_match(pool, start_difficulty, &attempt.asked_question_ids)?;
    attempt.current_difficulty = picked.difficulty;
    attempt.asked_question_ids.push(picked.id.clone());
    debug!(
        attempt_id = %attempt.id,
        question_id = %picked.id,
        difficulty = picked.difficulty,
        "selected first question"
    );
    Some(picked)
}

/// Walks the difficulty ladder from the most recent answer and selects
/// the closest unasked question, updating `current_difficulty` as a side
/// effect. `None` once the target count is reached or the pool is
/// exhausted — the normal completion signal, not an error.
pub fn select_next_question<'a>(
    attempt: &mut TestAttempt,
    pool: &'a [Question],
    last_answer: &AnswerLog,
) -> Option<&'a Question> {
    if !attempt.adaptive || attempt.has_reached_target() {
        return None;
    }

    let target = ladder_target(attempt.current_difficulty, last_answer.is_correct);
    let picked = closest_match(pool, target, &attempt.asked_question_ids)?;
    attempt.current_difficulty = picked.difficulty;
    attempt.asked_question_ids.push(picked.id.clone());
    debug!(
        attempt_id = %attempt.id,
        question_id = %picked.id,
        target,
        difficulty = picked.difficulty,
        "selected next question"
    );
    Some(picked)
}

/// Ladder computation without selecting a question or touching the
/// attempt. `None` for non-adaptive attempts or attempts that already hit
/// their target count.
pub fn peek_next_difficulty(attempt: &TestAttempt, last_answer: &AnswerLog) -> Option<i32> {
    if !attempt.adaptive || attempt.has_reached_target() {
        return None;
    }
    Some(ladder_target(attempt.current_difficulty, last_answer.is_correct))
}
