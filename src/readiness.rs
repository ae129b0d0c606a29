use serde::{Deserialize, Serialize};

use crate::types::AnswerLog;

const LEVEL_WEIGHT: f64 = 0.4;
const ACCURACY_WEIGHT: f64 = 0.6;
const NEUTRAL_ACCURACY: f64 = 0.5;
const LEVEL_NORMALIZER: f64 = 10.0;
const NOVICE_CUTOFF: f64 = 0.35;
const ADVANCED_CUTOFF: f64 = 0.65;
const NOVICE_START: i32 = 3;
const INTERMEDIATE_START: i32 = 6;
const ADVANCED_START: i32 = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessEstimate {
    pub score: f64,
    pub start_difficulty: i32,
}

/// Historical accuracy on the target concept set; neutral when the
/// student has no history there.
pub fn concept_accuracy(history: &[AnswerLog]) -> f64 {
    if history.is_empty() {
        return NEUTRAL_ACCURACY;
    }
    let correct = history.iter().filter(|a| a.is_correct).count();
    correct as f64 / history.len() as f64
}

pub fn normalized_level(level: i32) -> f64 {
    (level as f64 / LEVEL_NORMALIZER).clamp(0.0, 1.0)
}

pub fn readiness_score(level: i32, accuracy: f64) -> f64 {
    LEVEL_WEIGHT * normalized_level(level) + ACCURACY_WEIGHT * accuracy.clamp(0.0, 1.0)
}

pub fn starting_difficulty(readiness: f64) -> i32 {
    if readiness < NOVICE_CUTOFF {
        NOVICE_START
    } else if readiness < ADVANCED_CUTOFF {
        INTERMEDIATE_START
    } else {
        ADVANCED_START
    }
}

/// Pure function of the student's level and prior answers on the target
/// concepts; no side effects.
pub fn estimate(level: i32, history: &[AnswerLog]) -> ReadinessEstimate {
    let score = readiness_score(level, concept_accuracy(history));
    ReadinessEstimate {
        score,
        start_difficulty: starting_difficulty(score),
    }
}
