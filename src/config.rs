use serde::{Deserialize, Serialize};

/// Mastery-percentage blend. The exact weighting is a tunable business
/// rule; the defaults require sustained accurate, high-scoring work before
/// the threshold is reachable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryParams {
    /// Crossing this percentage marks the concept mastered (one-time).
    pub threshold: f64,
    pub accuracy_weight: f64,
    pub score_weight: f64,
    /// Smoothing factor folding each answer score into the rolling average.
    pub score_smoothing: f64,
}

impl Default for MasteryParams {
    fn default() -> Self {
        Self {
            threshold: 90.0,
            accuracy_weight: 0.6,
            score_weight: 0.4,
            score_smoothing: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumParams {
    /// Final-test score at or above which the chapter auto-completes.
    pub auto_pass_score: f64,
    /// Minimum final-test score that teacher approval can rescue.
    pub approval_floor: f64,
}

impl Default for CurriculumParams {
    fn default() -> Self {
        Self {
            auto_pass_score: 90.0,
            approval_floor: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenseParams {
    pub max_defense: i32,
    /// Accuracy at or above which one defense point is restored.
    pub restore_accuracy: f64,
    /// Accuracy at or above which nothing happens (safe zone).
    pub safe_accuracy: f64,
    /// Minimum (level - final difficulty) gap before defense applies.
    pub min_level_gap: i32,
}

impl Default for DefenseParams {
    fn default() -> Self {
        Self {
            max_defense: 2,
            restore_accuracy: 0.6,
            safe_accuracy: 0.3,
            min_level_gap: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    pub mastery: MasteryParams,
    pub curriculum: CurriculumParams,
    pub defense: DefenseParams,
}

impl CoreConfig {
    /// Environment overrides for deployments that tune the business rules
    /// without a redeploy. Unset or unparsable values keep the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PRAXIS_MASTERY_THRESHOLD") {
            if let Ok(parsed) = val.parse::<f64>() {
                config.mastery.threshold = parsed.clamp(0.0, 100.0);
            }
        }
        if let Ok(val) = std::env::var("PRAXIS_MASTERY_SCORE_SMOOTHING") {
            if let Ok(parsed) = val.parse::<f64>() {
                config.mastery.score_smoothing = parsed.clamp(0.0, 1.0);
            }
        }
        if let Ok(val) = std::env::var("PRAXIS_AUTO_PASS_SCORE") {
            if let Ok(parsed) = val.parse::<f64>() {
                config.curriculum.auto_pass_score = parsed.clamp(0.0, 100.0);
            }
        }
        if let Ok(val) = std::env::var("PRAXIS_APPROVAL_FLOOR") {
            if let Ok(parsed) = val.parse::<f64>() {
                config.curriculum.approval_floor = parsed.clamp(0.0, 100.0);
            }
        }
        if let Ok(val) = std::env::var("PRAXIS_MAX_DEFENSE") {
            if let Ok(parsed) = val.parse::<i32>() {
                config.defense.max_defense = parsed.max(0);
            }
        }

        config
    }
}
