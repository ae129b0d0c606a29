use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DefenseParams;
use crate::types::Student;

pub const MAX_LEVEL: i32 = 15;

/// Cumulative XP required to hold each level; index = level - 1.
/// Monotonically increasing; level is capped at MAX_LEVEL regardless of XP.
const XP_THRESHOLDS: [i64; MAX_LEVEL as usize] = [
    0, 100, 250, 450, 700, 1000, 1400, 1900, 2500, 3200, 4000, 5000, 6200, 7600, 9200,
];

const FULL_DEMONSTRATION_ACCURACY: f64 = 0.7;
const PARTIAL_DEMONSTRATION_ACCURACY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamificationAction {
    None,
    DefenseRestored,
    DefenseConsumed,
    LevelDown,
    LevelUp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakUpdate {
    pub streak: i32,
    pub broken: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelUpResult {
    pub leveled_up: bool,
    pub level: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenseOutcome {
    pub action: GamificationAction,
    pub level: i32,
    pub defense: i32,
}

/// Settlement for one completed adaptive attempt: the reported action tag
/// plus the resulting numeric state on the student aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSettlement {
    pub action: GamificationAction,
    pub xp_awarded: i64,
    pub total_xp: i64,
    pub level: i32,
    pub defense: i32,
    pub streak: i32,
    pub streak_broken: bool,
}

pub fn streak_bonus_rate(streak_days: i32) -> f64 {
    match streak_days {
        d if d >= 30 => 0.50,
        14..=29 => 0.35,
        7..=13 => 0.20,
        3..=6 => 0.10,
        _ => 0.0,
    }
}

/// Applied XP = base + floor(base * rate).
pub fn apply_streak_bonus(base_xp: i64, streak_days: i32) -> i64 {
    let bonus = (base_xp as f64 * streak_bonus_rate(streak_days)).floor() as i64;
    base_xp + bonus
}

/// Level implied by a total-XP amount, capped at MAX_LEVEL.
pub fn level_for_xp(total_xp: i64) -> i32 {
    let mut level = 1;
    for (index, threshold) in XP_THRESHOLDS.iter().enumerate() {
        if total_xp >= *threshold {
            level = index as i32 + 1;
        }
    }
    level
}

/// Compares the level implied by (xp + earned) with the current level.
/// No-op at the cap; a single award may skip several levels.
pub fn check_level_up(level: i32, total_xp: i64, earned_xp: i64) -> LevelUpResult {
    if level >= MAX_LEVEL {
        return LevelUpResult {
            leveled_up: false,
            level,
        };
    }
    let implied = level_for_xp(total_xp + earned_xp);
    if implied > level {
        LevelUpResult {
            leveled_up: true,
            level: implied.min(MAX_LEVEL),
        }
    } else {
        LevelUpResult {
            leveled_up: false,
            level,
        }
    }
}

/// Pure function of (streak, last activity date, today).
///
/// Same calendar day leaves the streak untouched; exactly one day since
/// the last activity extends it; no prior activity starts a fresh streak
/// without flagging a break; a gap of two or more days resets to 1 and
/// flags the break.
pub fn update_streak(streak: i32, last_activity: Option<NaiveDate>, today: NaiveDate) -> StreakUpdate {
    let Some(last) = last_activity else {
        return StreakUpdate {
            streak: 1,
            broken: false,
        };
    };

    let gap_days = (today - last).num_days();
    if gap_days <= 0 {
        StreakUpdate {
            streak,
            broken: false,
        }
    } else if gap_days == 1 {
        StreakUpdate {
            streak: streak + 1,
            broken: false,
        }
    } else {
        StreakUpdate {
            streak: 1,
            broken: true,
        }
    }
}

/// Difficulty tier a finished adaptive attempt proves the student can
/// handle. `None` when nothing was answered, accuracy fell below the
/// partial band, or the tier does not exceed the current level.
pub fn demonstrated_level(
    final_difficulty: i32,
    correct: usize,
    total: usize,
    current_level: i32,
) -> Option<i32> {
    if total == 0 {
        return None;
    }
    let accuracy = correct as f64 / total as f64;
    if accuracy < PARTIAL_DEMONSTRATION_ACCURACY {
        return None;
    }
    let tier = if accuracy >= FULL_DEMONSTRATION_ACCURACY {
        final_difficulty
    } else {
        (final_difficulty - 1).max(1)
    };
    let tier = tier.clamp(1, MAX_LEVEL);
    if tier > current_level {
        Some(tier)
    } else {
        None
    }
}

/// Level-down defense. Applies only above level 1 and when the attempt's
/// final difficulty sits at least `min_level_gap` below the student's
/// level. Good accuracy restores a point, the safe band does nothing,
/// and a collapse consumes a point — or drops the level and refills the
/// buffer once the points are gone.
pub fn apply_defense(
    level: i32,
    defense: i32,
    final_difficulty: i32,
    correct: usize,
    total: usize,
    params: &DefenseParams,
) -> DefenseOutcome {
    let unchanged = DefenseOutcome {
        action: GamificationAction::None,
        level,
        defense,
    };

    if level <= 1 || level - final_difficulty < params.min_level_gap || total == 0 {
        return unchanged;
    }

    let accuracy = correct as f64 / total as f64;
    if accuracy >= params.restore_accuracy {
        if defense < params.max_defense {
            return DefenseOutcome {
                action: GamificationAction::DefenseRestored,
                level,
                defense: defense + 1,
            };
        }
        return unchanged;
    }
    if accuracy >= params.safe_accuracy {
        return unchanged;
    }
    if defense > 0 {
        return DefenseOutcome {
            action: GamificationAction::DefenseConsumed,
            level,
            defense: defense - 1,
        };
    }
    DefenseOutcome {
        action: GamificationAction::LevelDown,
        level: (level - 1).max(1),
        defense: params.max_defense,
    }
}

/// Settles one completed adaptive attempt against the student aggregate:
/// streak, XP with streak bonus, XP level-ups, demonstrated-level
/// promotion, and the level-down defense, in that order. The mutated
/// aggregate is the caller's to persist.
pub fn settle_attempt(
    student: &mut Student,
    final_difficulty: i32,
    correct: usize,
    total: usize,
    base_xp: i64,
    today: NaiveDate,
    params: &DefenseParams,
) -> AttemptSettlement {
    let streak_update = update_streak(student.current_streak, student.last_activity_date, today);
    student.current_streak = streak_update.streak;
    student.max_streak = student.max_streak.max(streak_update.streak);
    student.last_activity_date = Some(today);

    let xp_awarded = apply_streak_bonus(base_xp, student.current_streak);
    let level_check = check_level_up(student.level, student.total_xp, xp_awarded);
    student.total_xp += xp_awarded;

    let mut leveled_up = false;
    if level_check.leveled_up {
        student.level = level_check.level;
        leveled_up = true;
    }
    if let Some(tier) = demonstrated_level(final_difficulty, correct, total, student.level) {
        student.level = tier;
        leveled_up = true;
    }

    let defense_outcome = apply_defense(
        student.level,
        student.level_down_defense,
        final_difficulty,
        correct,
        total,
        params,
    );
    student.level = defense_outcome.level;
    student.level_down_defense = defense_outcome.defense;

    let action = match defense_outcome.action {
        GamificationAction::LevelDown => GamificationAction::LevelDown,
        _ if leveled_up => GamificationAction::LevelUp,
        other => other,
    };

    if !matches!(action, GamificationAction::None) {
        info!(
            student_id = %student.id,
            ?action,
            level = student.level,
            defense = student.level_down_defense,
            "attempt settled"
        );
    }

    AttemptSettlement {
        action,
        xp_awarded,
        total_xp: student.total_xp,
        level: student.level,
        defense: student.level_down_defense,
        streak: student.current_streak,
        streak_broken: streak_update.broken,
    }
}
