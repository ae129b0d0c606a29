//! Deterministic fill-in-the-blank rendering for spaced-repetition
//! practice.
//!
//! The same (student, question, attempt) triple always reproduces the
//! same blanks: selection runs on a ChaCha stream seeded from a digest of
//! the triple, never on ambient process randomness.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const BLANK_MARKER: &str = "____";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlankCandidate {
    /// Index into the question's whitespace-split word sequence.
    pub word_index: usize,
    pub importance: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlankCount {
    Fixed(usize),
    Range { min: usize, max: usize },
}

/// Blanking configuration keyed by repetition count: the rule with the
/// largest round number at or below the current attempt count wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRule {
    pub round: u32,
    pub count: BlankCount,
    pub min_importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlankAnswer {
    pub word_index: usize,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlankRendering {
    pub display_content: String,
    pub blank_answers: BTreeMap<String, BlankAnswer>,
    pub original_content: String,
}

impl BlankRendering {
    fn identity(content: &str) -> Self {
        Self {
            display_content: content.to_string(),
            blank_answers: BTreeMap::new(),
            original_content: content.to_string(),
        }
    }

    pub fn is_blanked(&self) -> bool {
        !self.blank_answers.is_empty()
    }
}

/// Stable 64-bit seed from the (student, question, attempt) triple. A
/// digest keeps the seed independent of platform hasher behavior; the
/// separator keeps ("ab","c") and ("a","bc") apart.
pub fn derive_seed(student_id: &str, question_id: &str, attempt_id: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(student_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(question_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(attempt_id.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Rule whose round is the largest value at or below the attempt count;
/// `None` means identity output.
pub fn select_rule(rules: &[RoundRule], attempt_count: u32) -> Option<&RoundRule> {
    rules
        .iter()
        .filter(|r| r.round <= attempt_count)
        .max_by_key(|r| r.round)
}

/// Produces the stable partially-blanked rendering for one attempt.
///
/// Candidates below the rule's importance floor are filtered out, falling
/// back to the full candidate set if the filter empties it; requested
/// counts are capped at the number of usable positions; a zero count (or
/// no applicable rule) returns the content unmodified with an empty
/// answer key.
pub fn generate(
    content: &str,
    candidates: &[BlankCandidate],
    rules: &[RoundRule],
    attempt_count: u32,
    student_id: &str,
    question_id: &str,
    attempt_id: &str,
) -> BlankRendering {
    let words: Vec<&str> = content.split_whitespace().collect();
    let Some(rule) = select_rule(rules, attempt_count) else {
        return BlankRendering::identity(content);
    };

    let valid: Vec<BlankCandidate> = candidates
        .iter()
        .filter(|c| c.word_index < words.len())
        .copied()
        .collect();
    let mut eligible: Vec<BlankCandidate> = valid
        .iter()
        .filter(|c| c.importance >= rule.min_importance)
        .copied()
        .collect();
    if eligible.is_empty() {
        eligible = valid;
    }
    if eligible.is_empty() {
        return BlankRendering::identity(content);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(student_id, question_id, attempt_id));
    let requested = match rule.count {
        BlankCount::Fixed(n) => n,
        BlankCount::Range { min, max } => {
            let lo = min.min(max);
            let hi = min.max(max);
            rng.gen_range(lo..=hi)
        }
    };
    let count = requested.min(eligible.len());
    if count == 0 {
        return BlankRendering::identity(content);
    }

    let picks = rand::seq::index::sample(&mut rng, eligible.len(), count);
    let mut selected: Vec<usize> = picks.iter().map(|i| eligible[i].word_index).collect();
    selected.sort_unstable();
    selected.dedup();

    let display_content = words
        .iter()
        .enumerate()
        .map(|(index, &word)| {
            if selected.binary_search(&index).is_ok() {
                BLANK_MARKER
            } else {
                word
            }
        })
        .collect::<Vec<&str>>()
        .join(" ");

    let blank_answers = selected
        .iter()
        .enumerate()
        .map(|(position, word_index)| {
            (
                format!("blank_{}", position + 1),
                BlankAnswer {
                    word_index: *word_index,
                    answer: words[*word_index].to_string(),
                },
            )
        })
        .collect();

    BlankRendering {
        display_content,
        blank_answers,
        original_content: content.to_string(),
    }
}
