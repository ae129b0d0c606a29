//! Chapter state machine (locked → unlocked → completed) and the
//! prerequisite-graph unlock cascade.
//!
//! Operates on one student's progress rows, supplied as already-loaded
//! maps; the caller persists the mutated rows as one transaction.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CurriculumParams;
use crate::error::CoreError;
use crate::types::{Chapter, ChapterProgress, ConceptMastery};

/// Chapter definitions plus the reverse-dependency adjacency used by the
/// unlock cascade.
#[derive(Debug, Clone)]
pub struct CurriculumGraph {
    chapters: BTreeMap<String, Chapter>,
    dependents: HashMap<String, Vec<String>>,
    concept_owner: HashMap<String, String>,
}

impl CurriculumGraph {
    pub fn new(chapters: impl IntoIterator<Item = Chapter>) -> Self {
        let chapters: BTreeMap<String, Chapter> =
            chapters.into_iter().map(|c| (c.id.clone(), c)).collect();

        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut concept_owner = HashMap::new();
        for chapter in chapters.values() {
            for prerequisite in &chapter.prerequisite_ids {
                dependents
                    .entry(prerequisite.clone())
                    .or_default()
                    .push(chapter.id.clone());
            }
            for concept_id in &chapter.concept_ids {
                concept_owner.insert(concept_id.clone(), chapter.id.clone());
            }
        }
        // deterministic cascade order
        for list in dependents.values_mut() {
            list.sort();
        }

        Self {
            chapters,
            dependents,
            concept_owner,
        }
    }

    pub fn chapter(&self, id: &str) -> Result<&Chapter, CoreError> {
        self.chapters
            .get(id)
            .ok_or_else(|| CoreError::UnknownChapter(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&Chapter> {
        self.chapters.get(id)
    }

    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn chapter_of_concept(&self, concept_id: &str) -> Option<&Chapter> {
        self.concept_owner
            .get(concept_id)
            .and_then(|id| self.chapters.get(id))
    }

    pub fn chapters_for_grade(&self, grade: i32) -> Vec<&Chapter> {
        let mut chapters: Vec<&Chapter> =
            self.chapters.values().filter(|c| c.grade == grade).collect();
        chapters.sort_by_key(|c| (c.sequence, c.id.clone()));
        chapters
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub completed: bool,
    /// Chapters that transitioned to completed in this pass.
    pub newly_completed: Vec<String>,
    /// Chapters unlocked by the cascade.
    pub newly_unlocked: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    /// False when the approval was rejected (score below the floor or no
    /// recorded final test). A rejection is an outcome, not an error.
    pub approved: bool,
    pub completion: Option<CompletionOutcome>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockReport {
    pub unlocked_concepts: Vec<String>,
    pub unlocked_chapters: Vec<String>,
    pub completed_chapters: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Continue,
    Next,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub chapter_id: String,
    pub kind: RecommendationKind,
    pub progress_percent: f64,
}

/// Idempotent unlock. Bootstraps the student into the chapter by also
/// unlocking its first concept. Returns whether anything changed.
pub fn unlock_chapter(
    graph: &CurriculumGraph,
    progress: &mut BTreeMap<String, ChapterProgress>,
    masteries: &mut BTreeMap<String, ConceptMastery>,
    student_id: &str,
    chapter_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, CoreError> {
    unlock_row(graph, progress, masteries, student_id, chapter_id, now)
}

fn unlock_row(
    graph: &CurriculumGraph,
    progress: &mut BTreeMap<String, ChapterProgress>,
    masteries: &mut BTreeMap<String, ConceptMastery>,
    student_id: &str,
    chapter_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, CoreError> {
    let chapter = graph.chapter(chapter_id)?;
    let row = progress
        .entry(chapter_id.to_string())
        .or_insert_with(|| ChapterProgress::new(student_id, chapter_id));
    if row.unlocked {
        return Ok(false);
    }
    row.unlocked = true;
    row.unlocked_at = Some(now);
    if let Some(first_concept) = chapter.concept_ids.first() {
        unlock_concept(masteries, student_id, first_concept, now);
    }
    info!(student_id, chapter_id, "chapter unlocked");
    Ok(true)
}

/// Unlocked is monotonic on concepts; returns whether this call flipped it.
fn unlock_concept(
    masteries: &mut BTreeMap<String, ConceptMastery>,
    student_id: &str,
    concept_id: &str,
    now: DateTime<Utc>,
) -> bool {
    let entry = masteries
        .entry(concept_id.to_string())
        .or_insert_with(|| ConceptMastery::new(student_id, concept_id));
    if entry.unlocked {
        return false;
    }
    entry.unlocked = true;
    entry.unlocked_at = Some(now);
    true
}

fn completion_satisfied(
    chapter: &Chapter,
    row: Option<&ChapterProgress>,
    masteries: &BTreeMap<String, ConceptMastery>,
    params: &CurriculumParams,
) -> bool {
    let all_mastered = chapter
        .concept_ids
        .iter()
        .all(|c| masteries.get(c).map(|m| m.mastered).unwrap_or(false));
    if !all_mastered {
        return false;
    }
    if chapter.final_test_id.is_none() {
        return true;
    }
    let Some(row) = row else { return false };
    let Some(score) = row.final_test_score else {
        return false;
    };
    if score >= params.auto_pass_score {
        return true;
    }
    if score < params.approval_floor {
        return false;
    }
    // mid-band score: the teacher-approval requirement must be satisfied
    !chapter.require_teacher_approval || row.approved_by.is_some()
}

fn mark_completed(
    progress: &mut BTreeMap<String, ChapterProgress>,
    student_id: &str,
    chapter_id: &str,
    now: DateTime<Utc>,
) {
    let row = progress
        .entry(chapter_id.to_string())
        .or_insert_with(|| ChapterProgress::new(student_id, chapter_id));
    row.completed = true;
    row.completed_at = Some(now);
    if row.final_test_attempted {
        row.final_test_passed = true;
    }
    info!(student_id, chapter_id, "chapter completed");
}

/// Re-evaluates completion for one chapter and, on a transition, runs the
/// breadth-first unlock cascade over the prerequisite graph to a fixed
/// point. The visited guard keeps malformed (cyclic) prerequisite data
/// from looping. Calling this twice without new data changes nothing.
pub fn evaluate_completion(
    graph: &CurriculumGraph,
    progress: &mut BTreeMap<String, ChapterProgress>,
    masteries: &mut BTreeMap<String, ConceptMastery>,
    student_id: &str,
    chapter_id: &str,
    params: &CurriculumParams,
    now: DateTime<Utc>,
) -> Result<CompletionOutcome, CoreError> {
    let chapter = graph.chapter(chapter_id)?;
    let mut outcome = CompletionOutcome::default();

    if progress.get(chapter_id).map(|r| r.completed).unwrap_or(false) {
        outcome.completed = true;
        return Ok(outcome);
    }

    if !completion_satisfied(chapter, progress.get(chapter_id), masteries, params) {
        return Ok(outcome);
    }

    mark_completed(progress, student_id, chapter_id, now);
    outcome.completed = true;
    outcome.newly_completed.push(chapter_id.to_string());

    let mut queue: VecDeque<String> = VecDeque::from([chapter_id.to_string()]);
    let mut visited: HashSet<String> = HashSet::new();
    while let Some(done_id) = queue.pop_front() {
        if !visited.insert(done_id.clone()) {
            continue;
        }
        for dependent_id in graph.dependents_of(&done_id) {
            let dependent = graph.chapter(dependent_id)?;
            let prerequisites_met = dependent
                .prerequisite_ids
                .iter()
                .all(|p| progress.get(p).map(|r| r.completed).unwrap_or(false));
            if !prerequisites_met {
                continue;
            }
            if unlock_row(graph, progress, masteries, student_id, dependent_id, now)? {
                outcome.newly_unlocked.push(dependent_id.clone());
            }
            let already_complete = progress
                .get(dependent_id)
                .map(|r| r.completed)
                .unwrap_or(false);
            if !already_complete
                && completion_satisfied(dependent, progress.get(dependent_id), masteries, params)
            {
                // vacuously satisfiable chapters keep the cascade moving
                mark_completed(progress, student_id, dependent_id, now);
                outcome.newly_completed.push(dependent_id.clone());
                queue.push_back(dependent_id.clone());
            }
        }
    }

    Ok(outcome)
}

/// Stores a final-test submission and re-runs the completion check.
pub fn record_final_test(
    graph: &CurriculumGraph,
    progress: &mut BTreeMap<String, ChapterProgress>,
    masteries: &mut BTreeMap<String, ConceptMastery>,
    student_id: &str,
    chapter_id: &str,
    score: f64,
    params: &CurriculumParams,
    now: DateTime<Utc>,
) -> Result<CompletionOutcome, CoreError> {
    graph.chapter(chapter_id)?;
    let row = progress
        .entry(chapter_id.to_string())
        .or_insert_with(|| ChapterProgress::new(student_id, chapter_id));
    row.final_test_attempted = true;
    row.final_test_score = Some(score);
    row.final_test_passed = score >= params.auto_pass_score;

    evaluate_completion(graph, progress, masteries, student_id, chapter_id, params, now)
}

/// Records a teacher approval. Rejected (not an error) when the final
/// test is missing or scored below the approval floor.
pub fn approve_chapter(
    graph: &CurriculumGraph,
    progress: &mut BTreeMap<String, ChapterProgress>,
    masteries: &mut BTreeMap<String, ConceptMastery>,
    student_id: &str,
    chapter_id: &str,
    teacher_id: &str,
    feedback: Option<String>,
    params: &CurriculumParams,
    now: DateTime<Utc>,
) -> Result<ApprovalOutcome, CoreError> {
    graph.chapter(chapter_id)?;

    let eligible = progress
        .get(chapter_id)
        .filter(|row| row.final_test_attempted)
        .and_then(|row| row.final_test_score)
        .map(|score| score >= params.approval_floor)
        .unwrap_or(false);
    if !eligible {
        return Ok(ApprovalOutcome {
            approved: false,
            completion: None,
        });
    }

    if let Some(row) = progress.get_mut(chapter_id) {
        row.approved_by = Some(teacher_id.to_string());
        row.approved_at = Some(now);
        row.approval_feedback = feedback;
    }
    info!(student_id, chapter_id, teacher_id, "chapter approved");

    let completion =
        evaluate_completion(graph, progress, masteries, student_id, chapter_id, params, now)?;
    Ok(ApprovalOutcome {
        approved: true,
        completion: Some(completion),
    })
}

/// Consumes the mastery tracker's newly-mastered concept ids: unlocks the
/// next concept in each owning chapter's order (no-op on the last concept
/// or an already-unlocked one) and re-checks the owning chapters.
pub fn advance_concepts(
    graph: &CurriculumGraph,
    progress: &mut BTreeMap<String, ChapterProgress>,
    masteries: &mut BTreeMap<String, ConceptMastery>,
    student_id: &str,
    newly_mastered: &[String],
    params: &CurriculumParams,
    now: DateTime<Utc>,
) -> Result<UnlockReport, CoreError> {
    let mut report = UnlockReport::default();
    let mut owning_chapters: Vec<String> = Vec::new();

    for concept_id in newly_mastered {
        let chapter = graph
            .chapter_of_concept(concept_id)
            .ok_or_else(|| CoreError::UnknownConcept(concept_id.clone()))?;
        if let Some(position) = chapter.concept_ids.iter().position(|c| c == concept_id) {
            if let Some(next_id) = chapter.concept_ids.get(position + 1) {
                if unlock_concept(masteries, student_id, next_id, now) {
                    report.unlocked_concepts.push(next_id.clone());
                }
            }
        }
        if !owning_chapters.contains(&chapter.id) {
            owning_chapters.push(chapter.id.clone());
        }
    }

    for chapter_id in owning_chapters {
        let completion =
            evaluate_completion(graph, progress, masteries, student_id, &chapter_id, params, now)?;
        report.completed_chapters.extend(completion.newly_completed);
        report.unlocked_chapters.extend(completion.newly_unlocked);
    }

    Ok(report)
}

/// Mastered-concept share of a chapter, 0..=100.
pub fn chapter_progress_percent(
    chapter: &Chapter,
    masteries: &BTreeMap<String, ConceptMastery>,
) -> f64 {
    if chapter.concept_ids.is_empty() {
        return 0.0;
    }
    let mastered = chapter
        .concept_ids
        .iter()
        .filter(|c| masteries.get(*c).map(|m| m.mastered).unwrap_or(false))
        .count();
    mastered as f64 / chapter.concept_ids.len() as f64 * 100.0
}

/// "Continue" the unlocked-but-incomplete chapter with the highest
/// progress, else the chapter following the most recently completed one,
/// else nothing. A student with no rows for the grade gets its first
/// chapter unlocked on this query.
pub fn recommend(
    graph: &CurriculumGraph,
    progress: &mut BTreeMap<String, ChapterProgress>,
    masteries: &mut BTreeMap<String, ConceptMastery>,
    student_id: &str,
    grade: i32,
    now: DateTime<Utc>,
) -> Result<Option<Recommendation>, CoreError> {
    let chapters = graph.chapters_for_grade(grade);
    if chapters.is_empty() {
        return Ok(None);
    }

    let has_rows = chapters.iter().any(|c| progress.contains_key(&c.id));
    if !has_rows {
        let first = chapters[0];
        unlock_row(graph, progress, masteries, student_id, &first.id, now)?;
        return Ok(Some(Recommendation {
            chapter_id: first.id.clone(),
            kind: RecommendationKind::Continue,
            progress_percent: chapter_progress_percent(first, masteries),
        }));
    }

    let mut best: Option<(&Chapter, f64)> = None;
    for &chapter in &chapters {
        let Some(row) = progress.get(&chapter.id) else {
            continue;
        };
        if !row.unlocked || row.completed {
            continue;
        }
        let percent = chapter_progress_percent(chapter, masteries);
        if best.map(|(_, b)| percent > b).unwrap_or(true) {
            best = Some((chapter, percent));
        }
    }
    if let Some((chapter, percent)) = best {
        return Ok(Some(Recommendation {
            chapter_id: chapter.id.clone(),
            kind: RecommendationKind::Continue,
            progress_percent: percent,
        }));
    }

    let last_completed = chapters
        .iter()
        .filter_map(|c| {
            progress
                .get(&c.id)
                .filter(|r| r.completed)
                .and_then(|r| r.completed_at)
                .map(|t| (*c, t))
        })
        .max_by_key(|(_, t)| *t);
    if let Some((done, _)) = last_completed {
        if let Some(next) = chapters.iter().find(|c| {
            c.sequence > done.sequence
                && !progress.get(&c.id).map(|r| r.completed).unwrap_or(false)
        }) {
            return Ok(Some(Recommendation {
                chapter_id: next.id.clone(),
                kind: RecommendationKind::Next,
                progress_percent: chapter_progress_percent(next, masteries),
            }));
        }
    }

    Ok(None)
}
